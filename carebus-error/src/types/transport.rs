use std::any::Any;

use crate::{ErrorExt, StatusCode};

/// Ошибки транспорта брокера сообщений.
///
/// Транспорт не повторяет операции сам: политика повторов принадлежит
/// вызывающей стороне (см. [`StatusCode::is_retryable`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Операция до `connect()` или после `disconnect()`.
    NotConnected { endpoint: String },
    /// Не удалось установить соединение с брокером.
    ConnectFailed { endpoint: String, reason: String },
    /// Брокер отклонил публикацию.
    PublishFailed { channel: String, reason: String },
    /// Не удалось оформить подписку на канал.
    SubscribeFailed { channel: String, reason: String },
    /// Канал закрыт на стороне брокера.
    Closed { channel: String },
}

impl std::fmt::Display for TransportError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::NotConnected { endpoint } => {
                write!(f, "Transport endpoint {endpoint} is not connected")
            }
            Self::ConnectFailed { endpoint, reason } => {
                write!(f, "Failed to connect endpoint {endpoint}: {reason}")
            }
            Self::PublishFailed { channel, reason } => {
                write!(f, "Failed to publish to channel {channel}: {reason}")
            }
            Self::SubscribeFailed { channel, reason } => {
                write!(f, "Failed to subscribe to channel {channel}: {reason}")
            }
            Self::Closed { channel } => write!(f, "Channel {channel} is closed"),
        }
    }
}

impl std::error::Error for TransportError {}

impl ErrorExt for TransportError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotConnected { .. } => StatusCode::NotConnected,
            Self::ConnectFailed { .. } => StatusCode::ConnectionFailed,
            Self::PublishFailed { .. } => StatusCode::PublishFailed,
            Self::SubscribeFailed { .. } => StatusCode::SubscribeFailed,
            Self::Closed { .. } => StatusCode::ConnectionClosed,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", "transport".to_string()),
            ("status_code", self.status_code().to_string()),
        ];

        match self {
            Self::NotConnected { endpoint } | Self::ConnectFailed { endpoint, .. } => {
                tags.push(("endpoint", endpoint.clone()));
            }
            Self::PublishFailed { channel, .. }
            | Self::SubscribeFailed { channel, .. }
            | Self::Closed { channel } => {
                tags.push(("channel", channel.clone()));
            }
        }

        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::NotConnected {
            endpoint: "node-a".to_string(),
        };
        assert_eq!(err.to_string(), "Transport endpoint node-a is not connected");
    }

    #[test]
    fn test_transport_status_codes_are_retryable() {
        let errors = [
            TransportError::NotConnected {
                endpoint: "e".to_string(),
            },
            TransportError::ConnectFailed {
                endpoint: "e".to_string(),
                reason: "refused".to_string(),
            },
            TransportError::PublishFailed {
                channel: "c".to_string(),
                reason: "full".to_string(),
            },
            TransportError::SubscribeFailed {
                channel: "c".to_string(),
                reason: "denied".to_string(),
            },
        ];
        for err in errors {
            assert!(err.status_code().is_retryable(), "{err}");
        }
        assert!(!TransportError::Closed {
            channel: "c".to_string()
        }
        .status_code()
        .is_retryable());
    }

    #[test]
    fn test_metrics_tags_include_channel() {
        let err = TransportError::Closed {
            channel: "cwf-event-PING".to_string(),
        };
        assert!(err
            .metrics_tags()
            .contains(&("channel", "cwf-event-PING".to_string())));
    }
}
