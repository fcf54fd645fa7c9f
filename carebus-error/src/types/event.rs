use std::any::Any;

use crate::{ErrorExt, StatusCode};

/// Ошибки локальной шины событий.
///
/// Сбой обработчика сюда не попадает: он перехватывается и логируется на
/// месте, доставка остальным подписчикам продолжается.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    /// Имя события пустое, содержит пустой сегмент или завершается точкой.
    InvalidName { name: String, reason: String },
}

impl std::fmt::Display for EventError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::InvalidName { name, reason } => {
                write!(f, "Invalid event name '{name}': {reason}")
            }
        }
    }
}

impl std::error::Error for EventError {}

impl ErrorExt for EventError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidName { .. } => StatusCode::InvalidEventName,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::InvalidName { name, .. } => vec![
                ("error_type", "event".to_string()),
                ("status_code", self.status_code().to_string()),
                ("event_name", name.clone()),
            ],
        }
    }
}
