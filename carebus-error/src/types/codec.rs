use std::any::Any;

use crate::{ErrorExt, StatusCode};

/// Ошибки сериализации сообщений для передачи через брокер.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    Encode { what: String, reason: String },
    Decode { what: String, reason: String },
}

impl std::fmt::Display for CodecError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::Encode { what, reason } => write!(f, "Failed to encode {what}: {reason}"),
            Self::Decode { what, reason } => write!(f, "Failed to decode {what}: {reason}"),
        }
    }
}

impl std::error::Error for CodecError {}

impl ErrorExt for CodecError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Encode { .. } => StatusCode::SerializationFailed,
            Self::Decode { .. } => StatusCode::DeserializationFailed,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        match self {
            Self::Encode { .. } => "Message format error".to_string(),
            Self::Decode { .. } => "Malformed message received".to_string(),
        }
    }
}
