use std::any::Any;

use thiserror::Error;

pub use carebus_error::{
    AliasError, CarebusResult, CodecError, ErrorExt, EventError, GenericError, ResultExt,
    StackError, StatusCode, TransportError,
};

pub type DispatchResult<T> = Result<T, DispatchError>;

/// Ошибки распределённой шины: обёртка над ошибками слоёв ниже.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Event(#[from] EventError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Dispatcher is not started")]
    NotStarted,

    #[error("Dispatcher is already started")]
    AlreadyStarted,
}

impl ErrorExt for DispatchError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Event(e) => e.status_code(),
            Self::Transport(e) => e.status_code(),
            Self::Codec(e) => e.status_code(),
            Self::NotStarted => StatusCode::NotConnected,
            Self::AlreadyStarted => StatusCode::AlreadyExists,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Event(e) => e.metrics_tags(),
            Self::Transport(e) => e.metrics_tags(),
            Self::Codec(e) => e.metrics_tags(),
            Self::NotStarted | Self::AlreadyStarted => vec![
                ("error_type", "dispatch".to_string()),
                ("status_code", self.status_code().to_string()),
            ],
        }
    }
}
