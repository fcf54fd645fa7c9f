use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};

use carebus_error::CodecError;

use super::Envelope;

/// Сериализация конвертов для передачи через брокер.
pub trait EnvelopeCodec: Send + Sync {
    fn encode(
        &self,
        envelope: &Envelope,
    ) -> Result<Bytes, CodecError>;

    fn decode(
        &self,
        bytes: &[u8],
    ) -> Result<Envelope, CodecError>;

    fn content_type(&self) -> &'static str;
}

/// JSON-кодек на `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl EnvelopeCodec for JsonCodec {
    fn encode(
        &self,
        envelope: &Envelope,
    ) -> Result<Bytes, CodecError> {
        serde_json::to_vec(envelope)
            .map(Bytes::from)
            .map_err(|e| CodecError::Encode {
                what: "envelope".to_string(),
                reason: e.to_string(),
            })
    }

    fn decode(
        &self,
        bytes: &[u8],
    ) -> Result<Envelope, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode {
            what: "envelope".to_string(),
            reason: e.to_string(),
        })
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }
}

/// Сериализует любое значение в строку для передачи.
pub fn to_wire<T: Serialize>(value: &T) -> Result<String, CodecError> {
    serde_json::to_string(value).map_err(|e| CodecError::Encode {
        what: short_type_name::<T>().to_string(),
        reason: e.to_string(),
    })
}

pub fn from_wire<T: DeserializeOwned>(text: &str) -> Result<T, CodecError> {
    serde_json::from_str(text).map_err(|e| CodecError::Decode {
        what: short_type_name::<T>().to_string(),
        reason: e.to_string(),
    })
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}
