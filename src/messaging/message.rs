use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Уникальный идентификатор публикации; по нему отсекаются повторы.
pub const META_PUBLISH_ID: &str = "cwf-pubid";
/// Момент публикации, миллисекунды Unix-эпохи.
pub const META_PUBLISHED: &str = "cwf-published";

/// Сообщение, передаваемое через брокер.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
    pub created: DateTime<Utc>,
}

impl Message {
    pub fn new(
        message_type: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            message_type: message_type.into(),
            payload,
            metadata: HashMap::new(),
            created: Utc::now(),
        }
    }

    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: Value,
    ) -> Self {
        self.set_metadata(key, value);
        self
    }

    /// Возвращает предыдущее значение ключа, если оно было.
    pub fn set_metadata(
        &mut self,
        key: impl Into<String>,
        value: Value,
    ) -> Option<Value> {
        self.metadata.insert(key.into(), value)
    }

    pub fn metadata(
        &self,
        key: &str,
    ) -> Option<&Value> {
        self.metadata.get(key)
    }

    pub fn has_metadata(
        &self,
        key: &str,
    ) -> bool {
        self.metadata.contains_key(key)
    }

    pub fn publish_id(&self) -> Option<&str> {
        self.metadata(META_PUBLISH_ID).and_then(Value::as_str)
    }

    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }
}
