use serde::{Deserialize, Serialize};

use super::{Message, PublisherInfo, Recipient};

/// То, что реально уходит в канал брокера.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Имя, под которым событие будет доставлено на принимающей стороне.
    pub event: String,
    pub message: Message,
    pub publisher: PublisherInfo,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recipients: Vec<Recipient>,
}

impl Envelope {
    pub fn new(
        event: impl Into<String>,
        message: Message,
        publisher: PublisherInfo,
        recipients: Vec<Recipient>,
    ) -> Self {
        Self {
            event: event.into(),
            message,
            publisher,
            recipients,
        }
    }

    pub fn is_broadcast(&self) -> bool {
        self.recipients.is_empty()
    }
}
