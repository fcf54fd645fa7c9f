//! Сообщения, адресация и сериализация для передачи через брокер.

pub mod codec;
pub mod envelope;
pub mod message;
pub mod publisher;
pub mod recipient;

pub use codec::{from_wire, to_wire, EnvelopeCodec, JsonCodec};
pub use envelope::Envelope;
pub use message::{Message, META_PUBLISHED, META_PUBLISH_ID};
pub use publisher::PublisherInfo;
pub use recipient::{is_excluded, Recipient, RecipientType};
