//! Распространение событий по кластеру через брокер сообщений.

pub mod delivered;
pub mod dispatcher;
pub mod memory;
pub mod ping;
pub mod transport;

pub use delivered::DeliveredTracker;
pub use dispatcher::{GlobalEventDispatcher, CONNECT_EVENT, DISCONNECT_EVENT};
pub use memory::{MemoryBroker, MemoryTransport};
pub use ping::{
    PingFilter, PingFilterType, PingOptions, PingRequest, PING_REQUEST_EVENT, PING_RESPONSE_PREFIX,
};
pub use transport::{EnvelopeHandler, Transport, TransportResult};
