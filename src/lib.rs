/// Wildcard alias resolution: types, patterns, property loading.
pub mod alias;
/// Settings loading (defaults, `carebus.toml`, `CAREBUS__*` environment).
pub mod config;
/// Cluster-wide event distribution: transport contract, dispatcher, ping.
pub mod dispatch;
/// Error types and result aliases.
pub mod error;
/// Local hierarchical publish/subscribe bus.
pub mod event;
/// Flexible logging (formatting, filters, file sink).
pub mod logging;
/// Messages, publisher addressing, recipients and wire codec.
pub mod messaging;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// Alias registry and its building blocks.
pub use alias::{AliasLoadStats, AliasRegistry, AliasType, WildcardPattern};
/// Settings.
pub use config::{BusSettings, NodeIdentity, Settings};
/// Dispatcher, transports and ping protocol.
pub use dispatch::{
    GlobalEventDispatcher, MemoryBroker, MemoryTransport, PingFilter, PingFilterType, PingOptions,
    PingRequest, Transport,
};
/// Operation errors and result types.
pub use error::{DispatchError, DispatchResult};
/// Local event bus.
pub use event::{handler, Event, EventHandler, EventManager, HandlerRef, LocalSubscription};
/// Logging bootstrap.
pub use logging::{init_logging, LoggingConfig, LoggingHandle};
/// Messaging types.
pub use messaging::{
    Envelope, EnvelopeCodec, JsonCodec, Message, PublisherInfo, Recipient, RecipientType,
};
