//! Локальная иерархическая шина событий.

pub mod handler;
pub mod manager;
pub mod name;
mod subscriptions;

pub use handler::{handler, Event, EventHandler, HandlerRef};
pub use manager::{EventManager, EventResult, LocalSubscription};
