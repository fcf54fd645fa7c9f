pub mod settings;

pub use settings::{AliasSettings, BusSettings, NodeIdentity, Settings};
