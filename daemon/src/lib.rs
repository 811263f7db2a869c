//! nparse - live EverQuest log ingestion and location sharing.
//!
//! Tails the game's chat logs as they are written, republishes each line on
//! an in-process bus and relays the player's position to a sharing server.

pub mod bus;
pub mod config;
pub mod error;
pub mod parsers;
pub mod relay;
pub mod service;
pub mod watcher;

pub use bus::{Event, EventBus, SubscriptionId, Topic};
pub use config::{Settings, SharingSettings};
pub use error::Error;
pub use service::Service;
