//! Events module - typed agent events and per-task distribution hubs

pub mod hub;
pub mod types;

pub use hub::{EventHub, SubscriberId, Subscription};
pub use types::{Event, EventKind, EventPayload};
