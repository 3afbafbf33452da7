// Host-facing surface: tracing setup and channel-based load notifications.

pub mod events;
pub mod simple;
