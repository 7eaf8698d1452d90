//! Gauntlet live event distribution.
//!
//! - [`EventBus`]: in-process publish/subscribe hub with one registry for
//!   both broadcast and per-job subscribers.
//! - [`JobEvent`]: the message envelope pushed to WebSocket and SSE
//!   clients.

pub mod bus;
pub mod event;

pub use bus::{EventBus, Subscriber, SubscriberId, SubscriptionFilter, SubscriptionGuard};
pub use event::{JobEvent, LogLevel};
