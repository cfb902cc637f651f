//! Chat lifecycle events and the scoped publish/subscribe bus.
//!
//! The module is organised around the synchronous [`EventBus`] (chat-id and
//! wildcard scopes, per-listener panic isolation) and the transient
//! [`ChatEvent`] payload it delivers.

pub mod bus;
pub mod event;

pub use bus::{BusMetrics, ChatListener, ChatScope, EventBus, Subscription};
pub use event::{ChatEvent, ChatEventKind};
