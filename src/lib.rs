//! Dream Relay: the real-time event backbone shared by the Dream apps.
//!
//! An in-process publish/subscribe [`Bus`] keyed by channel, an SSE
//! endpoint that streams one cafe's events to browsers, a self-healing
//! [`ChannelClient`](client::ChannelClient) for the other side of that
//! stream, and a handful of cross-app [`sync`] helpers that publish
//! fire-and-forget events between Brain, Planner, Place and Store.
//!
//! ```rust
//! use dream_relay::{Bus, ChannelKey, Config, RelayEvent, KIND_DOORBELL};
//! use serde_json::json;
//!
//! let bus = Bus::<RelayEvent>::new(Config::default());
//! let sub = bus.subscribe(ChannelKey::cafe("42"), |event: &RelayEvent| {
//!     println!("{} in cafe 42", event.kind);
//! });
//! assert_eq!(bus.emit(&RelayEvent::cafe("42", KIND_DOORBELL, json!({}))), 1);
//! drop(sub);
//! ```

mod bus;
mod channel;
mod config;
mod error;
mod event;
mod internal;
mod subscription;

pub mod client;
pub mod sse;
pub mod sync;
pub mod testing;

pub use bus::Bus;
pub use channel::{
    CAFE_PREFIX, ChannelKey, TOPIC_PLACE_TRUST_SIGNAL, TOPIC_PLANNER_THOUGHT_SYNCED,
    TOPIC_STORE_STORY_SUGGESTED,
};
pub use config::Config;
pub use error::Error;
pub use event::{
    Event, KIND_CONNECTED, KIND_DOORBELL, KIND_PRESENCE_JOIN, KIND_PRESENCE_LEAVE,
    KIND_PRESENCE_UPDATE, RelayEvent,
};
pub use subscription::{Subscription, SubscriptionId};

pub type Result<T = ()> = std::result::Result<T, Error>;

pub mod prelude {
    pub use crate::bus::Bus;
    pub use crate::channel::ChannelKey;
    pub use crate::config::Config;
    pub use crate::error::Error as RelayError;
    pub use crate::event::{Event, RelayEvent};
    pub use crate::subscription::Subscription;
}
