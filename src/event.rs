use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ChannelKey;

/// Type of the handshake frame that opens every SSE stream.
/// It confirms the subscription and is never a domain event.
pub const KIND_CONNECTED: &str = "connected";

/// Someone rang the cafe doorbell.
pub const KIND_DOORBELL: &str = "doorbell";
pub const KIND_PRESENCE_JOIN: &str = "presence.join";
pub const KIND_PRESENCE_LEAVE: &str = "presence.leave";
pub const KIND_PRESENCE_UPDATE: &str = "presence.update";

/// Marker trait for values carried by the [`Bus`](crate::Bus).
///
/// Events must be `Send + Sync + Clone + 'static` because listeners run on
/// whatever runtime thread happens to publish, and an event may be handed
/// to several of them.
///
/// The `name()` method feeds log fields. The default implementation
/// returns the type name via `std::any::type_name`.
pub trait Event: Send + Sync + Clone + 'static {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(std::any::type_name::<Self>())
    }
}

/// The event shape exchanged between apps and sent over SSE.
///
/// Serialized in camelCase:
///
/// ```json
/// {"type":"doorbell","cafeId":"7","payload":{"by":"ana"},"timestamp":"2026-01-01T10:00:00Z"}
/// ```
///
/// Exactly one of `cafe_id` and `topic` is set by the constructors, which
/// makes [`RelayEvent::channel`] unambiguous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cafe_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default = "empty_object")]
    pub payload: Value,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl RelayEvent {
    /// An event for one cafe's real-time channel.
    pub fn cafe<K: Into<String>>(cafe_id: &str, kind: K, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            cafe_id: Some(cafe_id.to_string()),
            topic: None,
            payload,
            timestamp: Utc::now(),
        }
    }

    /// An event for a cross-app topic.
    pub fn topic<K: Into<String>>(topic: &str, kind: K, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            cafe_id: None,
            topic: Some(topic.to_string()),
            payload,
            timestamp: Utc::now(),
        }
    }

    /// The handshake sent first on every SSE connection.
    pub fn handshake(cafe_id: &str) -> Self {
        Self::cafe(cafe_id, KIND_CONNECTED, empty_object())
    }

    /// Channel this event is delivered on. A cafe id wins over a topic;
    /// an event carrying neither lands on the channel named by its type.
    pub fn channel(&self) -> ChannelKey {
        match (&self.cafe_id, &self.topic) {
            (Some(cafe_id), _) => ChannelKey::cafe(cafe_id),
            (None, Some(topic)) => ChannelKey::topic(topic.as_str()),
            (None, None) => ChannelKey::topic(self.kind.as_str()),
        }
    }

    #[inline]
    pub fn is_handshake(&self) -> bool {
        self.kind == KIND_CONNECTED
    }
}

impl Event for RelayEvent {
    fn name(&self) -> Cow<'static, str> {
        Cow::Owned(self.kind.clone())
    }
}
