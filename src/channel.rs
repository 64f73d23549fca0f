use std::{fmt, ops::Deref, sync::Arc};

use serde::{Deserialize, Serialize};

/// Prefix shared by all per-cafe channel keys.
pub const CAFE_PREFIX: &str = "cafe:";

/// Brain publishes completed thoughts here for Planner to pick up.
pub const TOPIC_PLANNER_THOUGHT_SYNCED: &str = "planner.thought-synced";

/// Store publishes purchases here so Place can nudge trust scores.
pub const TOPIC_PLACE_TRUST_SIGNAL: &str = "place.trust-signal";

/// Planner publishes milestone stories here for Store profiles.
pub const TOPIC_STORE_STORY_SUGGESTED: &str = "store.story-suggested";

/// Name of a broadcast scope on the [`Bus`](crate::Bus).
///
/// Two flavours exist: per-cafe keys (`cafe:<id>`), which back the
/// real-time SSE endpoint, and plain cross-app topics such as
/// [`TOPIC_PLACE_TRUST_SIGNAL`]. Channels are created implicitly on first
/// use; the key is all there is to them.
///
/// Keys are cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelKey(Arc<str>);

impl ChannelKey {
    /// Key of the channel carrying one cafe's presence and doorbell events.
    pub fn cafe(cafe_id: &str) -> Self {
        Self(format!("{CAFE_PREFIX}{cafe_id}").into())
    }

    /// Key of a cross-app topic.
    pub fn topic<S: Into<Arc<str>>>(topic: S) -> Self {
        Self(topic.into())
    }

    /// The cafe id, if this is a cafe channel.
    pub fn cafe_id(&self) -> Option<&str> {
        self.0.strip_prefix(CAFE_PREFIX)
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Deref for ChannelKey {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<&str> for ChannelKey {
    fn from(value: &str) -> Self {
        ChannelKey::topic(value)
    }
}
