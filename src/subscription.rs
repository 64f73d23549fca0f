use std::sync::Weak;

use crate::{ChannelKey, Event, bus::BusInner};

pub type SubscriptionId = u64;

/// Guard for one listener registration on a [`Bus`](crate::Bus).
///
/// Dropping the guard unsubscribes. Call [`Subscription::detach`] to keep
/// the listener for the lifetime of the bus instead.
///
/// The guard holds a weak reference, so it never keeps a bus alive.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription<E: Event> {
    bus: Weak<BusInner<E>>,
    key: ChannelKey,
    id: SubscriptionId,
    armed: bool,
}

impl<E: Event> Subscription<E> {
    pub(crate) fn new(bus: Weak<BusInner<E>>, key: ChannelKey, id: SubscriptionId) -> Self {
        Self {
            bus,
            key,
            id,
            armed: true,
        }
    }

    #[inline]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    #[inline]
    pub fn channel(&self) -> &ChannelKey {
        &self.key
    }

    /// Remove this registration. No event published after this returns
    /// reaches the listener.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    /// Keep the listener registered until the bus itself goes away.
    pub fn detach(mut self) {
        self.armed = false;
    }

    fn release(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(&self.key, self.id);
        }
    }
}

impl<E: Event> Drop for Subscription<E> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<E: Event> std::fmt::Debug for Subscription<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.key)
            .field("id", &self.id)
            .field("armed", &self.armed)
            .finish()
    }
}
