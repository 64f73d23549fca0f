use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::{Event, SubscriptionId};

pub(crate) type Callback<E> = Arc<dyn Fn(&E) + Send + Sync + 'static>;

/// One registration on a channel.
///
/// The `active` flag is cleared on unsubscribe so that a publish which
/// already took its snapshot of the channel skips the listener.
pub(crate) struct Listener<E: Event> {
    pub id: SubscriptionId,
    pub callback: Callback<E>,
    active: Arc<AtomicBool>,
}

impl<E: Event> Listener<E> {
    pub fn new(id: SubscriptionId, callback: Callback<E>) -> Self {
        Self {
            id,
            callback,
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }
}

impl<E: Event> Clone for Listener<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: self.callback.clone(),
            active: self.active.clone(),
        }
    }
}

impl<E: Event> PartialEq for Listener<E> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<E: Event> Eq for Listener<E> {}

impl<E: Event> std::fmt::Debug for Listener<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
