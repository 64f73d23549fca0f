use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use crate::{
    ChannelKey, Config, Event, RelayEvent, Subscription, SubscriptionId,
    internal::{Listener, Registry},
};

/// In-process publish/subscribe bus keyed by [`ChannelKey`].
///
/// - `publish(key, event)` synchronously calls every listener registered on
///   `key`, in registration order, and returns how many were called.
/// - `subscribe(key, callback)` registers a listener and returns a
///   [`Subscription`] guard; dropping it (or calling `unsubscribe`) removes
///   exactly that registration.
///
/// The bus is a plain value: construct one per process (or per test) and
/// share it by cloning, which is cheap. Nothing is persisted and nothing is
/// queued; an event published while a channel has no listeners is gone.
///
/// A listener that panics is logged and skipped. The remaining listeners
/// of the same publish still receive the event.
///
/// # Examples
///
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use dream_relay::{Bus, ChannelKey, Config, Event};
///
/// #[derive(Clone)]
/// struct Greeting(&'static str);
/// impl Event for Greeting {}
///
/// let bus = Bus::<Greeting>::new(Config::default());
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = seen.clone();
/// let sub = bus.subscribe(ChannelKey::topic("greetings"), move |g: &Greeting| {
///     sink.lock().unwrap().push(g.0);
/// });
///
/// bus.publish(&ChannelKey::topic("greetings"), &Greeting("hello"));
/// sub.unsubscribe();
/// bus.publish(&ChannelKey::topic("greetings"), &Greeting("bye"));
///
/// assert_eq!(*seen.lock().unwrap(), vec!["hello"]);
/// ```
pub struct Bus<E: Event = RelayEvent> {
    inner: Arc<BusInner<E>>,
}

pub(crate) struct BusInner<E: Event> {
    registry: Mutex<Registry<E>>,
    next_id: AtomicU64,
}

impl<E: Event> BusInner<E> {
    fn registry(&self) -> MutexGuard<'_, Registry<E>> {
        // Listeners never run under this lock, so a poisoned registry is
        // still consistent.
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn remove(&self, key: &ChannelKey, id: SubscriptionId) -> bool {
        let removed = self.registry().remove(key, id);
        if removed {
            tracing::trace!(channel = %key, subscription = id, "Listener removed");
        }
        removed
    }
}

impl<E: Event> Bus<E> {
    pub fn new(config: Config) -> Self {
        Self {
            inner: Arc::new(BusInner {
                registry: Mutex::new(Registry::new(config.max_listeners)),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register `callback` for future publishes on `key`.
    ///
    /// Registering the same callback twice yields two independent
    /// registrations, each called once per publish.
    pub fn subscribe<F>(&self, key: ChannelKey, callback: F) -> Subscription<E>
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let listener = Listener::new(id, Arc::new(callback));
        self.inner.registry().add(key.clone(), listener);
        tracing::trace!(channel = %key, subscription = id, "Listener added");
        Subscription::new(Arc::downgrade(&self.inner), key, id)
    }

    /// Deliver `event` to every listener currently registered on `key`.
    ///
    /// Returns the number of listeners that were called (panicking ones
    /// included). Zero listeners is not an error.
    pub fn publish(&self, key: &ChannelKey, event: &E) -> usize {
        let listeners = self.inner.registry().snapshot(key);
        if listeners.is_empty() {
            tracing::trace!(channel = %key, event = %event.name(), "No listeners");
            return 0;
        }

        let mut delivered = 0;
        for listener in listeners.iter().filter(|l| l.is_active()) {
            delivered += 1;
            let result = catch_unwind(AssertUnwindSafe(|| (listener.callback)(event)));
            if result.is_err() {
                tracing::error!(
                    channel = %key,
                    subscription = listener.id,
                    event = %event.name(),
                    "Listener panicked while handling event"
                );
            }
        }
        delivered
    }

    /// Number of live registrations on `key`.
    pub fn listener_count(&self, key: &ChannelKey) -> usize {
        self.inner.registry().listener_count(key)
    }

    /// Number of channels with at least one listener.
    pub fn channel_count(&self) -> usize {
        self.inner.registry().channel_count()
    }
}

impl Bus<RelayEvent> {
    /// Publish a relay event on the channel it belongs to.
    pub fn emit(&self, event: &RelayEvent) -> usize {
        self.publish(&event.channel(), event)
    }
}

impl<E: Event> Clone for Bus<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E: Event> Default for Bus<E> {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl<E: Event> std::fmt::Debug for Bus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus")
            .field("channels", &self.channel_count())
            .finish()
    }
}
