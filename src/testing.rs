//! Helpers for asserting on what the bus delivered.

use std::sync::{Arc, Mutex, PoisonError};

use crate::{Bus, ChannelKey, Event, Subscription};

/// Records every event published on one channel while it is alive.
///
/// ```rust
/// use dream_relay::{Bus, ChannelKey, Config, RelayEvent, testing::EventCollector};
/// use serde_json::json;
///
/// let bus = Bus::<RelayEvent>::new(Config::default());
/// let collector = EventCollector::attach(&bus, ChannelKey::cafe("7"));
/// bus.emit(&RelayEvent::cafe("7", "doorbell", json!({})));
/// assert_eq!(collector.len(), 1);
/// assert_eq!(collector.events()[0].kind, "doorbell");
/// ```
pub struct EventCollector<E: Event> {
    events: Arc<Mutex<Vec<E>>>,
    subscription: Subscription<E>,
}

impl<E: Event> EventCollector<E> {
    pub fn attach(bus: &Bus<E>, key: ChannelKey) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let subscription = bus.subscribe(key, move |event: &E| {
            sink.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(event.clone());
        });
        Self {
            events,
            subscription,
        }
    }

    /// Events recorded so far, in delivery order.
    pub fn events(&self) -> Vec<E> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn channel(&self) -> &ChannelKey {
        self.subscription.channel()
    }

    /// Stop recording. Events already collected are returned.
    pub fn detach(self) -> Vec<E> {
        let Self {
            events,
            subscription,
        } = self;
        subscription.unsubscribe();
        std::mem::take(&mut *events.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
