use std::collections::{HashMap, HashSet};

use crate::{ChannelKey, Event, SubscriptionId, internal::Listener};

/// Channel → listeners map behind the bus lock.
///
/// Channel entries exist only while they have listeners.
#[derive(Debug)]
pub(crate) struct Registry<E: Event> {
    channels: HashMap<ChannelKey, Vec<Listener<E>>>,
    over_limit: HashSet<ChannelKey>,
    max_listeners: usize,
}

impl<E: Event> Registry<E> {
    pub fn new(max_listeners: usize) -> Self {
        Self {
            channels: HashMap::new(),
            over_limit: HashSet::new(),
            max_listeners,
        }
    }

    pub fn add(&mut self, key: ChannelKey, listener: Listener<E>) {
        let listeners = self.channels.entry(key.clone()).or_default();
        listeners.push(listener);
        let count = listeners.len();
        if count > self.max_listeners && self.over_limit.insert(key.clone()) {
            tracing::warn!(
                channel = %key,
                count,
                max = self.max_listeners,
                "Possible listener leak: channel exceeds the listener threshold"
            );
        }
    }

    /// Remove the registration with the given id. Returns `false` when it
    /// was already gone.
    pub fn remove(&mut self, key: &ChannelKey, id: SubscriptionId) -> bool {
        let Some(listeners) = self.channels.get_mut(key) else {
            return false;
        };
        let Some(pos) = listeners.iter().position(|l| l.id == id) else {
            return false;
        };
        listeners.remove(pos).deactivate();

        let count = listeners.len();
        if count == 0 {
            self.channels.remove(key);
        }
        if count <= self.max_listeners {
            self.over_limit.remove(key);
        }
        true
    }

    /// Copy of the listeners registered on `key` right now.
    pub fn snapshot(&self, key: &ChannelKey) -> Vec<Listener<E>> {
        self.channels.get(key).cloned().unwrap_or_default()
    }

    pub fn listener_count(&self, key: &ChannelKey) -> usize {
        self.channels.get(key).map_or(0, Vec::len)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}
