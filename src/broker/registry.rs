//! Topic registry
//!
//! The one piece of state shared by every connection. Topics exist only while
//! they have subscribers, and a connection is filed under at most one topic:
//! subscribing elsewhere moves it.
//!
//! All operations take the same lock and only do in-memory work while holding
//! it. Publishers get a copied snapshot and do their I/O after the lock is
//! released, so a slow subscriber never holds up registry traffic.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::client::{ClientHandle, ClientId};

#[derive(Debug, Default)]
struct RegistryState {
    topics: HashMap<String, HashMap<ClientId, ClientHandle>>,
    memberships: HashMap<ClientId, String>,
}

#[derive(Debug, Default)]
pub struct TopicRegistry {
    state: Mutex<RegistryState>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // Every mutation leaves both maps consistent; a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Files `client` under `topic`.
    ///
    /// Returns the topic the client was moved away from, if any. Subscribing
    /// twice to the same topic changes nothing and returns `None`.
    pub fn subscribe(&self, topic: &str, client: ClientHandle) -> Option<String> {
        let mut state = self.lock();
        let id = client.id();

        if state
            .memberships
            .get(&id)
            .is_some_and(|current| current == topic)
        {
            return None;
        }
        let previous = state.remove(&id);

        state
            .topics
            .entry(topic.to_string())
            .or_default()
            .insert(id, client);
        state.memberships.insert(id, topic.to_string());

        previous
    }

    /// Removes the client from whichever topic it is filed under.
    pub fn unsubscribe(&self, id: &ClientId) -> Option<String> {
        self.lock().remove(id)
    }

    /// Point-in-time copy of the subscribers of `topic`.
    pub fn snapshot(&self, topic: &str) -> Vec<ClientHandle> {
        self.lock()
            .topics
            .get(topic)
            .map(|subscribers| subscribers.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn topic_of(&self, id: &ClientId) -> Option<String> {
        self.lock().memberships.get(id).cloned()
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.lock().topics.get(topic).map_or(0, HashMap::len)
    }

    pub fn topic_count(&self) -> usize {
        self.lock().topics.len()
    }
}

impl RegistryState {
    fn remove(&mut self, id: &ClientId) -> Option<String> {
        let topic = self.memberships.remove(id)?;

        if let Some(subscribers) = self.topics.get_mut(&topic) {
            subscribers.remove(id);
            if subscribers.is_empty() {
                self.topics.remove(&topic);
            }
        }

        Some(topic)
    }
}
