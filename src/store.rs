//! Per-item state store.
//!
//! Registry entries and item states share one map entry, so an identifier's
//! state exists exactly as long as it is registered. Mutations return a
//! [`Notification`] instead of calling observers directly; the batcher
//! delivers it once its lock is released.

use crate::subscriptions::{Observer, SubscriptionId};
use crate::types::ItemState;
use std::collections::HashMap;
use tracing::trace;

/// A registered identifier: its state and its observers in registration order.
struct Entry<T> {
    state: ItemState<T>,
    observers: Vec<(SubscriptionId, Observer<T>)>,
}

impl<T> Default for Entry<T> {
    fn default() -> Self {
        Self {
            state: ItemState::default(),
            observers: Vec::new(),
        }
    }
}

/// A state change waiting to be fanned out.
pub(crate) struct Notification<T> {
    id: String,
    state: ItemState<T>,
    observers: Vec<Observer<T>>,
}

impl<T> Notification<T> {
    /// Call every observer with the new state, in registration order.
    pub(crate) fn deliver(self) {
        trace!(id = %self.id, observers = self.observers.len(), "notifying observers");
        for observer in &self.observers {
            observer(&self.state);
        }
    }
}

/// Authoritative item states keyed by identifier.
pub(crate) struct ItemStore<T> {
    entries: HashMap<String, Entry<T>>,
    keep_cache: bool,
}

impl<T: Clone> ItemStore<T> {
    pub(crate) fn new(keep_cache: bool) -> Self {
        Self {
            entries: HashMap::new(),
            keep_cache,
        }
    }

    /// Current state, or the default state for unknown identifiers.
    pub(crate) fn get(&self, id: &str) -> ItemState<T> {
        self.entries
            .get(id)
            .map(|entry| entry.state.clone())
            .unwrap_or_default()
    }

    /// Register `id` with the default state if it is not known yet.
    pub(crate) fn ensure(&mut self, id: &str) {
        if !self.entries.contains_key(id) {
            self.entries.insert(id.to_string(), Entry::default());
        }
    }

    pub(crate) fn has_observers(&self, id: &str) -> bool {
        self.observer_count(id) > 0
    }

    pub(crate) fn observer_count(&self, id: &str) -> usize {
        self.entries.get(id).map_or(0, |entry| entry.observers.len())
    }

    /// Number of registered identifiers.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Append an observer. The identifier must already be registered.
    pub(crate) fn add_observer(&mut self, id: &str, sub: SubscriptionId, observer: Observer<T>) {
        self.entries
            .entry(id.to_string())
            .or_default()
            .observers
            .push((sub, observer));
    }

    /// Remove an observer. Returns true if the identifier was evicted.
    pub(crate) fn remove_observer(&mut self, id: &str, sub: SubscriptionId) -> bool {
        let Some(entry) = self.entries.get_mut(id) else {
            return false;
        };
        entry.observers.retain(|(existing, _)| *existing != sub);

        if entry.observers.is_empty() && !self.keep_cache {
            self.entries.remove(id);
            return true;
        }
        false
    }

    /// Identifiers with at least one observer, sorted for a stable queue order.
    pub(crate) fn observed_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.observers.is_empty())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    // --- Mutations ---

    pub(crate) fn mark_queued(&mut self, id: &str) -> Option<Notification<T>> {
        self.update(id, ItemState::queued)
    }

    pub(crate) fn mark_loading(&mut self, id: &str) -> Option<Notification<T>> {
        self.update(id, ItemState::loading)
    }

    pub(crate) fn mark_succeeded(&mut self, id: &str, data: T) -> Option<Notification<T>> {
        self.update(id, |state| state.succeeded(data))
    }

    pub(crate) fn mark_failed(&mut self, id: &str) -> Option<Notification<T>> {
        self.update(id, ItemState::failed)
    }

    /// Apply a transition to a registered identifier. Unknown identifiers are
    /// skipped; a registered one with no observers is written but not notified.
    fn update<F>(&mut self, id: &str, transition: F) -> Option<Notification<T>>
    where
        F: FnOnce(&mut ItemState<T>),
    {
        let entry = self.entries.get_mut(id)?;
        transition(&mut entry.state);

        if entry.observers.is_empty() {
            return None;
        }

        Some(Notification {
            id: id.to_string(),
            state: entry.state.clone(),
            observers: entry
                .observers
                .iter()
                .map(|(_, observer)| observer.clone())
                .collect(),
        })
    }
}
