//! Core types for the batching cache.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Load status of a single item.
///
/// The flags are independent but follow the lifecycle
/// queued -> loading -> succeeded | failed. An item that was never seen
/// reports the default state: queued, not loading, no errors, no data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemState<T> {
    pub is_loading: bool,
    pub is_queued: bool,
    pub has_errors: bool,
    pub data: Option<T>,
}

impl<T> Default for ItemState<T> {
    fn default() -> Self {
        Self {
            is_loading: false,
            is_queued: true,
            has_errors: false,
            data: None,
        }
    }
}

impl<T> ItemState<T> {
    /// Data is present and the last load did not fail.
    pub fn is_ready(&self) -> bool {
        self.data.is_some() && !self.has_errors
    }

    /// Neither queued nor loading.
    pub fn is_settled(&self) -> bool {
        !self.is_queued && !self.is_loading
    }

    pub(crate) fn queued(&mut self) {
        self.is_queued = true;
    }

    pub(crate) fn loading(&mut self) {
        self.is_loading = true;
        self.is_queued = false;
    }

    // Terminal transitions leave `is_queued` alone: an item re-queued while
    // this load was in flight is still waiting for the next one.
    pub(crate) fn succeeded(&mut self, data: T) {
        self.is_loading = false;
        self.has_errors = false;
        self.data = Some(data);
    }

    pub(crate) fn failed(&mut self) {
        self.is_loading = false;
        self.has_errors = true;
    }
}

/// An entry in the pending load queue.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum QueueEntry {
    /// A keyed request for one item.
    Item(String),
    /// A load with no identifier, issued when `load_without_items` is set.
    Unkeyed,
}

impl QueueEntry {
    /// The identifier, or `None` for the unkeyed entry.
    pub fn id(&self) -> Option<&str> {
        match self {
            QueueEntry::Item(id) => Some(id),
            QueueEntry::Unkeyed => None,
        }
    }
}

impl fmt::Debug for QueueEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueEntry::Item(id) => write!(f, "Item({})", id),
            QueueEntry::Unkeyed => write!(f, "Unkeyed"),
        }
    }
}

/// Counters describing batcher activity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatcherStats {
    /// Bulk loader invocations.
    pub flushes: u64,
    /// Loader calls that rejected or panicked.
    pub failed_loads: u64,
    /// Items marked succeeded.
    pub items_loaded: u64,
    /// Items the loader resolved without.
    pub items_missing: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_queued() {
        let state: ItemState<u32> = ItemState::default();
        assert!(state.is_queued);
        assert!(!state.is_loading);
        assert!(!state.has_errors);
        assert!(state.data.is_none());
        assert!(!state.is_settled());
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut state: ItemState<u32> = ItemState::default();

        state.loading();
        assert!(state.is_loading);
        assert!(!state.is_queued);

        state.succeeded(7);
        assert!(state.is_settled());
        assert!(state.is_ready());
        assert_eq!(state.data, Some(7));

        state.queued();
        state.loading();
        state.failed();
        assert!(state.has_errors);
        assert!(!state.is_ready());
        // Failure keeps the last good data.
        assert_eq!(state.data, Some(7));
    }

    #[test]
    fn test_requeue_during_load_survives_completion() {
        let mut state: ItemState<u32> = ItemState::default();
        state.loading();
        state.queued();
        state.succeeded(1);

        assert!(state.is_queued);
        assert!(!state.is_loading);
    }

    #[test]
    fn test_queue_entry_id() {
        assert_eq!(QueueEntry::Item("a".into()).id(), Some("a"));
        assert_eq!(QueueEntry::Unkeyed.id(), None);
    }
}
