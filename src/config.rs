//! Batcher configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Batcher configuration.
///
/// `debounce_ms` can be changed later with `Batcher::set_debounce`;
/// `keep_cache` and `load_without_items` are fixed once the batcher exists.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatcherOptions {
    /// Quiet period after the last enqueue before a batch is flushed.
    /// Default: 0
    pub debounce_ms: u64,

    /// Keep item state after the last observer unsubscribes.
    /// Default: false
    pub keep_cache: bool,

    /// Issue a load with no identifiers on construction and on `refresh_all`.
    /// Default: false
    pub load_without_items: bool,
}

impl BatcherOptions {
    pub fn with_debounce_ms(mut self, debounce_ms: u64) -> Self {
        self.debounce_ms = debounce_ms;
        self
    }

    pub fn with_keep_cache(mut self, keep_cache: bool) -> Self {
        self.keep_cache = keep_cache;
        self
    }

    pub fn with_load_without_items(mut self, load_without_items: bool) -> Self {
        self.load_without_items = load_without_items;
        self
    }

    /// Debounce window as a `Duration`.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
