//! Subscription handles.

use crate::types::ItemState;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Callback invoked with the new state of an item.
pub type Observer<T> = Arc<dyn Fn(&ItemState<T>) + Send + Sync>;

/// Unique identifier for an observer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

type Disposer = Box<dyn FnOnce() + Send + Sync>;

/// Handle to a registered observer.
///
/// The observer stays registered until [`Subscription::unsubscribe`] is
/// called or the handle is dropped.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: SubscriptionId,
    key: String,
    dispose: Option<Disposer>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId, key: String, dispose: Disposer) -> Self {
        Self {
            id,
            key,
            dispose: Some(dispose),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// The item identifier this subscription observes.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Remove the observer.
    pub fn unsubscribe(mut self) {
        self.dispose();
    }

    fn dispose(&mut self) {
        if let Some(dispose) = self.dispose.take() {
            dispose();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("active", &self.dispose.is_some())
            .finish()
    }
}

/// Channel-backed subscription to one item.
///
/// Every state change is buffered until received. Dropping the watch
/// unsubscribes.
pub struct ItemWatch<T> {
    subscription: Subscription,
    /// Channel to receive state changes.
    pub receiver: crossbeam_channel::Receiver<ItemState<T>>,
}

impl<T> ItemWatch<T> {
    pub(crate) fn new(
        subscription: Subscription,
        receiver: crossbeam_channel::Receiver<ItemState<T>>,
    ) -> Self {
        Self {
            subscription,
            receiver,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.subscription.id()
    }

    pub fn key(&self) -> &str {
        self.subscription.key()
    }

    /// Receive the next state change (blocking).
    pub fn recv(&self) -> Result<ItemState<T>, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a state change (non-blocking).
    pub fn try_recv(&self) -> Result<ItemState<T>, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> Result<ItemState<T>, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// All buffered state changes, oldest first.
    pub fn drain(&self) -> Vec<ItemState<T>> {
        self.receiver.try_iter().collect()
    }

    /// Stop observing.
    pub fn unsubscribe(self) {
        self.subscription.unsubscribe();
    }
}
