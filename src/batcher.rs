//! The batch scheduler tying the item store, pending queue and loader together.

use crate::config::BatcherOptions;
use crate::error::{BatchError, Result};
use crate::loader::BulkLoader;
use crate::store::{ItemStore, Notification};
use crate::subscriptions::{ItemWatch, Observer, Subscription, SubscriptionId};
use crate::types::{BatcherStats, ItemState, QueueEntry};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

type Identify<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

/// The armed debounce timer.
struct Timer {
    generation: u64,
    handle: JoinHandle<()>,
}

/// State guarded by the batcher lock.
struct Shared<T> {
    store: ItemStore<T>,
    /// Requests accumulated since the last flush.
    queue: Vec<QueueEntry>,
    timer: Option<Timer>,
    /// Bumped on every re-arm; a timer only flushes if it is still current.
    generation: u64,
}

#[derive(Default)]
struct Counters {
    flushes: AtomicU64,
    failed_loads: AtomicU64,
    items_loaded: AtomicU64,
    items_missing: AtomicU64,
}

struct Inner<T> {
    identify: Identify<T>,
    loader: RwLock<Arc<dyn BulkLoader<T>>>,
    debounce: RwLock<Duration>,
    options: BatcherOptions,
    shared: Mutex<Shared<T>>,
    next_subscription: AtomicU64,
    counters: Counters,
    runtime: Handle,
}

/// Debounced request-batching cache.
///
/// Requests for individual items arriving within the debounce window are
/// coalesced into a single call to the bulk loader. Per-item load state is
/// tracked and pushed to observers on every change.
///
/// Cloning is cheap; clones share the same queue and item states.
pub struct Batcher<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Batcher<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Batcher<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a batcher driven by the current tokio runtime.
    ///
    /// Fails with [`BatchError::NoRuntime`] outside a runtime context.
    pub fn new<I, L>(identify: I, loader: L, options: BatcherOptions) -> Result<Self>
    where
        I: Fn(&T) -> String + Send + Sync + 'static,
        L: BulkLoader<T> + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| BatchError::NoRuntime)?;
        Ok(Self::with_runtime(runtime, identify, loader, options))
    }

    /// Create a batcher whose timers and loads run on `runtime`.
    pub fn with_runtime<I, L>(
        runtime: Handle,
        identify: I,
        loader: L,
        options: BatcherOptions,
    ) -> Self
    where
        I: Fn(&T) -> String + Send + Sync + 'static,
        L: BulkLoader<T> + 'static,
    {
        let loader: Arc<dyn BulkLoader<T>> = Arc::new(loader);
        let inner = Arc::new(Inner {
            identify: Arc::new(identify),
            loader: RwLock::new(loader),
            debounce: RwLock::new(options.debounce()),
            shared: Mutex::new(Shared {
                store: ItemStore::new(options.keep_cache),
                queue: Vec::new(),
                timer: None,
                generation: 0,
            }),
            options,
            next_subscription: AtomicU64::new(1),
            counters: Counters::default(),
            runtime,
        });

        if inner.options.load_without_items {
            inner.enqueue(vec![QueueEntry::Unkeyed]);
        }

        Self { inner }
    }

    /// Replace the loader used by future flushes. A load already in flight
    /// keeps the loader it started with.
    pub fn set_loader<L>(&self, loader: L)
    where
        L: BulkLoader<T> + 'static,
    {
        *self.inner.loader.write() = Arc::new(loader);
    }

    /// Replace the debounce window used the next time the timer is armed.
    pub fn set_debounce(&self, debounce: Duration) {
        *self.inner.debounce.write() = debounce;
    }

    pub fn debounce(&self) -> Duration {
        *self.inner.debounce.read()
    }

    pub fn options(&self) -> &BatcherOptions {
        &self.inner.options
    }

    /// Current state of an item, or the default state if it is unknown.
    pub fn get_item(&self, id: &str) -> ItemState<T> {
        self.inner.shared.lock().store.get(id)
    }

    /// Queue `id` for loading again, even if it is already queued or loading.
    pub fn refresh(&self, id: &str) {
        self.inner.enqueue(vec![QueueEntry::Item(id.to_string())]);
    }

    /// Queue every observed item, plus an unkeyed load when
    /// `load_without_items` is set.
    pub fn refresh_all(&self) {
        self.inner.enqueue_observed();
    }

    /// Observe an item.
    ///
    /// The first observer of an item queues it for loading. The callback is
    /// not invoked during this call; read the initial state with
    /// [`Batcher::get_item`].
    pub fn subscribe<F>(&self, id: &str, callback: F) -> Subscription
    where
        F: Fn(&ItemState<T>) + Send + Sync + 'static,
    {
        let sub = SubscriptionId(self.inner.next_subscription.fetch_add(1, Ordering::SeqCst));
        self.inner.attach(id, sub, Arc::new(callback));

        let inner = Arc::clone(&self.inner);
        let key = id.to_string();
        Subscription::new(sub, id.to_string(), Box::new(move || inner.detach(&key, sub)))
    }

    /// Observe an item through a channel.
    pub fn watch(&self, id: &str) -> ItemWatch<T> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let subscription = self.subscribe(id, move |state| {
            // Receiver gone means the watch is being dropped.
            let _ = sender.send(state.clone());
        });
        ItemWatch::new(subscription, receiver)
    }

    pub fn observer_count(&self, id: &str) -> usize {
        self.inner.shared.lock().store.observer_count(id)
    }

    /// Number of registered items, including cached ones without observers.
    pub fn len(&self) -> usize {
        self.inner.shared.lock().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> BatcherStats {
        let counters = &self.inner.counters;
        BatcherStats {
            flushes: counters.flushes.load(Ordering::Relaxed),
            failed_loads: counters.failed_loads.load(Ordering::Relaxed),
            items_loaded: counters.items_loaded.load(Ordering::Relaxed),
            items_missing: counters.items_missing.load(Ordering::Relaxed),
        }
    }
}

impl<T> Inner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn attach(self: &Arc<Self>, id: &str, sub: SubscriptionId, observer: Observer<T>) {
        let mut shared = self.shared.lock();

        if !shared.store.has_observers(id) {
            shared.store.ensure(id);
            // No observers yet, so marking it queued notifies nobody.
            let _ = self.push_locked(&mut shared, QueueEntry::Item(id.to_string()));
            self.arm_locked(&mut shared);
        }

        shared.store.add_observer(id, sub, observer);
    }

    fn detach(&self, id: &str, sub: SubscriptionId) {
        if self.shared.lock().store.remove_observer(id, sub) {
            debug!(id, "evicted item after last observer left");
        }
    }

    fn enqueue(self: &Arc<Self>, entries: Vec<QueueEntry>) {
        let notifications = {
            let mut shared = self.shared.lock();
            let notifications: Vec<_> = entries
                .into_iter()
                .filter_map(|entry| self.push_locked(&mut shared, entry))
                .collect();
            self.arm_locked(&mut shared);
            notifications
        };

        for notification in notifications {
            notification.deliver();
        }
    }

    fn enqueue_observed(self: &Arc<Self>) {
        let mut entries: Vec<QueueEntry> = self
            .shared
            .lock()
            .store
            .observed_ids()
            .into_iter()
            .map(QueueEntry::Item)
            .collect();
        if self.options.load_without_items {
            entries.push(QueueEntry::Unkeyed);
        }
        if !entries.is_empty() {
            self.enqueue(entries);
        }
    }

    /// Append to the pending queue and mark the item queued.
    fn push_locked(&self, shared: &mut Shared<T>, entry: QueueEntry) -> Option<Notification<T>> {
        let notification = entry.id().and_then(|id| shared.store.mark_queued(id));
        debug!(entry = ?entry, pending = shared.queue.len() + 1, "enqueued");
        shared.queue.push(entry);
        notification
    }

    /// Cancel the armed timer, if any, and start a fresh debounce window.
    fn arm_locked(self: &Arc<Self>, shared: &mut Shared<T>) {
        if let Some(timer) = shared.timer.take() {
            timer.handle.abort();
        }

        shared.generation += 1;
        let generation = shared.generation;
        let delay = *self.debounce.read();
        let inner = Arc::clone(self);

        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            inner.flush(generation).await;
        });
        shared.timer = Some(Timer { generation, handle });
    }

    async fn flush(self: Arc<Self>, generation: u64) {
        let (batch, loader, notifications) = {
            let mut shared = self.shared.lock();

            // A concurrent enqueue re-armed the timer after this one fired.
            match &shared.timer {
                Some(timer) if timer.generation == generation => {}
                _ => return,
            }
            // Detach from the timer slot so later enqueues start a new
            // window instead of cancelling this load.
            shared.timer = None;

            let batch = std::mem::take(&mut shared.queue);
            let notifications: Vec<_> = unique_ids(&batch)
                .into_iter()
                .filter_map(|id| shared.store.mark_loading(id))
                .collect();
            let loader = Arc::clone(&*self.loader.read());
            (batch, loader, notifications)
        };

        for notification in notifications {
            notification.deliver();
        }

        let ids: Vec<String> = batch
            .iter()
            .filter_map(QueueEntry::id)
            .map(str::to_string)
            .collect();
        debug!(requested = ids.len(), entries = batch.len(), "flushing batch");
        self.counters.flushes.fetch_add(1, Ordering::Relaxed);

        let outcome = run_loader(loader, ids).await;
        self.reconcile(&batch, outcome);
    }

    /// Write load results back to the store and notify observers.
    fn reconcile(&self, batch: &[QueueEntry], outcome: Result<Vec<T>>) {
        let ids = unique_ids(batch);

        let notifications = match outcome {
            Ok(items) => {
                let mut found: HashMap<String, T> = HashMap::with_capacity(items.len());
                for item in items {
                    found.entry((self.identify)(&item)).or_insert(item);
                }

                let mut shared = self.shared.lock();
                let mut notifications = Vec::with_capacity(ids.len());
                let mut missing = Vec::new();

                for id in ids {
                    match found.remove(id) {
                        Some(item) => {
                            self.counters.items_loaded.fetch_add(1, Ordering::Relaxed);
                            notifications.extend(shared.store.mark_succeeded(id, item));
                        }
                        None => missing.push(id),
                    }
                }

                if !missing.is_empty() {
                    warn!(missing = ?missing, "loader resolved without requested items");
                    self.counters
                        .items_missing
                        .fetch_add(missing.len() as u64, Ordering::Relaxed);
                }
                for id in missing {
                    notifications.extend(shared.store.mark_failed(id));
                }
                notifications
            }
            Err(e) => {
                warn!(error = %e, items = ids.len(), "bulk load failed");
                self.counters.failed_loads.fetch_add(1, Ordering::Relaxed);

                let mut shared = self.shared.lock();
                let notifications: Vec<_> = ids
                    .into_iter()
                    .filter_map(|id| shared.store.mark_failed(id))
                    .collect();
                notifications
            }
        };

        for notification in notifications {
            notification.deliver();
        }
    }
}

/// Keyed identifiers of a batch, first occurrence order, duplicates removed.
fn unique_ids(batch: &[QueueEntry]) -> Vec<&str> {
    let mut seen = HashSet::new();
    batch
        .iter()
        .filter_map(QueueEntry::id)
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Invoke the loader, turning panics into load errors.
async fn run_loader<T>(loader: Arc<dyn BulkLoader<T>>, ids: Vec<String>) -> Result<Vec<T>> {
    let future = std::panic::catch_unwind(AssertUnwindSafe(|| loader.load(ids)))
        .map_err(|payload| BatchError::LoaderPanicked(panic_message(payload)))?;

    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|payload| BatchError::LoaderPanicked(panic_message(payload)))?
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
