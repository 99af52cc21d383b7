// Each test file is compiled as a separate crate, so not every helper is
// used everywhere.
#![allow(dead_code)]

use batchcache::{BatchError, BulkLoader, ItemState};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Debounce window used by most tests.
pub const DEBOUNCE_MS: u64 = 50;

/// Sleep long enough for an armed debounce timer to fire.
pub const PAST_DEBOUNCE: Duration = Duration::from_millis(DEBOUNCE_MS + 10);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Item {
    pub id: String,
    pub version: u32,
}

pub fn item(id: &str) -> Item {
    Item {
        id: id.to_string(),
        version: 1,
    }
}

pub fn item_id(item: &Item) -> String {
    item.id.clone()
}

/// Every identifier list the loader was called with, in call order.
pub type Calls = Arc<Mutex<Vec<Vec<String>>>>;

pub type StateLog = Arc<Mutex<Vec<ItemState<Item>>>>;

pub fn calls() -> Calls {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn state_log() -> StateLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Loader resolving immediately with one item per requested identifier.
pub fn echo_loader(calls: &Calls) -> impl BulkLoader<Item> {
    let calls = Arc::clone(calls);
    move |ids: Vec<String>| {
        calls.lock().push(ids.clone());
        async move {
            let items: Vec<Item> = ids.iter().map(|id| item(id)).collect();
            Ok::<_, BatchError>(items)
        }
    }
}

/// Loader resolving after `delay` with items tagged `version`.
pub fn slow_loader(calls: &Calls, delay: Duration, version: u32) -> impl BulkLoader<Item> {
    let calls = Arc::clone(calls);
    move |ids: Vec<String>| {
        calls.lock().push(ids.clone());
        async move {
            tokio::time::sleep(delay).await;
            let items: Vec<Item> = ids
                .iter()
                .map(|id| Item {
                    id: id.clone(),
                    version,
                })
                .collect();
            Ok::<_, BatchError>(items)
        }
    }
}

/// Loader returning only the listed identifiers, whatever was asked for.
pub fn partial_loader(calls: &Calls, known: &[&str]) -> impl BulkLoader<Item> {
    let calls = Arc::clone(calls);
    let known: Vec<String> = known.iter().map(|id| id.to_string()).collect();
    move |ids: Vec<String>| {
        calls.lock().push(ids);
        let items: Vec<Item> = known.iter().map(|id| item(id)).collect();
        async move { Ok::<_, BatchError>(items) }
    }
}

/// Loader rejecting every call.
pub fn failing_loader(calls: &Calls) -> impl BulkLoader<Item> {
    let calls = Arc::clone(calls);
    move |ids: Vec<String>| {
        calls.lock().push(ids);
        async move { Err::<Vec<Item>, _>(BatchError::load("backend unavailable")) }
    }
}

/// Observer appending every delivered state to `log`.
pub fn recorder(log: &StateLog) -> impl Fn(&ItemState<Item>) + Send + Sync + 'static {
    let log = Arc::clone(log);
    move |state: &ItemState<Item>| log.lock().push(state.clone())
}
