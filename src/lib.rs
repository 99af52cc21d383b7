//! # Batch Cache
//!
//! A client-side request-batching cache. Many individual "give me item X"
//! requests arriving within a short window are coalesced into one bulk
//! fetch; per-item load state is tracked and pushed to observers.
//!
//! ## Core Concepts
//!
//! - **Item state**: queued / loading / failed flags plus the loaded data
//! - **Queue**: identifiers waiting for the next flush, debounced by a timer
//! - **Loader**: an async bulk fetch supplied by the caller
//! - **Observers**: callbacks or channel watches notified on every change
//!
//! ## Example
//!
//! ```ignore
//! use batchcache::{Batcher, BatcherOptions, BatchError};
//!
//! let batcher = Batcher::new(
//!     |user: &User| user.id.clone(),
//!     |ids: Vec<String>| async move { api::fetch_users(&ids).await.map_err(BatchError::load) },
//!     BatcherOptions::default().with_debounce_ms(10),
//! )?;
//!
//! // Both requests end up in one fetch
//! let alice = batcher.subscribe("alice", |state| println!("alice: {:?}", state));
//! let bob = batcher.subscribe("bob", |state| println!("bob: {:?}", state));
//!
//! // Later: load alice again
//! batcher.refresh("alice");
//! ```

pub mod batcher;
pub mod config;
pub mod error;
pub mod loader;
mod store;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use batcher::Batcher;
pub use config::BatcherOptions;
pub use error::{BatchError, Result};
pub use loader::{from_sync, BulkLoader};
pub use subscriptions::{ItemWatch, Observer, Subscription, SubscriptionId};
pub use types::{BatcherStats, ItemState, QueueEntry};
