//! Observer registration for item state changes.
//!
//! Two flavours of subscription are offered:
//! - Callback observers, invoked synchronously on every state change
//! - Channel watches, which buffer state changes for a consumer thread
//!
//! Both unsubscribe when their handle is dropped.
//!
//! # Example
//!
//! ```ignore
//! let watch = batcher.watch("user-42");
//!
//! // Initial state before the first change arrives
//! let state = batcher.get_item("user-42");
//!
//! loop {
//!     match watch.recv() {
//!         Ok(state) if state.is_settled() => break,
//!         Ok(state) => println!("still loading: {:?}", state),
//!         Err(_) => break,
//!     }
//! }
//! ```

mod types;

pub use types::{ItemWatch, Observer, Subscription, SubscriptionId};
