//! Bulk loader abstraction.
//!
//! A loader receives the identifiers of one flushed batch and resolves to the
//! items it found. It does not have to preserve request order or return
//! exactly the requested set; results are matched back to identifiers with
//! the batcher's identity function.

use crate::error::Result;
use futures::future::{self, BoxFuture, FutureExt};
use std::future::Future;

/// Loads many items in one call.
pub trait BulkLoader<T>: Send + Sync {
    fn load(&self, ids: Vec<String>) -> BoxFuture<'static, Result<Vec<T>>>;
}

impl<T, F, Fut> BulkLoader<T> for F
where
    F: Fn(Vec<String>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<T>>> + Send + 'static,
{
    fn load(&self, ids: Vec<String>) -> BoxFuture<'static, Result<Vec<T>>> {
        (self)(ids).boxed()
    }
}

/// Adapt a synchronous loader into one whose future is already resolved.
pub fn from_sync<T, F>(load: F) -> impl BulkLoader<T>
where
    T: Send + 'static,
    F: Fn(Vec<String>) -> Result<Vec<T>> + Send + Sync,
{
    move |ids: Vec<String>| future::ready(load(ids))
}
