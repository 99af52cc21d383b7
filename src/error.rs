//! Error types for the batching cache.

use std::fmt::Display;
use thiserror::Error;

/// Main error type for batcher operations.
///
/// Loader failures never reach callers of `subscribe`/`refresh`; they are
/// reported to observers through `ItemState::has_errors`.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("No tokio runtime available to drive the debounce timer")]
    NoRuntime,

    #[error("Bulk load failed: {0}")]
    Load(String),

    #[error("Bulk loader panicked: {0}")]
    LoaderPanicked(String),
}

impl BatchError {
    /// Wrap any displayable failure as a loader rejection.
    pub fn load(reason: impl Display) -> Self {
        BatchError::Load(reason.to_string())
    }
}

/// Result type for batcher operations.
pub type Result<T> = std::result::Result<T, BatchError>;
