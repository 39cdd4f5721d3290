//! Topic pipeline error types.

use thiserror::Error;

/// Errors that can occur in the topic pipeline
#[derive(Error, Debug)]
pub enum TopicsError {
    /// Storage layer failure
    #[error("Storage error: {0}")]
    Storage(#[from] convo_storage::StorageError),

    /// Topic not found
    #[error("Topic not found: {0}")]
    NotFound(String),
}
