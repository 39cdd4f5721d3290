//! Orchestration error types.

use thiserror::Error;

/// Errors that can occur during orchestration
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Storage layer failure
    #[error("Storage error: {0}")]
    Storage(#[from] convo_storage::StorageError),

    /// Thread pipeline failure
    #[error("Threads error: {0}")]
    Threads(#[from] convo_threads::ThreadsError),

    /// Topic pipeline failure
    #[error("Topics error: {0}")]
    Topics(#[from] convo_topics::TopicsError),

    /// Summary generation failure
    #[error("Summary error: {0}")]
    Summary(#[from] convo_summaries::SummaryError),

    /// Topic not found
    #[error("Topic not found: {0}")]
    NotFound(String),
}
