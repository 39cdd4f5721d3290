//! Summary generation error types.

use thiserror::Error;

/// Errors that can occur during summary generation and regeneration
#[derive(Error, Debug)]
pub enum SummaryError {
    /// Storage layer failure
    #[error("Storage error: {0}")]
    Storage(#[from] convo_storage::StorageError),

    /// Topic persistence failure
    #[error("Topics error: {0}")]
    Topics(#[from] convo_topics::TopicsError),

    /// Completion service failure
    #[error("LLM error: {0}")]
    Llm(#[from] convo_llm::LlmError),

    /// Model output did not match the summary contract
    #[error("Invalid summary output: {0}")]
    InvalidOutput(String),

    /// Topic not found
    #[error("Topic not found: {0}")]
    NotFound(String),
}
