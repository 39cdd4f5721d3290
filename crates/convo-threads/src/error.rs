//! Thread pipeline error types.

use thiserror::Error;

/// Errors that can occur in the thread pipeline
#[derive(Error, Debug)]
pub enum ThreadsError {
    /// Storage layer failure
    #[error("Storage error: {0}")]
    Storage(#[from] convo_storage::StorageError),

    /// Completion service failure
    #[error("LLM error: {0}")]
    Llm(#[from] convo_llm::LlmError),

    /// Model output did not match the analysis contract
    #[error("Invalid analysis output: {0}")]
    InvalidAnalysis(String),

    /// Thread not found
    #[error("Thread not found: {0}")]
    NotFound(String),
}
