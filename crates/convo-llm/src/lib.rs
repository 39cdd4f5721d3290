//! # convo-llm
//!
//! Pluggable LLM completion client used by thread analysis and summary
//! generation. Callers build their own prompts and parse their own output;
//! this crate only moves text to a completion endpoint and back, with
//! retries.
//!
//! When no client is configured (or the endpoint is down), callers are
//! expected to fall back to their heuristic paths; [`CompletionClient::is_available`]
//! lets them skip the attempt entirely.

mod api;
mod mock;

pub use api::{ApiClient, ApiClientConfig};
pub use mock::{FailingClient, MockClient, UnavailableClient};

use async_trait::async_trait;
use thiserror::Error;

/// Error type for completion operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Completion service unavailable")]
    Unavailable,

    #[error("Empty prompt")]
    EmptyPrompt,
}

/// Pluggable completion client.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Generate a completion for the given prompt.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    /// Whether the client is configured and expected to answer.
    ///
    /// Callers probe this before batch work to avoid paying a failed
    /// request per item when the service is known to be down.
    fn is_available(&self) -> bool {
        true
    }
}

/// Extract a JSON object from completion text (handles markdown code
/// blocks and conversational prefixes).
pub fn extract_json(text: &str) -> String {
    if let Some(start) = text.find("```json") {
        if let Some(end) = text[start + 7..].find("```") {
            return text[start + 7..start + 7 + end].trim().to_string();
        }
    }

    if let Some(start) = text.find("```") {
        if let Some(end) = text[start + 3..].find("```") {
            return text[start + 3..start + 3 + end].trim().to_string();
        }
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        return text[start..=end].to_string();
    }

    text.to_string()
}
