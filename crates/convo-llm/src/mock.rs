//! Test doubles for the completion client.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{CompletionClient, LlmError};

/// Completion client returning canned responses.
///
/// Responses queued with [`MockClient::push_response`] are returned in
/// order; once the queue is empty the fixed default response is returned.
pub struct MockClient {
    default_response: String,
    queued: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
}

impl MockClient {
    /// Create a mock that always answers with `response`.
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            queued: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Queue a one-shot response, returned before the default.
    pub fn push_response(&self, response: impl Into<String>) {
        self.queued.lock().expect("response queue mutex poisoned").push_back(response.into());
    }

    /// Number of completions served so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionClient for MockClient {
    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let queued = self.queued.lock().expect("response queue mutex poisoned").pop_front();
        Ok(queued.unwrap_or_else(|| self.default_response.clone()))
    }
}

/// Completion client that fails every request.
pub struct FailingClient;

#[async_trait]
impl CompletionClient for FailingClient {
    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::ApiError("injected failure".to_string()))
    }
}

/// Completion client that reports itself unavailable.
pub struct UnavailableClient;

#[async_trait]
impl CompletionClient for UnavailableClient {
    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::Unavailable)
    }

    fn is_available(&self) -> bool {
        false
    }
}
