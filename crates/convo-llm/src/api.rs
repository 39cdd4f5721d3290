//! API-backed completion client for OpenAI-compatible and Anthropic
//! endpoints.

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};

use super::{CompletionClient, LlmError};

/// Configuration for the API completion client.
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// API base URL (e.g., "https://api.openai.com/v1")
    pub base_url: String,

    /// Model to use (e.g., "gpt-4o-mini", "claude-3-haiku-20240307")
    pub model: String,

    /// API key
    pub api_key: SecretString,

    /// Completion token ceiling per request
    pub max_tokens: u32,

    /// Request timeout
    pub timeout: Duration,

    /// Maximum retries on failure
    pub max_retries: u32,
}

impl ApiClientConfig {
    /// Create config for the OpenAI API.
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: model.into(),
            api_key: SecretString::from(api_key.into()),
            max_tokens: 800,
            timeout: Duration::from_secs(60),
            max_retries: 3,
        }
    }

    /// Create config for the Anthropic API.
    pub fn anthropic(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: "https://api.anthropic.com/v1".to_string(),
            model: model.into(),
            api_key: SecretString::from(api_key.into()),
            max_tokens: 800,
            timeout: Duration::from_secs(60),
            max_retries: 3,
        }
    }

    /// Override the completion token ceiling.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// API-backed completion client.
pub struct ApiClient {
    client: Client,
    config: ApiClientConfig,
}

impl ApiClient {
    /// Create a new API client.
    pub fn new(config: ApiClientConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::ConfigError(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Call the API with retry logic.
    async fn call_with_retries(&self, prompt: &str) -> Result<String, LlmError> {
        let mut backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(120)),
            ..Default::default()
        };

        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!(attempt = attempts, "Calling completion API");

            match self.make_request(prompt).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if attempts >= self.config.max_retries {
                        error!(error = %e, "Max retries exceeded");
                        return Err(e);
                    }

                    match backoff.next_backoff() {
                        Some(duration) => {
                            warn!(
                                error = %e,
                                retry_in_ms = duration.as_millis(),
                                "API call failed, retrying"
                            );
                            tokio::time::sleep(duration).await;
                        }
                        None => {
                            error!(error = %e, "Backoff exhausted");
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    /// Make a single API request, dispatching on endpoint type.
    async fn make_request(&self, prompt: &str) -> Result<String, LlmError> {
        let is_anthropic = self.config.base_url.contains("anthropic");

        if is_anthropic {
            self.make_anthropic_request(prompt).await
        } else {
            self.make_openai_request(prompt).await
        }
    }

    /// Make an OpenAI-compatible API request.
    async fn make_openai_request(&self, prompt: &str) -> Result<String, LlmError> {
        #[derive(Serialize)]
        struct OpenAIRequest {
            model: String,
            messages: Vec<OpenAIMessage>,
            max_tokens: u32,
        }

        #[derive(Serialize)]
        struct OpenAIMessage {
            role: String,
            content: String,
        }

        #[derive(Deserialize)]
        struct OpenAIResponse {
            choices: Vec<OpenAIChoice>,
        }

        #[derive(Deserialize)]
        struct OpenAIChoice {
            message: OpenAIMessageResponse,
        }

        #[derive(Deserialize)]
        struct OpenAIMessageResponse {
            content: String,
        }

        let request = OpenAIRequest {
            model: self.config.model.clone(),
            messages: vec![OpenAIMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: self.config.max_tokens,
        };

        let url = format!("{}/chat/completions", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.config.api_key.expose_secret()),
            )
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::ApiError(e.to_string()))?;

        if response.status() == 429 {
            return Err(LlmError::RateLimitExceeded);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError(format!("HTTP {}: {}", status, body)));
        }

        let response_body: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        response_body
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| LlmError::ParseError("No choices in response".to_string()))
    }

    /// Make an Anthropic API request.
    async fn make_anthropic_request(&self, prompt: &str) -> Result<String, LlmError> {
        #[derive(Serialize)]
        struct AnthropicRequest {
            model: String,
            max_tokens: u32,
            messages: Vec<AnthropicMessage>,
        }

        #[derive(Serialize)]
        struct AnthropicMessage {
            role: String,
            content: String,
        }

        #[derive(Deserialize)]
        struct AnthropicResponse {
            content: Vec<AnthropicContent>,
        }

        #[derive(Deserialize)]
        struct AnthropicContent {
            text: String,
        }

        let request = AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let url = format!("{}/messages", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", self.config.api_key.expose_secret())
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::ApiError(e.to_string()))?;

        if response.status() == 429 {
            return Err(LlmError::RateLimitExceeded);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError(format!("HTTP {}: {}", status, body)));
        }

        let response_body: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        response_body
            .content
            .first()
            .map(|c| c.text.clone())
            .ok_or_else(|| LlmError::ParseError("No content in response".to_string()))
    }
}

#[async_trait]
impl CompletionClient for ApiClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        if prompt.trim().is_empty() {
            return Err(LlmError::EmptyPrompt);
        }
        self.call_with_retries(prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: String) -> ApiClientConfig {
        ApiClientConfig {
            base_url,
            model: "gpt-4o-mini".to_string(),
            api_key: SecretString::from("test-key"),
            max_tokens: 800,
            timeout: Duration::from_secs(5),
            max_retries: 1,
        }
    }

    #[test]
    fn test_openai_config() {
        let config = ApiClientConfig::openai("test-key", "gpt-4o-mini");
        assert!(config.base_url.contains("openai"));
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.max_tokens, 800);
    }

    #[test]
    fn test_anthropic_config() {
        let config = ApiClientConfig::anthropic("test-key", "claude-3-haiku-20240307");
        assert!(config.base_url.contains("anthropic"));
    }

    #[test]
    fn test_max_tokens_override() {
        let config = ApiClientConfig::openai("test-key", "gpt-4o-mini").with_max_tokens(500);
        assert_eq!(config.max_tokens, 500);
    }

    #[tokio::test]
    async fn test_empty_prompt_rejected() {
        let client = ApiClient::new(ApiClientConfig::openai("test-key", "gpt-4o-mini")).unwrap();
        let result = client.complete("   ").await;
        assert!(matches!(result, Err(LlmError::EmptyPrompt)));
    }

    #[tokio::test]
    async fn test_openai_completion_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "{\"summary\": \"ok\"}"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(test_config(server.uri())).unwrap();
        let response = client.complete("summarize this").await.unwrap();
        assert_eq!(response, "{\"summary\": \"ok\"}");
    }

    #[tokio::test]
    async fn test_anthropic_completion_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/anthropic/messages"))
            .and(header("x-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"text": "hello"}]
            })))
            .mount(&server)
            .await;

        // Dispatch keys off the base URL
        let mut config = test_config(format!("{}/anthropic", server.uri()));
        config.model = "claude-3-haiku-20240307".to_string();
        let client = ApiClient::new(config).unwrap();
        let response = client.complete("say hello").await.unwrap();
        assert_eq!(response, "hello");
    }

    #[tokio::test]
    async fn test_rate_limit_maps_to_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = ApiClient::new(test_config(server.uri())).unwrap();
        let result = client.complete("summarize this").await;
        assert!(matches!(result, Err(LlmError::RateLimitExceeded)));
    }

    #[tokio::test]
    async fn test_server_error_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = ApiClient::new(test_config(server.uri())).unwrap();
        match client.complete("summarize this").await {
            Err(LlmError::ApiError(msg)) => assert!(msg.contains("500")),
            other => panic!("unexpected result {:?}", other),
        }
    }
}
