//! Client for a local Claude proxy.
//!
//! The proxy exposes an OpenAI-shaped `/v1/chat/completions` endpoint backed
//! by a Claude subscription. Model names keep their `max/` prefix so the
//! proxy can pick the backing model itself.

use crate::llm::client::{CompletionRequest, CompletionResponse, LLMClient};
use crate::llm::config::ProviderConfig;
use crate::llm::error::LLMError;
use crate::llm::openai::{parse_chat_completion, ChatCompletionRequest};
use crate::llm::response::{error_from_response, error_from_send};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

/// Client for the local Claude proxy.
#[derive(Debug, Clone)]
pub struct ClaudeProxyClient {
    client: Client,
    config: ProviderConfig,
}

impl ClaudeProxyClient {
    /// Creates a new proxy client.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not a valid URL or the HTTP
    /// client cannot be created.
    pub fn new(config: ProviderConfig) -> Result<Self, LLMError> {
        url::Url::parse(&config.base_url).map_err(|e| {
            LLMError::invalid_config("base_url", format!("'{}': {}", config.base_url, e))
        })?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LLMError::network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.config.base_url)
    }
}

#[async_trait]
impl LLMClient for ClaudeProxyClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LLMError> {
        let body = ChatCompletionRequest::from_request(request, self.config.max_tokens);

        let mut builder = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = self.config.api_key() {
            builder = builder.bearer_auth(key);
        }

        tracing::debug!(model = %request.model, url = %self.endpoint(), "sending request to Claude proxy");

        let response = builder
            .send()
            .await
            .map_err(|e| error_from_send(e, self.config.timeout))?;

        if !response.status().is_success() {
            return Err(error_from_response(&request.model, response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| LLMError::parse_error(format!("failed to parse proxy response: {}", e)))?;

        parse_chat_completion(self.provider_name(), &request.model, body)
    }

    fn provider_name(&self) -> &'static str {
        "claude_proxy"
    }
}
