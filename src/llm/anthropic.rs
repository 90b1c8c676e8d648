//! Anthropic API client.
//!
//! HTTP client for the Anthropic messages API. System messages are hoisted
//! into the top-level `system` field, as the API requires.

use crate::llm::client::{CompletionRequest, CompletionResponse, LLMClient, ResponseFormat, Usage};
use crate::llm::config::ProviderConfig;
use crate::llm::error::LLMError;
use crate::llm::response::{error_from_response, error_from_send, extract_content};
use crate::messages::{system_prompt, without_system};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Instruction appended to the system prompt in JSON mode; the messages API
/// has no native JSON switch.
const JSON_MODE_INSTRUCTION: &str =
    "Respond with a single valid JSON object and nothing else.";

/// Client for the Anthropic Claude API.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    /// HTTP client
    client: Client,
    /// Configuration
    config: ProviderConfig,
}

/// Request body for the Anthropic messages API.
#[derive(Debug, Clone, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// A message in the API format.
#[derive(Debug, Clone, Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// The subset of the messages response read beyond the text.
#[derive(Debug, Clone, Default, Deserialize)]
struct MessagesMeta {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

/// Usage statistics from the API.
#[derive(Debug, Clone, Copy, Deserialize)]
struct ApiUsage {
    input_tokens: u32,
    output_tokens: u32,
}

impl AnthropicClient {
    /// Creates a new Anthropic client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is missing or the HTTP client cannot be created.
    pub fn new(config: ProviderConfig) -> Result<Self, LLMError> {
        if config.api_key().is_none() {
            return Err(LLMError::invalid_config(
                "api_key",
                "Anthropic requires an API key; set ANTHROPIC_API_KEY",
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LLMError::network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Returns the messages endpoint URL.
    fn messages_endpoint(&self) -> String {
        format!("{}/v1/messages", self.config.base_url)
    }

    /// Builds the wire request.
    fn build_body<'a>(&self, request: &'a CompletionRequest) -> MessagesRequest<'a> {
        let mut system = system_prompt(&request.messages);
        if request.response_format == Some(ResponseFormat::JsonObject) {
            system = Some(match system {
                Some(s) => format!("{s}\n\n{JSON_MODE_INSTRUCTION}"),
                None => JSON_MODE_INSTRUCTION.to_string(),
            });
        }

        MessagesRequest {
            model: &request.model,
            max_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
            system,
            messages: without_system(&request.messages)
                .into_iter()
                .map(|m| ApiMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature: request.temperature,
        }
    }
}

#[async_trait]
impl LLMClient for AnthropicClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LLMError> {
        let body = self.build_body(request);

        let response = self
            .client
            .post(self.messages_endpoint())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.config.api_version)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| error_from_send(e, self.config.timeout))?;

        if !response.status().is_success() {
            return Err(error_from_response(&request.model, response).await);
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|e| LLMError::parse_error(format!("failed to parse response: {}", e)))?;

        let content = extract_content(&raw)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| LLMError::empty_response(self.provider_name()))?;
        let meta: MessagesMeta = serde_json::from_value(raw.clone()).unwrap_or_default();

        Ok(CompletionResponse {
            id: meta.id,
            model: meta.model.unwrap_or_else(|| request.model.clone()),
            provider: self.provider_name().to_string(),
            content,
            finish_reason: meta.stop_reason,
            usage: meta.usage.map(|u| Usage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
            }),
            raw,
        })
    }

    fn provider_name(&self) -> &'static str {
        "anthropic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Message;

    #[test]
    fn new_requires_api_key() {
        let err = AnthropicClient::new(ProviderConfig::anthropic("")).unwrap_err();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn system_messages_are_hoisted() {
        let client = AnthropicClient::new(ProviderConfig::anthropic("key")).unwrap();
        let request = CompletionRequest::new(
            "claude-3-5-sonnet-20241022",
            vec![
                Message::system("You are helpful."),
                Message::user("Hi"),
                Message::assistant("Hello"),
                Message::user("Bye"),
            ],
        );

        let wire = serde_json::to_value(client.build_body(&request)).unwrap();
        assert_eq!(wire["system"], "You are helpful.");
        assert_eq!(wire["messages"].as_array().unwrap().len(), 3);
        assert_eq!(wire["messages"][1]["role"], "assistant");
        assert_eq!(wire["max_tokens"], 4096);
    }

    #[test]
    fn json_mode_extends_system_prompt() {
        let client = AnthropicClient::new(ProviderConfig::anthropic("key")).unwrap();
        let request = CompletionRequest::new("claude-3-haiku", vec![Message::user("List")])
            .with_response_format(ResponseFormat::JsonObject);

        let wire = serde_json::to_value(client.build_body(&request)).unwrap();
        assert_eq!(wire["system"], JSON_MODE_INSTRUCTION);
    }

    #[tokio::test]
    async fn complete_parses_blocks_and_usage() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "key")
            .match_header("anthropic-version", "2023-06-01")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"id":"msg_1","type":"message","role":"assistant","model":"claude-3-haiku",
                    "content":[{"type":"text","text":"Bonjour"}],
                    "stop_reason":"end_turn","usage":{"input_tokens":5,"output_tokens":2}}"#,
            )
            .create_async()
            .await;

        let client =
            AnthropicClient::new(ProviderConfig::anthropic("key").with_base_url(server.url()))
                .unwrap();
        let request = CompletionRequest::new("claude-3-haiku", vec![Message::user("Hello in French")]);
        let response = client.complete(&request).await.unwrap();

        assert_eq!(response.content, "Bonjour");
        assert_eq!(response.finish_reason.as_deref(), Some("end_turn"));
        assert_eq!(response.usage.map(|u| u.output_tokens), Some(2));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn complete_maps_overloaded() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/messages")
            .with_status(529)
            .with_body(r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#)
            .create_async()
            .await;

        let client =
            AnthropicClient::new(ProviderConfig::anthropic("key").with_base_url(server.url()))
                .unwrap();
        let request = CompletionRequest::new("claude-3-haiku", vec![Message::user("hi")]);
        let err = client.complete(&request).await.unwrap_err();

        assert_eq!(err, LLMError::model_overloaded("claude-3-haiku"));
    }
}
