//! Google Gemini client.
//!
//! Talks to either the Generative Language API (`x-goog-api-key` header) or,
//! when a Google Cloud project is configured, to Vertex AI (bearer token).
//! Both accept the same `generateContent` body.

use crate::llm::client::{CompletionRequest, CompletionResponse, LLMClient, ResponseFormat, Usage};
use crate::llm::config::ProviderConfig;
use crate::llm::error::LLMError;
use crate::llm::response::{error_from_response, error_from_send, extract_content, token_count};
use crate::messages::{system_prompt, without_system, MessageRole};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use url::Url;

/// Client for Gemini models.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    /// HTTP client
    client: Client,
    /// Configuration
    config: ProviderConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystem>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
struct GeminiContent<'a> {
    role: &'static str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Clone, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct GeminiSystem {
    parts: Vec<OwnedPart>,
}

#[derive(Debug, Clone, Serialize)]
struct OwnedPart {
    text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

impl GeminiClient {
    /// Creates a new Gemini client.
    ///
    /// # Errors
    ///
    /// Returns an error if no credential is configured or the HTTP client
    /// cannot be created.
    pub fn new(config: ProviderConfig) -> Result<Self, LLMError> {
        if config.api_key().is_none() {
            return Err(LLMError::invalid_config(
                "api_key",
                "Gemini requires an API key (or a Vertex AI access token); set GEMINI_API_KEY",
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LLMError::network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Returns true if requests go to Vertex AI.
    #[must_use]
    pub fn is_vertex(&self) -> bool {
        self.config.project.is_some()
    }

    /// Returns the `generateContent` URL for a model.
    ///
    /// Neither URL carries a credential. Path parts are percent-encoded.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for an unparseable base URL or a Vertex
    /// location that is not a plain region name.
    fn endpoint(&self, model: &str) -> Result<Url, LLMError> {
        let method = format!("{model}:generateContent");

        match &self.config.project {
            Some(project) => {
                let location = &self.config.location;
                if location.is_empty()
                    || !location.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
                {
                    return Err(LLMError::invalid_config(
                        "location",
                        format!("'{location}' is not a Google Cloud region"),
                    ));
                }

                let mut url = Url::parse(&format!("https://{location}-aiplatform.googleapis.com"))
                    .map_err(|e| LLMError::invalid_config("location", e.to_string()))?;
                url.path_segments_mut()
                    .map_err(|()| LLMError::invalid_config("location", "URL cannot take a path"))?
                    .clear()
                    .extend([
                        "v1",
                        "projects",
                        project.as_str(),
                        "locations",
                        location.as_str(),
                        "publishers",
                        "google",
                        "models",
                        method.as_str(),
                    ]);
                Ok(url)
            }
            None => {
                let mut url = Url::parse(&self.config.base_url)
                    .map_err(|e| LLMError::invalid_config("base_url", e.to_string()))?;
                url.path_segments_mut()
                    .map_err(|()| LLMError::invalid_config("base_url", "URL cannot take a path"))?
                    .pop_if_empty()
                    .extend(["models", method.as_str()]);
                Ok(url)
            }
        }
    }

    fn build_body<'a>(&self, request: &'a CompletionRequest) -> GenerateContentRequest<'a> {
        let contents = without_system(&request.messages)
            .into_iter()
            .map(|m| GeminiContent {
                // Gemini calls the assistant "model"
                role: if m.role == MessageRole::Assistant {
                    "model"
                } else {
                    "user"
                },
                parts: vec![GeminiPart { text: &m.content }],
            })
            .collect();

        GenerateContentRequest {
            contents,
            system_instruction: system_prompt(&request.messages).map(|text| GeminiSystem {
                parts: vec![OwnedPart { text }],
            }),
            generation_config: GenerationConfig {
                max_output_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
                temperature: request.temperature,
                response_mime_type: match request.response_format {
                    Some(ResponseFormat::JsonObject) => Some("application/json"),
                    _ => None,
                },
            },
        }
    }
}

#[async_trait]
impl LLMClient for GeminiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LLMError> {
        let body = self.build_body(request);

        let mut builder = self
            .client
            .post(self.endpoint(&request.model)?)
            .header("content-type", "application/json")
            .json(&body);

        builder = if self.is_vertex() {
            builder.bearer_auth(&self.config.api_key)
        } else {
            builder.header("x-goog-api-key", &self.config.api_key)
        };

        tracing::debug!(
            model = %request.model,
            vertex = self.is_vertex(),
            "sending generateContent request"
        );

        let response = builder
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

        let finish_reason = raw
            .pointer("/candidates/0/finishReason")
            .and_then(Value::as_str)
            .map(str::to_string);

        let usage = raw.get("usageMetadata").map(|u| Usage {
            input_tokens: token_count(u, "promptTokenCount"),
            output_tokens: token_count(u, "candidatesTokenCount"),
        });

        Ok(CompletionResponse {
            id: raw
                .get("responseId")
                .and_then(Value::as_str)
                .map(str::to_string),
            model: raw
                .get("modelVersion")
                .and_then(Value::as_str)
                .unwrap_or(&request.model)
                .to_string(),
            provider: self.provider_name().to_string(),
            content,
            finish_reason,
            usage,
            raw,
        })
    }

    fn provider_name(&self) -> &'static str {
        "gemini"
    }
}
