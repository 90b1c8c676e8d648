//! High-level entry point.
//!
//! [`LlmCaller`] ties the router, the validator registry and the retry loop
//! together: pick a model, route it, build the validators, retry until the
//! answer passes.
//!
//! ```rust,ignore
//! use llm_call::prelude::*;
//!
//! let caller = LlmCaller::load()?;
//! let result = caller
//!     .make_llm_request(
//!         LlmRequest::prompt("List three primes as a JSON array under 'primes'.")
//!             .with_model("gpt-4o-mini")
//!             .json()
//!             .with_validator(ValidatorSpec::named("field_present").with_param("fields", "primes")),
//!     )
//!     .await?;
//! println!("{} after {} attempt(s)", result.response.content, result.attempts);
//! ```

use crate::config::{self, LlmCallConfig};
use crate::error::LlmCallError;
use crate::llm::{CompletionRequest, CompletionResponse, ResponseFormat, Route, Router};
use crate::messages::Message;
use crate::retry::{retry_with_validation, AttemptRecord, RetryConfig, StagedRetryConfig};
use crate::types::RequestId;
use crate::validation::{
    ValidationContext, ValidationServices, ValidationStrategy, ValidatorRegistry, ValidatorSpec,
};
use serde_json::Value;
use tracing::Instrument;

/// A request to [`LlmCaller::make_llm_request`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmRequest {
    /// Model name, routed by prefix; the configured default applies when unset
    pub model: Option<String>,
    /// The conversation
    pub messages: Vec<Message>,
    /// System prompt placed before the conversation
    pub system: Option<String>,
    /// Validators to apply; empty means the default for the response format
    pub validation: Vec<ValidatorSpec>,
    /// Retry policy overriding the configured one
    pub retry: Option<RetryConfig>,
    /// Staged escalation overriding the configured one
    pub staged: Option<StagedRetryConfig>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Requested output format
    pub response_format: Option<ResponseFormat>,
}

impl LlmRequest {
    /// Creates a request for the given conversation.
    #[must_use]
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    /// Creates a request holding one user message.
    #[must_use]
    pub fn prompt(text: impl Into<String>) -> Self {
        Self::new(vec![Message::user(text)])
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the system prompt.
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Adds a validator.
    #[must_use]
    pub fn with_validator(mut self, spec: ValidatorSpec) -> Self {
        self.validation.push(spec);
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Enables staged retries for this request.
    #[must_use]
    pub fn with_staged(mut self, staged: StagedRetryConfig) -> Self {
        self.staged = Some(staged);
        self
    }

    /// Sets the maximum tokens.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Asks for a JSON object response.
    #[must_use]
    pub fn json(mut self) -> Self {
        self.response_format = Some(ResponseFormat::JsonObject);
        self
    }

    fn wants_json(&self) -> bool {
        self.response_format == Some(ResponseFormat::JsonObject)
    }
}

/// The accepted response of a call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallResult {
    /// Identifier attached to every log line of this call
    pub request_id: RequestId,
    /// Where the model name was routed
    pub route: Route,
    /// The response that passed validation
    pub response: CompletionResponse,
    /// Attempts used, including the accepted one
    pub attempts: u32,
    /// Every attempt, in order
    pub history: Vec<AttemptRecord>,
}

/// Routes requests, validates responses and retries.
#[derive(Debug)]
pub struct LlmCaller {
    config: LlmCallConfig,
    router: Router,
    registry: ValidatorRegistry,
}

impl LlmCaller {
    /// Creates a caller from a configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the retry or staged settings are invalid.
    pub fn from_config(config: LlmCallConfig) -> Result<Self, LlmCallError> {
        config.validate()?;
        let router = Router::new(config.providers.clone());
        Ok(Self {
            config,
            router,
            registry: ValidatorRegistry::with_builtins(),
        })
    }

    /// Creates a caller from the configuration file on the search path.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but is invalid.
    pub fn load() -> Result<Self, LlmCallError> {
        Self::from_config(config::load()?)
    }

    /// Replaces the router, e.g. one with pre-registered clients.
    #[must_use]
    pub fn with_router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    /// Replaces the validator registry.
    #[must_use]
    pub fn with_registry(mut self, registry: ValidatorRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &LlmCallConfig {
        &self.config
    }

    /// Returns the router.
    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Returns the validator registry.
    #[must_use]
    pub fn registry(&self) -> &ValidatorRegistry {
        &self.registry
    }

    /// Sends a prompt to a model and returns the validated text.
    ///
    /// # Errors
    ///
    /// As [`make_llm_request`](Self::make_llm_request).
    pub async fn ask(&self, model: &str, prompt: &str) -> Result<String, LlmCallError> {
        let result = self
            .make_llm_request(LlmRequest::prompt(prompt).with_model(model))
            .await?;
        Ok(result.response.content)
    }

    /// Routes, calls and validates one request.
    ///
    /// # Errors
    ///
    /// - `Configuration` if no model is known or the request has no messages
    /// - `Routing` if the model cannot be routed or its client cannot be built
    /// - `Validation` if a validator cannot be created
    /// - `Retry` if no response passed validation
    pub async fn make_llm_request(&self, request: LlmRequest) -> Result<CallResult, LlmCallError> {
        let request_id = RequestId::new();
        let span = tracing::info_span!("llm_request", request_id = %request_id);
        self.execute(request_id, request).instrument(span).await
    }

    async fn execute(&self, request_id: RequestId, request: LlmRequest) -> Result<CallResult, LlmCallError> {
        let retry = request.retry.unwrap_or(self.config.retry);
        retry.validate().map_err(config::config_error)?;
        let staged = request.staged.clone().or_else(|| self.config.staged.clone());
        if let Some(staged) = &staged {
            staged.validate().map_err(config::config_error)?;
        }

        let model = request
            .model
            .clone()
            .or_else(|| self.config.default_model.clone())
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| {
                LlmCallError::configuration(
                    "model",
                    "no model given; pass one or set default_model in the config file",
                )
            })?;

        if request.messages.is_empty() {
            return Err(LlmCallError::configuration("messages", "request has no messages"));
        }

        let (route, client) = self.router.route(&model)?;

        let validators = self.build_validators(&request, &model)?;

        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = request.system.as_deref().filter(|s| !s.trim().is_empty()) {
            messages.push(Message::system(system));
        }
        messages.extend(request.messages.iter().cloned());

        let mut completion = CompletionRequest::new(route.model.clone(), messages);
        completion.max_tokens = request.max_tokens;
        completion.temperature = request.temperature;
        completion.response_format = request.response_format;

        let context = ValidationContext::new(
            completion.first_user_prompt().unwrap_or_default(),
            model.clone(),
        );
        tracing::info!(
            model = %model,
            provider = %route.provider,
            validators = validators.len(),
            max_attempts = retry.max_attempts,
            "sending request"
        );

        let outcome = retry_with_validation(
            client.as_ref(),
            completion,
            &validators,
            &retry,
            staged.as_ref(),
            &context,
        )
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "request failed"))?;

        tracing::info!(attempts = outcome.attempts, "response accepted");

        Ok(CallResult {
            request_id,
            route,
            response: outcome.response,
            attempts: outcome.attempts,
            history: outcome.history,
        })
    }

    fn build_validators(
        &self,
        request: &LlmRequest,
        model: &str,
    ) -> Result<Vec<Box<dyn ValidationStrategy>>, LlmCallError> {
        let default_spec;
        let specs: &[ValidatorSpec] = if request.validation.is_empty() {
            default_spec = [ValidatorSpec::named(if request.wants_json() {
                "json_string"
            } else {
                "response_not_empty"
            })];
            &default_spec
        } else {
            &request.validation
        };

        let judge_model = self.config.judge_model.as_deref().unwrap_or(model);
        let services = self.judge_services(judge_model);

        specs
            .iter()
            .map(|spec| match spec.params.get("model") {
                Some(Value::String(own_model)) => {
                    let own = self.judge_services(own_model);
                    let mut spec = spec.clone();
                    spec.params.remove("model");
                    Ok(self.registry.create(&spec, &own)?)
                }
                _ => Ok(self.registry.create(spec, &services)?),
            })
            .collect()
    }

    /// Routes a judge model; an unroutable judge leaves the services empty so
    /// that only AI-assisted validators fail.
    fn judge_services(&self, judge_model: &str) -> ValidationServices {
        match self.router.route(judge_model) {
            Ok((route, client)) => ValidationServices::with_judge(client, route.model),
            Err(e) => {
                tracing::debug!(judge_model = %judge_model, error = %e, "judge unavailable");
                ValidationServices::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{CompletionResponse, LLMClient, LLMError, ProviderKind};
    use crate::messages::MessageRole;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct Scripted {
        replies: Mutex<VecDeque<String>>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl Scripted {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<CompletionRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LLMClient for Scripted {
        async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LLMError> {
            self.seen.lock().unwrap().push(request.clone());
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_default();
            Ok(CompletionResponse::text("scripted", &request.model, reply))
        }

        fn provider_name(&self) -> &'static str {
            "scripted"
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig::new(3).with_initial_delay(Duration::from_millis(10))
    }

    fn caller_with(kind: ProviderKind, client: Arc<Scripted>) -> LlmCaller {
        LlmCaller::from_config(LlmCallConfig::new().with_retry(fast_retry()))
            .unwrap()
            .with_router(Router::default().with_client(kind, client))
    }

    #[tokio::test(start_paused = true)]
    async fn json_mode_retries_until_valid() {
        let client = Scripted::new(&["Sure! Here it is.", r#"{"ok": true}"#]);
        let caller = caller_with(ProviderKind::OpenAI, Arc::clone(&client));

        let result = caller
            .make_llm_request(LlmRequest::prompt("Give me JSON").with_model("gpt-4o-mini").json())
            .await
            .unwrap();

        assert_eq!(result.attempts, 2);
        assert_eq!(result.response.content, r#"{"ok": true}"#);
        assert_eq!(result.route.provider, ProviderKind::OpenAI);

        let seen = client.seen();
        assert_eq!(seen.len(), 2);
        let retry_messages = &seen[1].messages;
        assert_eq!(retry_messages[1].role, MessageRole::Assistant);
        assert!(retry_messages[2].content.contains("json_string"));
    }

    #[tokio::test]
    async fn system_prompt_leads_and_prefix_is_stripped() {
        let client = Scripted::new(&["fine"]);
        let caller = caller_with(ProviderKind::OpenAI, Arc::clone(&client));

        caller
            .make_llm_request(
                LlmRequest::prompt("hello")
                    .with_model("openai/gpt-4o")
                    .with_system("Be terse.")
                    .with_max_tokens(64),
            )
            .await
            .unwrap();

        let seen = client.seen();
        assert_eq!(seen[0].model, "gpt-4o");
        assert_eq!(seen[0].max_tokens, Some(64));
        assert_eq!(seen[0].messages[0], Message::system("Be terse."));
        assert_eq!(seen[0].messages[1], Message::user("hello"));
    }

    #[tokio::test]
    async fn bad_request_retry_settings_fail_before_any_call() {
        let client = Scripted::new(&["hi"]);
        let caller = caller_with(ProviderKind::OpenAI, Arc::clone(&client));

        let err = caller
            .make_llm_request(
                LlmRequest::prompt("hi")
                    .with_model("gpt-4o-mini")
                    .with_retry(RetryConfig::new(0)),
            )
            .await
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("max_attempts"));

        let err = caller
            .make_llm_request(
                LlmRequest::prompt("hi")
                    .with_model("unknown-model")
                    .with_staged(StagedRetryConfig::default().with_thresholds(3, 2)),
            )
            .await
            .unwrap_err();
        assert!(err.is_configuration());

        assert!(client.seen().is_empty());
    }

    #[tokio::test]
    async fn default_model_comes_from_config() {
        let client = Scripted::new(&["hi"]);
        let caller = LlmCaller::from_config(LlmCallConfig::new().with_default_model("ollama/llama3.2"))
            .unwrap()
            .with_router(Router::default().with_client(ProviderKind::Ollama, Arc::clone(&client) as Arc<dyn LLMClient>));

        let result = caller.make_llm_request(LlmRequest::prompt("hi")).await.unwrap();

        assert_eq!(result.route.model, "llama3.2");
        assert_eq!(result.request_id.to_string().split('_').next(), Some("req"));
    }

    #[tokio::test]
    async fn missing_model_is_a_configuration_error() {
        let caller = LlmCaller::from_config(LlmCallConfig::default()).unwrap();
        let err = caller.make_llm_request(LlmRequest::prompt("hi")).await.unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn empty_conversation_is_rejected() {
        let caller = LlmCaller::from_config(LlmCallConfig::default()).unwrap();
        let err = caller
            .make_llm_request(LlmRequest::new(vec![]).with_model("gpt-4o"))
            .await
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn unknown_validator_is_reported_before_calling() {
        let client = Scripted::new(&["never sent"]);
        let caller = caller_with(ProviderKind::OpenAI, Arc::clone(&client));

        let err = caller
            .make_llm_request(
                LlmRequest::prompt("hi")
                    .with_model("gpt-4o")
                    .with_validator(ValidatorSpec::named("jsn_string")),
            )
            .await
            .unwrap_err();

        assert!(matches!(err.kind, crate::error::LlmCallErrorKind::Validation(_)));
        assert!(client.seen().is_empty());
    }

    #[tokio::test]
    async fn unroutable_model_is_a_routing_error() {
        let caller = LlmCaller::from_config(LlmCallConfig::default()).unwrap();
        let err = caller.ask("mystery-model", "hi").await.unwrap_err();
        assert!(matches!(err.kind, crate::error::LlmCallErrorKind::Routing(_)));
    }

    #[tokio::test]
    async fn judge_runs_on_the_configured_model() {
        let answer = Scripted::new(&["Paris is the capital of France."]);
        let judge = Scripted::new(&[r#"{"valid": true, "reason": "accurate"}"#]);

        let caller = LlmCaller::from_config(
            LlmCallConfig::new()
                .with_retry(fast_retry())
                .with_judge_model("ollama/judge-model"),
        )
        .unwrap()
        .with_router(
            Router::default()
                .with_client(ProviderKind::OpenAI, Arc::clone(&answer) as Arc<dyn LLMClient>)
                .with_client(ProviderKind::Ollama, Arc::clone(&judge) as Arc<dyn LLMClient>),
        );

        let result = caller
            .make_llm_request(
                LlmRequest::prompt("Capital of France?")
                    .with_model("gpt-4o")
                    .with_validator(
                        ValidatorSpec::named("ai_judge").with_param("criteria", "Must be factually correct"),
                    ),
            )
            .await
            .unwrap();

        assert_eq!(result.attempts, 1);
        let judged = judge.seen();
        assert_eq!(judged.len(), 1);
        assert_eq!(judged[0].model, "judge-model");
        assert!(judged[0]
            .messages
            .iter()
            .any(|m| m.content.contains("Paris is the capital of France.")));
    }

    #[tokio::test]
    async fn ask_returns_the_text() {
        let client = Scripted::new(&["42"]);
        let caller = caller_with(ProviderKind::Anthropic, client);
        assert_eq!(caller.ask("claude-3-haiku", "6 * 7?").await.unwrap(), "42");
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_surfaces_as_retry_error() {
        let client = Scripted::new(&["", "", ""]);
        let caller = caller_with(ProviderKind::OpenAI, client);

        let err = caller.ask("gpt-4o", "say something").await.unwrap_err();

        assert!(err.is_exhausted());
        assert_eq!(err.as_retry().and_then(|e| e.attempts()), Some(3));
    }
}
