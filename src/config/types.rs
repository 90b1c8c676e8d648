//! Configuration file types.

use crate::error::LlmCallError;
use crate::llm::{ProviderConfig, ProviderKind};
use crate::logging::LoggingConfig;
use crate::retry::{RetryConfig, RetryError, RetryErrorKind, StagedRetryConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure for llm-call.
///
/// This structure maps directly to the TOML configuration file format:
///
/// ```toml
/// default_model = "gpt-4o-mini"
/// judge_model = "gpt-4o-mini"
///
/// [retry]
/// max_attempts = 5
///
/// [providers.ollama]
/// base_url = "http://localhost:11434/v1"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmCallConfig {
    /// Model used when a request does not name one.
    #[serde(default)]
    pub default_model: Option<String>,

    /// Model that runs AI-judge validators.
    ///
    /// Falls back to the request's own model when unset.
    #[serde(default)]
    pub judge_model: Option<String>,

    /// Default retry policy.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Staged escalation; absent means plain retries only.
    #[serde(default)]
    pub staged: Option<StagedRetryConfig>,

    /// Per-provider settings.
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// File logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl LlmCallConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default model.
    #[must_use]
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    /// Sets the judge model.
    #[must_use]
    pub fn with_judge_model(mut self, model: impl Into<String>) -> Self {
        self.judge_model = Some(model.into());
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Enables staged retries.
    #[must_use]
    pub fn with_staged(mut self, staged: StagedRetryConfig) -> Self {
        self.staged = Some(staged);
        self
    }

    /// Sets the settings for one provider.
    #[must_use]
    pub fn with_provider(mut self, kind: ProviderKind, section: ProviderSection) -> Self {
        *self.providers.section_mut(kind) = Some(section);
        self
    }

    /// Checks retry and staged values.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the offending field.
    pub fn validate(&self) -> Result<(), LlmCallError> {
        self.retry.validate().map_err(config_error)?;
        if let Some(ref staged) = self.staged {
            staged.validate().map_err(config_error)?;
        }
        if let Some(ref model) = self.default_model {
            if model.trim().is_empty() {
                return Err(LlmCallError::configuration(
                    "default_model",
                    "must not be empty when set",
                ));
            }
        }
        Ok(())
    }
}

/// Maps a rejected retry policy to a configuration error on the same field.
pub(crate) fn config_error(error: RetryError) -> LlmCallError {
    match error.kind {
        RetryErrorKind::InvalidConfig { field, reason } => LlmCallError::configuration(field, reason),
        other => LlmCallError::configuration("retry", RetryError::new(other).to_string()),
    }
}

/// Settings for every provider, keyed by the `[providers.*]` tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// `[providers.openai]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai: Option<ProviderSection>,
    /// `[providers.anthropic]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anthropic: Option<ProviderSection>,
    /// `[providers.gemini]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini: Option<ProviderSection>,
    /// `[providers.claude_proxy]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claude_proxy: Option<ProviderSection>,
    /// `[providers.claude_cli]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claude_cli: Option<ProviderSection>,
    /// `[providers.ollama]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ollama: Option<ProviderSection>,
}

impl ProvidersConfig {
    /// Returns the section for a provider, if the file has one.
    #[must_use]
    pub fn section(&self, kind: ProviderKind) -> Option<&ProviderSection> {
        match kind {
            ProviderKind::OpenAI => self.openai.as_ref(),
            ProviderKind::Anthropic => self.anthropic.as_ref(),
            ProviderKind::Gemini => self.gemini.as_ref(),
            ProviderKind::ClaudeProxy => self.claude_proxy.as_ref(),
            ProviderKind::ClaudeCli => self.claude_cli.as_ref(),
            ProviderKind::Ollama => self.ollama.as_ref(),
        }
    }

    fn section_mut(&mut self, kind: ProviderKind) -> &mut Option<ProviderSection> {
        match kind {
            ProviderKind::OpenAI => &mut self.openai,
            ProviderKind::Anthropic => &mut self.anthropic,
            ProviderKind::Gemini => &mut self.gemini,
            ProviderKind::ClaudeProxy => &mut self.claude_proxy,
            ProviderKind::ClaudeCli => &mut self.claude_cli,
            ProviderKind::Ollama => &mut self.ollama,
        }
    }

    /// Builds the runtime configuration for a provider.
    ///
    /// Providers without a section get their defaults, with the API key
    /// taken from the provider's standard environment variable.
    #[must_use]
    pub fn provider_config(&self, kind: ProviderKind) -> ProviderConfig {
        match self.section(kind) {
            Some(section) => section.to_provider_config(kind),
            None => ProviderSection::default().to_provider_config(kind),
        }
    }
}

/// One `[providers.<name>]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSection {
    /// Direct API key value (discouraged - use api_key_env instead).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable name containing the API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Custom base URL for the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Default maximum tokens to generate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Google Cloud project; switches Gemini to Vertex AI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// Google Cloud region for Vertex AI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Program to run for the Claude CLI provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
}

impl ProviderSection {
    /// Creates an empty section.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key environment variable.
    #[must_use]
    pub fn with_api_key_env(mut self, env_var: impl Into<String>) -> Self {
        self.api_key_env = Some(env_var.into());
        self
    }

    /// Sets a direct API key (discouraged).
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the timeout in seconds.
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Sets the maximum tokens.
    #[must_use]
    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    /// Sets the Google Cloud project.
    #[must_use]
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Sets the Claude CLI program.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = Some(program.into());
        self
    }

    /// Resolves the API key from environment or direct value.
    ///
    /// Resolution order:
    /// 1. `api_key_env` - read from environment variable
    /// 2. The provider's standard variable (OPENAI_API_KEY, ANTHROPIC_API_KEY, GEMINI_API_KEY)
    /// 3. `api_key` - direct value in config
    /// 4. Empty string (for local providers)
    #[must_use]
    pub fn resolve_api_key(&self, kind: ProviderKind) -> String {
        let candidates = self
            .api_key_env
            .as_deref()
            .into_iter()
            .chain(kind.default_api_key_env());

        for env_var in candidates {
            if let Ok(key) = std::env::var(env_var) {
                if !key.is_empty() {
                    return key;
                }
            }
        }

        self.api_key.clone().unwrap_or_default()
    }

    /// Converts this section to a runtime [`ProviderConfig`].
    #[must_use]
    pub fn to_provider_config(&self, kind: ProviderKind) -> ProviderConfig {
        let mut config = ProviderConfig::for_kind(kind).with_api_key(self.resolve_api_key(kind));

        if let Some(ref url) = self.base_url {
            config = config.with_base_url(url);
        }

        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }

        if let Some(tokens) = self.max_tokens {
            config = config.with_max_tokens(tokens);
        }

        if let Some(ref project) = self.project {
            config = config.with_project(project);
        }

        if let Some(ref location) = self.location {
            config = config.with_location(location);
        }

        if let Some(ref program) = self.program {
            config = config.with_program(program);
        }

        config
    }
}
