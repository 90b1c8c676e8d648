//! Provider configuration.
//!
//! Runtime settings for each supported backend: endpoint, credentials,
//! timeouts and, for the Claude CLI, the program to run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The backends a model name can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// OpenAI chat completions API
    #[serde(rename = "openai")]
    OpenAI,
    /// Anthropic messages API
    Anthropic,
    /// Google Gemini, either the Generative Language API or Vertex AI
    Gemini,
    /// A local HTTP proxy in front of a Claude subscription
    ClaudeProxy,
    /// The `claude` command-line tool, run as a subprocess
    ClaudeCli,
    /// A local Ollama server speaking the OpenAI protocol
    Ollama,
}

impl ProviderKind {
    /// All provider kinds, in routing-table order.
    pub const ALL: [ProviderKind; 6] = [
        Self::OpenAI,
        Self::Anthropic,
        Self::Gemini,
        Self::ClaudeProxy,
        Self::ClaudeCli,
        Self::Ollama,
    ];

    /// Returns the short name used in configuration files and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::ClaudeProxy => "claude_proxy",
            Self::ClaudeCli => "claude_cli",
            Self::Ollama => "ollama",
        }
    }

    /// The environment variable conventionally holding this provider's key.
    #[must_use]
    pub fn default_api_key_env(self) -> Option<&'static str> {
        match self {
            Self::OpenAI => Some("OPENAI_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::Gemini => Some("GEMINI_API_KEY"),
            Self::ClaudeProxy | Self::ClaudeCli | Self::Ollama => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for a single provider client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Which backend this configuration is for
    pub kind: ProviderKind,
    /// The API key (or bearer token for Vertex AI); may be empty for local providers
    pub api_key: String,
    /// Base URL for the API
    pub base_url: String,
    /// API version header (Anthropic only)
    pub api_version: String,
    /// Default maximum tokens to generate when the request does not say
    pub max_tokens: u32,
    /// Request timeout
    pub timeout: Duration,
    /// Google Cloud project; when set, Gemini calls go to Vertex AI
    pub project: Option<String>,
    /// Google Cloud region for Vertex AI
    pub location: String,
    /// Program to execute for the Claude CLI provider
    pub program: String,
}

impl ProviderConfig {
    /// Creates the default configuration for the given provider kind.
    ///
    /// The API key is left empty; callers fill it from the environment or
    /// the configuration file.
    ///
    /// # Examples
    ///
    /// ```
    /// use llm_call::llm::{ProviderConfig, ProviderKind};
    ///
    /// let config = ProviderConfig::for_kind(ProviderKind::Ollama);
    /// assert_eq!(config.base_url, "http://localhost:11434/v1");
    /// ```
    #[must_use]
    pub fn for_kind(kind: ProviderKind) -> Self {
        let (base_url, timeout) = match kind {
            ProviderKind::OpenAI => ("https://api.openai.com/v1", 120),
            ProviderKind::Anthropic => ("https://api.anthropic.com", 120),
            ProviderKind::Gemini => ("https://generativelanguage.googleapis.com/v1beta", 120),
            ProviderKind::ClaudeProxy => ("http://localhost:3010", 300),
            ProviderKind::ClaudeCli => ("", 300),
            ProviderKind::Ollama => ("http://localhost:11434/v1", 300),
        };

        Self {
            kind,
            api_key: String::new(),
            base_url: base_url.to_string(),
            api_version: if kind == ProviderKind::Anthropic {
                "2023-06-01".to_string()
            } else {
                String::new()
            },
            max_tokens: 4096,
            timeout: Duration::from_secs(timeout),
            project: None,
            location: "us-central1".to_string(),
            program: if kind == ProviderKind::ClaudeCli {
                "claude".to_string()
            } else {
                String::new()
            },
        }
    }

    /// Creates an OpenAI configuration with the given API key.
    #[must_use]
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::for_kind(ProviderKind::OpenAI).with_api_key(api_key)
    }

    /// Creates an Anthropic configuration with the given API key.
    #[must_use]
    pub fn anthropic(api_key: impl Into<String>) -> Self {
        Self::for_kind(ProviderKind::Anthropic).with_api_key(api_key)
    }

    /// Creates a Gemini (Generative Language API) configuration.
    #[must_use]
    pub fn gemini(api_key: impl Into<String>) -> Self {
        Self::for_kind(ProviderKind::Gemini).with_api_key(api_key)
    }

    /// Creates a Vertex AI configuration authenticated with a bearer token.
    #[must_use]
    pub fn vertex(
        project: impl Into<String>,
        location: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self::for_kind(ProviderKind::Gemini)
            .with_api_key(access_token)
            .with_project(project)
            .with_location(location)
    }

    /// Creates a configuration for the local Claude proxy.
    #[must_use]
    pub fn claude_proxy(base_url: impl Into<String>) -> Self {
        Self::for_kind(ProviderKind::ClaudeProxy).with_base_url(base_url)
    }

    /// Creates a configuration that runs the given Claude CLI program.
    #[must_use]
    pub fn claude_cli(program: impl Into<String>) -> Self {
        Self::for_kind(ProviderKind::ClaudeCli).with_program(program)
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// Sets the base URL; a trailing slash is dropped.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let url: String = base_url.into();
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Sets the default maximum tokens.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the Google Cloud project, switching Gemini to Vertex AI.
    #[must_use]
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Sets the Google Cloud region.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Sets the Claude CLI program.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Returns the API key, or `None` when it is empty.
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        if self.api_key.is_empty() {
            None
        } else {
            Some(&self.api_key)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_per_kind() {
        let openai = ProviderConfig::for_kind(ProviderKind::OpenAI);
        assert_eq!(openai.base_url, "https://api.openai.com/v1");
        assert!(openai.api_version.is_empty());

        let anthropic = ProviderConfig::for_kind(ProviderKind::Anthropic);
        assert_eq!(anthropic.api_version, "2023-06-01");

        let cli = ProviderConfig::for_kind(ProviderKind::ClaudeCli);
        assert_eq!(cli.program, "claude");
        assert_eq!(cli.timeout, Duration::from_secs(300));
    }

    #[test]
    fn vertex_sets_project_and_location() {
        let config = ProviderConfig::vertex("proj-1", "europe-west4", "token");
        assert_eq!(config.kind, ProviderKind::Gemini);
        assert_eq!(config.project.as_deref(), Some("proj-1"));
        assert_eq!(config.location, "europe-west4");
        assert_eq!(config.api_key(), Some("token"));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let config = ProviderConfig::claude_proxy("http://localhost:3010/");
        assert_eq!(config.base_url, "http://localhost:3010");
    }

    #[test]
    fn empty_api_key_reads_as_none() {
        assert!(ProviderConfig::for_kind(ProviderKind::Ollama).api_key().is_none());
        assert_eq!(ProviderConfig::openai("sk-1").api_key(), Some("sk-1"));
    }

    #[test]
    fn kind_names_and_key_envs() {
        assert_eq!(ProviderKind::ClaudeProxy.to_string(), "claude_proxy");
        assert_eq!(
            ProviderKind::Anthropic.default_api_key_env(),
            Some("ANTHROPIC_API_KEY")
        );
        assert_eq!(ProviderKind::Ollama.default_api_key_env(), None);
    }

    #[test]
    fn kind_deserializes_from_snake_case() {
        let kind: ProviderKind = serde_json::from_str("\"claude_cli\"").unwrap();
        assert_eq!(kind, ProviderKind::ClaudeCli);
    }
}
