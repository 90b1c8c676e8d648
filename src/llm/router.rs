//! Model-name routing.
//!
//! A model string such as `vertex_ai/gemini-1.5-pro` or `max/opus` names both
//! a backend and the model to ask it for. [`resolve_route`] splits the two,
//! and [`Router`] turns the result into a ready client.

use crate::config::ProvidersConfig;
use crate::llm::anthropic::AnthropicClient;
use crate::llm::claude_cli::ClaudeCliClient;
use crate::llm::claude_proxy::ClaudeProxyClient;
use crate::llm::client::LLMClient;
use crate::llm::config::{ProviderConfig, ProviderKind};
use crate::llm::error::LLMError;
use crate::llm::gemini::GeminiClient;
use crate::llm::openai::OpenAIClient;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// Where a model name leads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// The backend that serves the model
    pub provider: ProviderKind,
    /// The model name to send to that backend
    pub model: String,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.model.is_empty() {
            write!(f, "{} (default model)", self.provider)
        } else {
            write!(f, "{} {}", self.provider, self.model)
        }
    }
}

/// How the model name is derived once a rule matches.
#[derive(Clone, Copy)]
enum ModelName {
    /// Send the name as given
    AsGiven,
    /// Send what follows the matched prefix
    StripPrefix,
    /// Like `StripPrefix`, but an empty remainder is allowed
    StripPrefixAllowEmpty,
}

/// Routing rules, checked in order; the first matching prefix wins.
const RULES: &[(&str, ProviderKind, ModelName)] = &[
    ("max/", ProviderKind::ClaudeProxy, ModelName::AsGiven),
    ("claude-max", ProviderKind::ClaudeProxy, ModelName::AsGiven),
    ("claude-cli/", ProviderKind::ClaudeCli, ModelName::StripPrefixAllowEmpty),
    ("vertex_ai/", ProviderKind::Gemini, ModelName::StripPrefix),
    ("gemini/", ProviderKind::Gemini, ModelName::StripPrefix),
    ("gemini-", ProviderKind::Gemini, ModelName::AsGiven),
    ("anthropic/", ProviderKind::Anthropic, ModelName::StripPrefix),
    ("claude-", ProviderKind::Anthropic, ModelName::AsGiven),
    ("openai/", ProviderKind::OpenAI, ModelName::StripPrefix),
    ("gpt-", ProviderKind::OpenAI, ModelName::AsGiven),
    ("chatgpt-", ProviderKind::OpenAI, ModelName::AsGiven),
    ("o1", ProviderKind::OpenAI, ModelName::AsGiven),
    ("o3", ProviderKind::OpenAI, ModelName::AsGiven),
    ("o4", ProviderKind::OpenAI, ModelName::AsGiven),
    ("ollama/", ProviderKind::Ollama, ModelName::StripPrefix),
];

fn strip_prefix_ignore_case<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    name.get(..prefix.len())
        .filter(|head| head.eq_ignore_ascii_case(prefix))
        .map(|_| &name[prefix.len()..])
}

/// Resolves a model name to a provider and the model to send it.
///
/// Matching is case-insensitive; the model name keeps its original case.
///
/// # Errors
///
/// Returns `UnknownModel` if no rule matches or a provider prefix is
/// followed by nothing.
///
/// # Examples
///
/// ```
/// use llm_call::llm::{resolve_route, ProviderKind};
///
/// let route = resolve_route("vertex_ai/gemini-1.5-pro").unwrap();
/// assert_eq!(route.provider, ProviderKind::Gemini);
/// assert_eq!(route.model, "gemini-1.5-pro");
///
/// let proxied = resolve_route("max/opus").unwrap();
/// assert_eq!(proxied.provider, ProviderKind::ClaudeProxy);
/// assert_eq!(proxied.model, "max/opus");
/// ```
pub fn resolve_route(model: &str) -> Result<Route, LLMError> {
    let name = model.trim();

    for (prefix, provider, send) in RULES {
        let Some(rest) = strip_prefix_ignore_case(name, prefix) else {
            continue;
        };

        let sent = match send {
            ModelName::AsGiven => name,
            ModelName::StripPrefix if rest.trim().is_empty() => break,
            ModelName::StripPrefix | ModelName::StripPrefixAllowEmpty => rest.trim(),
        };

        return Ok(Route {
            provider: *provider,
            model: sent.to_string(),
        });
    }

    Err(LLMError::unknown_model(model))
}

/// Builds a client for one provider configuration.
///
/// # Errors
///
/// Returns the client constructor's error, typically a missing API key.
pub fn create_client(config: ProviderConfig) -> Result<Arc<dyn LLMClient>, LLMError> {
    let client: Arc<dyn LLMClient> = match config.kind {
        ProviderKind::OpenAI | ProviderKind::Ollama => Arc::new(OpenAIClient::new(&config)?),
        ProviderKind::Anthropic => Arc::new(AnthropicClient::new(config)?),
        ProviderKind::Gemini => Arc::new(GeminiClient::new(config)?),
        ProviderKind::ClaudeProxy => Arc::new(ClaudeProxyClient::new(config)?),
        ProviderKind::ClaudeCli => Arc::new(ClaudeCliClient::new(config)?),
    };
    Ok(client)
}

/// Resolves model names to clients, building each provider's client once.
#[derive(Debug, Default)]
pub struct Router {
    providers: ProvidersConfig,
    clients: RwLock<HashMap<ProviderKind, Arc<dyn LLMClient>>>,
}

impl Router {
    /// Creates a router over the given provider settings.
    #[must_use]
    pub fn new(providers: ProvidersConfig) -> Self {
        Self {
            providers,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a ready-made client for a provider, replacing any cached one.
    #[must_use]
    pub fn with_client(self, kind: ProviderKind, client: Arc<dyn LLMClient>) -> Self {
        self.insert_client(kind, client);
        self
    }

    /// Registers a client on a shared router.
    pub fn insert_client(&self, kind: ProviderKind, client: Arc<dyn LLMClient>) {
        match self.clients.write() {
            Ok(mut clients) => {
                clients.insert(kind, client);
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(kind, client);
            }
        }
    }

    /// Returns the provider settings.
    #[must_use]
    pub fn providers(&self) -> &ProvidersConfig {
        &self.providers
    }

    /// Resolves a model name and returns the route with its client.
    ///
    /// # Errors
    ///
    /// Returns `UnknownModel` for unroutable names, or the constructor error
    /// if the provider's client cannot be built.
    pub fn route(&self, model: &str) -> Result<(Route, Arc<dyn LLMClient>), LLMError> {
        let route = resolve_route(model)?;
        let client = self.client_for(route.provider)?;

        tracing::debug!(
            model = %model,
            provider = %route.provider,
            sent_model = %route.model,
            "routed model"
        );

        Ok((route, client))
    }

    /// Returns the client for a provider, building and caching it on first use.
    ///
    /// # Errors
    ///
    /// Returns the constructor error if the client cannot be built.
    pub fn client_for(&self, kind: ProviderKind) -> Result<Arc<dyn LLMClient>, LLMError> {
        let cached = match self.clients.read() {
            Ok(clients) => clients.get(&kind).cloned(),
            Err(poisoned) => poisoned.into_inner().get(&kind).cloned(),
        };
        if let Some(client) = cached {
            return Ok(client);
        }

        let client = create_client(self.providers.provider_config(kind))?;
        self.insert_client(kind, Arc::clone(&client));
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::{CompletionRequest, CompletionResponse};
    use async_trait::async_trait;

    fn route(model: &str) -> (ProviderKind, String) {
        let r = resolve_route(model).unwrap();
        (r.provider, r.model)
    }

    #[test]
    fn claude_proxy_keeps_full_name() {
        assert_eq!(route("max/opus"), (ProviderKind::ClaudeProxy, "max/opus".into()));
        assert_eq!(
            route("claude-max-sonnet"),
            (ProviderKind::ClaudeProxy, "claude-max-sonnet".into())
        );
    }

    #[test]
    fn claude_cli_strips_prefix_and_allows_empty() {
        assert_eq!(route("claude-cli/sonnet"), (ProviderKind::ClaudeCli, "sonnet".into()));
        assert_eq!(route("claude-cli/"), (ProviderKind::ClaudeCli, String::new()));
    }

    #[test]
    fn gemini_variants() {
        assert_eq!(
            route("vertex_ai/gemini-1.5-pro"),
            (ProviderKind::Gemini, "gemini-1.5-pro".into())
        );
        assert_eq!(
            route("gemini/gemini-2.0-flash"),
            (ProviderKind::Gemini, "gemini-2.0-flash".into())
        );
        assert_eq!(
            route("gemini-1.5-flash"),
            (ProviderKind::Gemini, "gemini-1.5-flash".into())
        );
    }

    #[test]
    fn anthropic_and_openai_variants() {
        assert_eq!(
            route("anthropic/claude-3-5-sonnet-20241022"),
            (ProviderKind::Anthropic, "claude-3-5-sonnet-20241022".into())
        );
        assert_eq!(
            route("claude-3-haiku-20240307"),
            (ProviderKind::Anthropic, "claude-3-haiku-20240307".into())
        );
        assert_eq!(route("openai/gpt-4o"), (ProviderKind::OpenAI, "gpt-4o".into()));
        assert_eq!(route("gpt-4o-mini"), (ProviderKind::OpenAI, "gpt-4o-mini".into()));
        assert_eq!(route("o3-mini"), (ProviderKind::OpenAI, "o3-mini".into()));
        assert_eq!(
            route("chatgpt-4o-latest"),
            (ProviderKind::OpenAI, "chatgpt-4o-latest".into())
        );
    }

    #[test]
    fn ollama_prefix() {
        assert_eq!(route("ollama/qwen2.5:7b"), (ProviderKind::Ollama, "qwen2.5:7b".into()));
    }

    #[test]
    fn matching_ignores_case_but_keeps_model_case() {
        assert_eq!(route("OpenAI/GPT-4o"), (ProviderKind::OpenAI, "GPT-4o".into()));
        assert_eq!(route("  MAX/Opus "), (ProviderKind::ClaudeProxy, "MAX/Opus".into()));
    }

    #[test]
    fn unknown_and_empty_names_fail() {
        assert!(resolve_route("llama-3-70b").unwrap_err().is_unknown_model());
        assert!(resolve_route("").unwrap_err().is_unknown_model());
        assert!(resolve_route("openai/").unwrap_err().is_unknown_model());
    }

    #[test]
    fn non_ascii_names_do_not_panic() {
        assert!(resolve_route("ñandú").is_err());
        assert!(resolve_route("é").is_err());
    }

    #[derive(Debug)]
    struct Canned;

    #[async_trait]
    impl LLMClient for Canned {
        async fn complete(
            &self,
            request: &CompletionRequest,
        ) -> Result<CompletionResponse, LLMError> {
            Ok(CompletionResponse::text("canned", &request.model, "ok"))
        }

        fn provider_name(&self) -> &'static str {
            "canned"
        }
    }

    #[test]
    fn injected_client_is_returned() {
        let router = Router::default().with_client(ProviderKind::OpenAI, Arc::new(Canned));
        let (route, client) = router.route("gpt-4o").unwrap();
        assert_eq!(route.model, "gpt-4o");
        assert_eq!(client.provider_name(), "canned");
    }

    #[test]
    fn clients_are_cached_per_provider() {
        let router = Router::default();
        let (_, first) = router.route("ollama/llama3").unwrap();
        let (_, second) = router.route("ollama/qwen2.5").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn unknown_model_error_precedes_client_construction() {
        let router = Router::default();
        assert!(router.route("mystery-model").unwrap_err().is_unknown_model());
    }
}
