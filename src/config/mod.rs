//! Configuration management for llm-call.
//!
//! Configuration is stored in TOML format. The search order is:
//! 1. `./llm-call.toml` (project-local)
//! 2. `~/.config/llm-call/config.toml` (XDG config)
//!
//! # Example Configuration
//!
//! ```toml
//! default_model = "gpt-4o-mini"
//! judge_model = "gpt-4o-mini"
//!
//! [retry]
//! max_attempts = 3
//! initial_delay_ms = 1000
//! backoff_factor = 2.0
//!
//! [staged]
//! tool_suggestion_after = 2
//! human_review_after = 4
//!
//! [staged.tool]
//! name = "perplexity-ask"
//! config = { command = "npx", args = ["-y", "perplexity-ask"] }
//!
//! [providers.anthropic]
//! api_key_env = "ANTHROPIC_API_KEY"
//!
//! [providers.claude_proxy]
//! base_url = "http://localhost:3010"
//! ```

mod file;
mod types;

pub use file::{from_path, from_str, load, search_paths, xdg_config_dir};
pub use types::{LlmCallConfig, ProviderSection, ProvidersConfig};
pub(crate) use types::config_error;
