//! Configuration file loading.
//!
//! Looks for `./llm-call.toml` first, then the XDG config directory.

use crate::config::types::LlmCallConfig;
use crate::error::LlmCallError;
use std::path::{Path, PathBuf};

/// Default configuration file name for project-local config.
const LOCAL_CONFIG_NAME: &str = "llm-call.toml";

/// Default configuration file name within XDG config directory.
const XDG_CONFIG_NAME: &str = "config.toml";

/// Application name for XDG directory lookup.
const APP_NAME: &str = "llm-call";

/// Loads configuration from the default search paths.
///
/// Search order:
/// 1. `./llm-call.toml` (project-local)
/// 2. `~/.config/llm-call/config.toml` (XDG config)
///
/// Returns the default configuration if no config file is found.
///
/// # Errors
///
/// Returns an error if a config file exists but cannot be parsed.
pub fn load() -> Result<LlmCallConfig, LlmCallError> {
    for path in search_paths() {
        if path.exists() {
            tracing::debug!(path = %path.display(), "loading configuration");
            return from_path(&path);
        }
    }

    Ok(LlmCallConfig::default())
}

/// Loads configuration from a specific file path.
///
/// # Errors
///
/// Returns an error if:
/// - The file cannot be read
/// - The file contains invalid TOML
/// - The TOML doesn't match the expected schema
pub fn from_path(path: &Path) -> Result<LlmCallConfig, LlmCallError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        LlmCallError::configuration(
            "config_file",
            format!("failed to read '{}': {}", path.display(), e),
        )
    })?;

    from_str(&contents).map_err(|e| {
        LlmCallError::configuration(
            "config_file",
            format!("failed to parse '{}': {}", path.display(), e),
        )
    })
}

/// Parses configuration from a TOML string.
///
/// # Errors
///
/// Returns an error if the TOML is invalid or doesn't match the schema.
///
/// # Example
///
/// ```
/// let config = llm_call::config::from_str(r#"
/// default_model = "claude-cli/sonnet"
///
/// [retry]
/// max_attempts = 5
/// "#).unwrap();
///
/// assert_eq!(config.retry.max_attempts, 5);
/// ```
pub fn from_str(toml_str: &str) -> Result<LlmCallConfig, LlmCallError> {
    toml::from_str(toml_str)
        .map_err(|e| LlmCallError::configuration("config", format!("invalid TOML: {e}")))
}

/// Returns the paths that would be searched for configuration files.
#[must_use]
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(LOCAL_CONFIG_NAME)];

    if let Some(config_dir) = xdg_config_dir() {
        paths.push(config_dir.join(XDG_CONFIG_NAME));
    }

    paths
}

/// Returns the path to the XDG config directory for llm-call.
///
/// This is `~/.config/llm-call` on most systems.
#[must_use]
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_NAME))
}
