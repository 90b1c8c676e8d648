//! Staged escalation for the retry loop.
//!
//! Failed attempts move a call through three stages: plain retries, retries
//! with an auxiliary tool made available to the model, and finally a stop
//! for human review. The stage depends only on how many attempts have failed.

use crate::llm::CompletionRequest;
use crate::retry::error::RetryError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

/// Escalation level, ordered from least to most drastic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStage {
    /// Retry with feedback only
    Basic,
    /// Retry with a tool configured for the model
    ToolAssisted,
    /// Stop and hand over to a human
    HumanReview,
}

impl fmt::Display for RetryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic => write!(f, "basic"),
            Self::ToolAssisted => write!(f, "tool_assisted"),
            Self::HumanReview => write!(f, "human_review"),
        }
    }
}

/// An MCP tool server offered to the model in the tool-assisted stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolAssist {
    /// Server name, as the model will see it
    pub name: String,
    /// Server launch configuration (`command`, `args`, `env`, ...)
    #[serde(default)]
    pub config: Value,
}

impl ToolAssist {
    /// Creates a tool description.
    #[must_use]
    pub fn new(name: impl Into<String>, config: Value) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    /// The MCP configuration document naming this single server.
    #[must_use]
    pub fn mcp_config(&self) -> Value {
        let mut servers = Map::new();
        servers.insert(self.name.clone(), self.config.clone());
        json!({ "mcpServers": servers })
    }
}

/// Thresholds for the staged escalation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StagedRetryConfig {
    /// Failed attempts after which the tool is offered
    pub tool_suggestion_after: u32,
    /// Failed attempts after which the loop stops for human review
    pub human_review_after: u32,
    /// The tool to offer; without one the tool-assisted stage is skipped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolAssist>,
}

impl Default for StagedRetryConfig {
    fn default() -> Self {
        Self {
            tool_suggestion_after: 2,
            human_review_after: 4,
            tool: None,
        }
    }
}

impl StagedRetryConfig {
    /// Sets the tool offered in the tool-assisted stage.
    #[must_use]
    pub fn with_tool(mut self, tool: ToolAssist) -> Self {
        self.tool = Some(tool);
        self
    }

    /// Sets both thresholds.
    #[must_use]
    pub fn with_thresholds(mut self, tool_suggestion_after: u32, human_review_after: u32) -> Self {
        self.tool_suggestion_after = tool_suggestion_after;
        self.human_review_after = human_review_after;
        self
    }

    /// Validates the thresholds.
    ///
    /// # Errors
    ///
    /// Returns `RetryErrorKind::InvalidConfig` if `human_review_after` is zero
    /// or not greater than `tool_suggestion_after`.
    pub fn validate(&self) -> Result<(), RetryError> {
        if self.human_review_after == 0 {
            return Err(RetryError::invalid_config(
                "staged.human_review_after",
                "must be at least 1",
            ));
        }

        if self.tool_suggestion_after >= self.human_review_after {
            return Err(RetryError::invalid_config(
                "staged.tool_suggestion_after",
                format!(
                    "must be less than human_review_after ({}), got {}",
                    self.human_review_after, self.tool_suggestion_after
                ),
            ));
        }

        if let Some(tool) = &self.tool {
            if tool.name.trim().is_empty() {
                return Err(RetryError::invalid_config("staged.tool.name", "must not be empty"));
            }
        }

        Ok(())
    }
}

/// One entry of the attempt history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Attempt number, 1-based
    pub attempt: u32,
    /// Stage the attempt ran in
    pub stage: RetryStage,
    /// When the attempt finished
    pub timestamp: DateTime<Utc>,
    /// The response text, if the provider answered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Validation failures as `validator: reason`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    /// Provider error, if the call itself failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_error: Option<String>,
}

impl AttemptRecord {
    /// Records an attempt whose response failed validation.
    #[must_use]
    pub fn rejected(attempt: u32, stage: RetryStage, content: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            attempt,
            stage,
            timestamp: Utc::now(),
            content: Some(content.into()),
            errors,
            provider_error: None,
        }
    }

    /// Records an attempt whose provider call failed.
    #[must_use]
    pub fn provider_failed(attempt: u32, stage: RetryStage, error: impl Into<String>) -> Self {
        Self {
            attempt,
            stage,
            timestamp: Utc::now(),
            content: None,
            errors: Vec::new(),
            provider_error: Some(error.into()),
        }
    }

    /// Records an attempt that passed validation.
    #[must_use]
    pub fn accepted(attempt: u32, stage: RetryStage, content: impl Into<String>) -> Self {
        Self {
            attempt,
            stage,
            timestamp: Utc::now(),
            content: Some(content.into()),
            errors: Vec::new(),
            provider_error: None,
        }
    }
}

/// Tracks attempts and decides the stage of the next one.
#[derive(Debug, Clone)]
pub struct StagedRetryManager {
    config: StagedRetryConfig,
    history: Vec<AttemptRecord>,
    tool_applied: bool,
}

impl StagedRetryManager {
    /// Creates a manager for the given thresholds.
    #[must_use]
    pub fn new(config: StagedRetryConfig) -> Self {
        Self {
            config,
            history: Vec::new(),
            tool_applied: false,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &StagedRetryConfig {
        &self.config
    }

    /// Returns the stage for the next attempt after `failed_attempts` failures.
    ///
    /// ```
    /// use llm_call::retry::{RetryStage, StagedRetryConfig, StagedRetryManager, ToolAssist};
    ///
    /// let config = StagedRetryConfig::default()
    ///     .with_tool(ToolAssist::new("perplexity-ask", serde_json::json!({"command": "px"})));
    /// let manager = StagedRetryManager::new(config);
    ///
    /// assert_eq!(manager.stage_for(1), RetryStage::Basic);
    /// assert_eq!(manager.stage_for(2), RetryStage::ToolAssisted);
    /// assert_eq!(manager.stage_for(4), RetryStage::HumanReview);
    /// ```
    #[must_use]
    pub fn stage_for(&self, failed_attempts: u32) -> RetryStage {
        if failed_attempts >= self.config.human_review_after {
            RetryStage::HumanReview
        } else if failed_attempts >= self.config.tool_suggestion_after && self.config.tool.is_some() {
            RetryStage::ToolAssisted
        } else {
            RetryStage::Basic
        }
    }

    /// Attaches the tool's MCP configuration to the request.
    ///
    /// Returns true the first time it changes the request; later calls and
    /// calls without a configured tool do nothing.
    pub fn apply_tool_assist(&mut self, request: &mut CompletionRequest) -> bool {
        if self.tool_applied {
            return false;
        }
        let Some(tool) = &self.config.tool else {
            return false;
        };

        request.mcp_config = Some(tool.mcp_config());
        self.tool_applied = true;
        tracing::info!(tool = %tool.name, "tool-assisted retry enabled");
        true
    }

    /// Returns true once the tool has been attached.
    #[must_use]
    pub fn tool_applied(&self) -> bool {
        self.tool_applied
    }

    /// Builds the instruction that points the model at the tool.
    ///
    /// Returns `None` when no tool is configured.
    #[must_use]
    pub fn tool_suggestion(&self, errors: &[String]) -> Option<String> {
        let tool = self.config.tool.as_ref()?;
        let mut hint = format!(
            "You now have access to the '{}' tool. Use it to research and verify your answer before responding.",
            tool.name
        );
        if !errors.is_empty() {
            hint.push_str(" Focus on resolving: ");
            hint.push_str(&errors.join("; "));
        }
        Some(hint)
    }

    /// Appends an attempt to the history.
    pub fn record(&mut self, record: AttemptRecord) {
        tracing::debug!(
            attempt = record.attempt,
            stage = %record.stage,
            errors = record.errors.len(),
            "attempt recorded"
        );
        self.history.push(record);
    }

    /// Returns the attempts recorded so far.
    #[must_use]
    pub fn history(&self) -> &[AttemptRecord] {
        &self.history
    }

    /// Consumes the manager and returns its history.
    #[must_use]
    pub fn into_history(self) -> Vec<AttemptRecord> {
        self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Message;

    fn tool() -> ToolAssist {
        ToolAssist::new("perplexity-ask", json!({"command": "npx", "args": ["-y", "perplexity-ask"]}))
    }

    #[test]
    fn stages_follow_thresholds() {
        let manager = StagedRetryManager::new(StagedRetryConfig::default().with_tool(tool()));
        assert_eq!(manager.stage_for(0), RetryStage::Basic);
        assert_eq!(manager.stage_for(1), RetryStage::Basic);
        assert_eq!(manager.stage_for(2), RetryStage::ToolAssisted);
        assert_eq!(manager.stage_for(3), RetryStage::ToolAssisted);
        assert_eq!(manager.stage_for(4), RetryStage::HumanReview);
        assert_eq!(manager.stage_for(9), RetryStage::HumanReview);
    }

    #[test]
    fn tool_stage_is_skipped_without_a_tool() {
        let manager = StagedRetryManager::new(StagedRetryConfig::default());
        assert_eq!(manager.stage_for(3), RetryStage::Basic);
        assert_eq!(manager.stage_for(4), RetryStage::HumanReview);
    }

    #[test]
    fn stages_are_ordered() {
        assert!(RetryStage::Basic < RetryStage::ToolAssisted);
        assert!(RetryStage::ToolAssisted < RetryStage::HumanReview);
    }

    #[test]
    fn validation_rules() {
        assert!(StagedRetryConfig::default().validate().is_ok());
        assert!(StagedRetryConfig::default().with_thresholds(0, 0).validate().is_err());
        assert!(StagedRetryConfig::default().with_thresholds(4, 4).validate().is_err());
        assert!(StagedRetryConfig::default().with_thresholds(0, 1).validate().is_ok());
        assert!(StagedRetryConfig::default()
            .with_tool(ToolAssist::new(" ", Value::Null))
            .validate()
            .is_err());
    }

    #[test]
    fn tool_config_is_applied_once() {
        let mut manager = StagedRetryManager::new(StagedRetryConfig::default().with_tool(tool()));
        let mut request = CompletionRequest::new("claude-cli/sonnet", vec![Message::user("q")]);

        assert!(manager.apply_tool_assist(&mut request));
        assert_eq!(
            request.mcp_config.as_ref().unwrap()["mcpServers"]["perplexity-ask"]["command"],
            "npx"
        );

        request.mcp_config = None;
        assert!(!manager.apply_tool_assist(&mut request));
        assert!(request.mcp_config.is_none());
        assert!(manager.tool_applied());
    }

    #[test]
    fn tool_suggestion_names_tool_and_errors() {
        let manager = StagedRetryManager::new(StagedRetryConfig::default().with_tool(tool()));
        let hint = manager
            .tool_suggestion(&["contains: missing \"2024\"".to_string()])
            .unwrap();
        assert!(hint.contains("'perplexity-ask'"));
        assert!(hint.contains("missing \"2024\""));

        let no_tool = StagedRetryManager::new(StagedRetryConfig::default());
        assert!(no_tool.tool_suggestion(&[]).is_none());
    }

    #[test]
    fn history_keeps_records_in_order() {
        let mut manager = StagedRetryManager::new(StagedRetryConfig::default());
        manager.record(AttemptRecord::provider_failed(1, RetryStage::Basic, "timeout"));
        manager.record(AttemptRecord::rejected(2, RetryStage::Basic, "x", vec!["json_string: bad".into()]));

        let history = manager.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].provider_error.as_deref(), Some("timeout"));
        assert_eq!(history[1].errors, vec!["json_string: bad"]);
        assert!(history[0].timestamp <= history[1].timestamp);
    }

    #[test]
    fn staged_config_from_toml() {
        let config: StagedRetryConfig = toml::from_str(
            r#"
            tool_suggestion_after = 1
            human_review_after = 3
            [tool]
            name = "search"
            config = { command = "search-mcp" }
            "#,
        )
        .unwrap();

        assert_eq!(config.tool_suggestion_after, 1);
        assert_eq!(config.tool.unwrap().config["command"], "search-mcp");
    }
}
