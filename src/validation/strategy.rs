//! The validation strategy trait and its result types.

use crate::llm::CompletionResponse;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Outcome of one validation strategy applied to one response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the response passed
    pub valid: bool,
    /// Why it failed; `None` when valid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Extra detail for logs and the attempt history
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub debug_info: Map<String, Value>,
    /// Hints passed back to the model in the feedback message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl ValidationResult {
    /// A passing result.
    #[must_use]
    pub fn success() -> Self {
        Self {
            valid: true,
            ..Self::default()
        }
    }

    /// A failing result with the given reason.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Adds a suggestion.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Adds a debug entry.
    #[must_use]
    pub fn with_debug(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.debug_info.insert(key.into(), value.into());
        self
    }

    /// Returns the failure reason, or an empty string when valid.
    #[must_use]
    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or("")
    }
}

/// What a validator knows about the call it is checking.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidationContext {
    /// The attempt being validated (1-based)
    pub attempt: u32,
    /// The user's original prompt
    pub original_prompt: String,
    /// The model that produced the response
    pub model: String,
    /// Caller-supplied data for custom validators
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl ValidationContext {
    /// Creates a context for the given prompt and model.
    #[must_use]
    pub fn new(original_prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            attempt: 1,
            original_prompt: original_prompt.into(),
            model: model.into(),
            extra: Map::new(),
        }
    }

    /// Returns a copy for the given attempt.
    #[must_use]
    pub fn for_attempt(&self, attempt: u32) -> Self {
        Self {
            attempt,
            ..self.clone()
        }
    }

    /// Adds an extra entry.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// A check applied to every response in the retry loop.
///
/// Implementations never fail with an error: anything that prevents the
/// check from running is reported as a failed [`ValidationResult`].
#[async_trait]
pub trait ValidationStrategy: Send + Sync + std::fmt::Debug {
    /// The name used in feedback messages and logs.
    fn name(&self) -> &str;

    /// Checks a response.
    async fn validate(
        &self,
        response: &CompletionResponse,
        context: &ValidationContext,
    ) -> ValidationResult;
}

/// Runs every strategy concurrently and returns the failures in declaration order.
pub async fn run_validators(
    validators: &[Box<dyn ValidationStrategy>],
    response: &CompletionResponse,
    context: &ValidationContext,
) -> Vec<(String, ValidationResult)> {
    let checks = validators.iter().map(|v| async move {
        let result = v.validate(response, context).await;
        tracing::debug!(
            validator = v.name(),
            valid = result.valid,
            attempt = context.attempt,
            "validator finished"
        );
        (v.name().to_string(), result)
    });

    futures::future::join_all(checks)
        .await
        .into_iter()
        .filter(|(_, result)| !result.valid)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Debug)]
    struct Fixed {
        name: &'static str,
        valid: bool,
        delay_ms: u64,
    }

    #[async_trait]
    impl ValidationStrategy for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        async fn validate(&self, _: &CompletionResponse, _: &ValidationContext) -> ValidationResult {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            if self.valid {
                ValidationResult::success()
            } else {
                ValidationResult::failure(format!("{} failed", self.name))
            }
        }
    }

    #[test]
    fn result_builders() {
        let ok = ValidationResult::success();
        assert!(ok.valid);
        assert_eq!(ok.error_message(), "");

        let bad = ValidationResult::failure("too short")
            .with_suggestion("add detail")
            .with_debug("length", 3);
        assert!(!bad.valid);
        assert_eq!(bad.error_message(), "too short");
        assert_eq!(bad.suggestions, vec!["add detail"]);
        assert_eq!(bad.debug_info["length"], 3);
    }

    #[test]
    fn context_for_attempt_keeps_fields() {
        let ctx = ValidationContext::new("prompt", "gpt-4o").with_extra("k", "v");
        let third = ctx.for_attempt(3);
        assert_eq!(third.attempt, 3);
        assert_eq!(third.original_prompt, "prompt");
        assert_eq!(third.extra["k"], "v");
    }

    #[tokio::test(start_paused = true)]
    async fn failures_keep_declaration_order() {
        let validators: Vec<Box<dyn ValidationStrategy>> = vec![
            Box::new(Fixed { name: "slow_fail", valid: false, delay_ms: 50 }),
            Box::new(Fixed { name: "pass", valid: true, delay_ms: 0 }),
            Box::new(Fixed { name: "fast_fail", valid: false, delay_ms: 1 }),
        ];
        let response = CompletionResponse::text("test", "m", "x");

        let failures = run_validators(&validators, &response, &ValidationContext::default()).await;

        let names: Vec<_> = failures.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["slow_fail", "fast_fail"]);
    }

    #[tokio::test]
    async fn no_validators_means_no_failures() {
        let response = CompletionResponse::text("test", "m", "");
        let failures = run_validators(&[], &response, &ValidationContext::default()).await;
        assert!(failures.is_empty());
    }
}
