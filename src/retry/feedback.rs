//! Correction messages sent back to the model after a failed validation.

use crate::messages::Message;
use crate::validation::ValidationResult;

/// Formats failures as `validator: reason` lines, for logs and history.
#[must_use]
pub fn summarize_failures(failures: &[(String, ValidationResult)]) -> Vec<String> {
    failures
        .iter()
        .map(|(name, result)| format!("{}: {}", name, result.error_message()))
        .collect()
}

/// Builds the user message asking the model to fix its previous answer.
///
/// ```
/// use llm_call::retry::build_feedback;
/// use llm_call::validation::ValidationResult;
///
/// let failures = vec![(
///     "length".to_string(),
///     ValidationResult::failure("too short").with_suggestion("add an example"),
/// )];
/// let message = build_feedback(&failures, 1, None);
///
/// assert!(message.content.starts_with("Your previous response failed validation (attempt 1):"));
/// assert!(message.content.contains("- length: too short\n  Suggestions: add an example"));
/// ```
#[must_use]
pub fn build_feedback(
    failures: &[(String, ValidationResult)],
    attempt: u32,
    tool_hint: Option<&str>,
) -> Message {
    let mut text = format!("Your previous response failed validation (attempt {}):\n", attempt);

    for (name, result) in failures {
        text.push_str(&format!("- {}: {}\n", name, result.error_message()));
        if !result.suggestions.is_empty() {
            text.push_str(&format!("  Suggestions: {}\n", result.suggestions.join("; ")));
        }
    }

    text.push_str("\nPlease correct these issues and respond again.");

    if let Some(hint) = tool_hint.filter(|h| !h.trim().is_empty()) {
        text.push_str("\n\n");
        text.push_str(hint);
    }

    Message::user(text)
}
