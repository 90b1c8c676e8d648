//! Top-level error type for llm-call.
//!
//! Each layer has its own error: [`LLMError`] for providers and routing,
//! [`ValidationError`] for building validators and [`RetryError`] for the
//! retry loop. [`LlmCallError`] wraps them for the [`LlmCaller`] facade.
//!
//! No external error crates (anyhow, thiserror, eyre) are used in the library.
//!
//! [`LlmCaller`]: crate::LlmCaller

use crate::llm::LLMError;
use crate::retry::RetryError;
use crate::validation::ValidationError;
use std::fmt;

/// Errors returned by the [`LlmCaller`](crate::LlmCaller) facade.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmCallError {
    /// The specific error that occurred
    pub kind: LlmCallErrorKind,
}

/// Specific facade error types.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmCallErrorKind {
    /// Configuration file or request settings are invalid
    Configuration {
        /// The offending field
        field: String,
        /// Why it was rejected
        reason: String,
    },
    /// The model could not be routed or its client could not be built
    Routing(LLMError),
    /// A requested validator could not be created
    Validation(ValidationError),
    /// The retry loop ended without an accepted response
    Retry(RetryError),
}

impl LlmCallError {
    /// Creates a new LlmCallError with the given kind.
    #[must_use]
    pub fn new(kind: LlmCallErrorKind) -> Self {
        Self { kind }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(LlmCallErrorKind::Configuration {
            field: field.into(),
            reason: reason.into(),
        })
    }

    /// Returns true if this error indicates a configuration problem.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self.kind, LlmCallErrorKind::Configuration { .. })
    }

    /// Returns true if the call stopped for human review.
    #[must_use]
    pub fn is_human_review(&self) -> bool {
        matches!(&self.kind, LlmCallErrorKind::Retry(e) if e.is_human_review())
    }

    /// Returns true if the attempt budget ran out.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        matches!(&self.kind, LlmCallErrorKind::Retry(e) if e.is_exhausted())
    }

    /// Returns the retry error, if the retry loop produced this error.
    #[must_use]
    pub fn as_retry(&self) -> Option<&RetryError> {
        match &self.kind {
            LlmCallErrorKind::Retry(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for LlmCallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            LlmCallErrorKind::Configuration { field, reason } => {
                write!(f, "configuration error for '{}': {}", field, reason)
            }
            LlmCallErrorKind::Routing(e) => write!(f, "routing failed: {}", e),
            LlmCallErrorKind::Validation(e) => write!(f, "{}", e),
            LlmCallErrorKind::Retry(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for LlmCallError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            LlmCallErrorKind::Configuration { .. } => None,
            LlmCallErrorKind::Routing(e) => Some(e),
            LlmCallErrorKind::Validation(e) => Some(e),
            LlmCallErrorKind::Retry(e) => Some(e),
        }
    }
}

impl From<LLMError> for LlmCallError {
    fn from(error: LLMError) -> Self {
        Self::new(LlmCallErrorKind::Routing(error))
    }
}

impl From<ValidationError> for LlmCallError {
    fn from(error: ValidationError) -> Self {
        Self::new(LlmCallErrorKind::Validation(error))
    }
}

impl From<RetryError> for LlmCallError {
    fn from(error: RetryError) -> Self {
        Self::new(LlmCallErrorKind::Retry(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn configuration_display() {
        let error = LlmCallError::configuration("default_model", "no model given");
        assert!(error.is_configuration());
        assert_eq!(
            error.to_string(),
            "configuration error for 'default_model': no model given"
        );
        assert!(error.source().is_none());
    }

    #[test]
    fn routing_errors_convert() {
        let error: LlmCallError = LLMError::unknown_model("mystery").into();
        assert!(error.to_string().starts_with("routing failed:"));
        assert!(error.source().is_some());
    }

    #[test]
    fn retry_predicates_look_through() {
        let review: LlmCallError = RetryError::human_review_needed(4, vec![], vec![]).into();
        assert!(review.is_human_review());
        assert!(!review.is_exhausted());
        assert!(review.as_retry().is_some());

        let exhausted: LlmCallError = RetryError::exhausted(3, vec![], None).into();
        assert!(exhausted.is_exhausted());
    }

    #[test]
    fn validation_errors_keep_their_message() {
        let error: LlmCallError = ValidationError::invalid_params("regex", "missing 'pattern'").into();
        assert_eq!(
            error.to_string(),
            "invalid parameters for validator 'regex': missing 'pattern'"
        );
    }
}
