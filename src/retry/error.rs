//! Retry loop error types.

use crate::llm::LLMError;
use crate::retry::staged::AttemptRecord;
use std::fmt;

/// Errors that end the retry loop without an accepted response.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryError {
    /// The specific error that occurred
    pub kind: RetryErrorKind,
}

/// Specific retry error types.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryErrorKind {
    /// Every attempt was used and the last response still failed validation
    Exhausted {
        /// Attempts made
        attempts: u32,
        /// Failures of the last response, as `validator: reason`
        errors: Vec<String>,
        /// The last response text, if any attempt produced one
        last_content: Option<String>,
    },
    /// Enough attempts failed that a human should take over
    HumanReviewNeeded {
        /// Attempts made before stopping
        attempts: u32,
        /// Failures of the last response, as `validator: reason`
        errors: Vec<String>,
        /// Everything that was tried
        history: Vec<AttemptRecord>,
    },
    /// The provider failed in a way retrying cannot fix, or kept failing
    Provider {
        /// Attempts made
        attempts: u32,
        /// The last provider error
        source: LLMError,
    },
    /// The retry or staged configuration is invalid
    InvalidConfig {
        /// The offending field
        field: String,
        /// Why it was rejected
        reason: String,
    },
}

impl RetryError {
    /// Creates a new RetryError with the given kind.
    #[must_use]
    pub fn new(kind: RetryErrorKind) -> Self {
        Self { kind }
    }

    /// Creates an exhausted error.
    #[must_use]
    pub fn exhausted(attempts: u32, errors: Vec<String>, last_content: Option<String>) -> Self {
        Self::new(RetryErrorKind::Exhausted {
            attempts,
            errors,
            last_content,
        })
    }

    /// Creates a human review error.
    #[must_use]
    pub fn human_review_needed(attempts: u32, errors: Vec<String>, history: Vec<AttemptRecord>) -> Self {
        Self::new(RetryErrorKind::HumanReviewNeeded {
            attempts,
            errors,
            history,
        })
    }

    /// Creates a provider error.
    #[must_use]
    pub fn provider(attempts: u32, source: LLMError) -> Self {
        Self::new(RetryErrorKind::Provider { attempts, source })
    }

    /// Creates an invalid config error.
    #[must_use]
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(RetryErrorKind::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        })
    }

    /// Returns true if the loop stopped for human review.
    #[must_use]
    pub fn is_human_review(&self) -> bool {
        matches!(self.kind, RetryErrorKind::HumanReviewNeeded { .. })
    }

    /// Returns true if the attempt budget ran out.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        matches!(self.kind, RetryErrorKind::Exhausted { .. })
    }

    /// Returns the number of attempts made, where that applies.
    #[must_use]
    pub fn attempts(&self) -> Option<u32> {
        match &self.kind {
            RetryErrorKind::Exhausted { attempts, .. }
            | RetryErrorKind::HumanReviewNeeded { attempts, .. }
            | RetryErrorKind::Provider { attempts, .. } => Some(*attempts),
            RetryErrorKind::InvalidConfig { .. } => None,
        }
    }

    /// Returns the last validation failures, where that applies.
    #[must_use]
    pub fn validation_errors(&self) -> &[String] {
        match &self.kind {
            RetryErrorKind::Exhausted { errors, .. }
            | RetryErrorKind::HumanReviewNeeded { errors, .. } => errors,
            _ => &[],
        }
    }
}

impl fmt::Display for RetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            RetryErrorKind::Exhausted {
                attempts, errors, ..
            } => {
                write!(
                    f,
                    "response still failed validation after {} attempts: {}; \
                     raise retry.max_attempts or relax the validators",
                    attempts,
                    errors.join("; ")
                )
            }
            RetryErrorKind::HumanReviewNeeded {
                attempts, errors, ..
            } => {
                write!(
                    f,
                    "human review needed after {} failed attempts: {}",
                    attempts,
                    errors.join("; ")
                )
            }
            RetryErrorKind::Provider { attempts, source } => {
                write!(f, "provider call failed on attempt {}: {}", attempts, source)
            }
            RetryErrorKind::InvalidConfig { field, reason } => {
                write!(f, "invalid configuration for '{}': {}", field, reason)
            }
        }
    }
}

impl std::error::Error for RetryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            RetryErrorKind::Provider { source, .. } => Some(source),
            _ => None,
        }
    }
}
