//! Validation error types.
//!
//! Errors raised while *building* validators from their names and parameters.
//! A response that fails a check is not an error; it is a failed
//! [`ValidationResult`](super::ValidationResult).

use std::fmt;

/// Errors that can occur while creating validators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The specific error that occurred
    pub kind: ValidationErrorKind,
}

/// Specific validation error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// No validator is registered under the name
    UnknownValidator {
        /// The requested name
        name: String,
        /// The closest registered name, if one is close enough
        suggestion: Option<String>,
    },
    /// The validator's parameters are missing or malformed
    InvalidParams {
        /// The validator being created
        validator: String,
        /// What was wrong
        reason: String,
    },
    /// An AI-assisted validator was requested but no judge model is available
    MissingJudge {
        /// The validator being created
        validator: String,
    },
}

impl ValidationError {
    /// Creates a new ValidationError with the given kind.
    #[must_use]
    pub fn new(kind: ValidationErrorKind) -> Self {
        Self { kind }
    }

    /// Creates an unknown validator error.
    #[must_use]
    pub fn unknown_validator(name: impl Into<String>, suggestion: Option<String>) -> Self {
        Self::new(ValidationErrorKind::UnknownValidator {
            name: name.into(),
            suggestion,
        })
    }

    /// Creates an invalid parameters error.
    #[must_use]
    pub fn invalid_params(validator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ValidationErrorKind::InvalidParams {
            validator: validator.into(),
            reason: reason.into(),
        })
    }

    /// Creates a missing judge error.
    #[must_use]
    pub fn missing_judge(validator: impl Into<String>) -> Self {
        Self::new(ValidationErrorKind::MissingJudge {
            validator: validator.into(),
        })
    }

    /// Returns true if the validator name was not registered.
    #[must_use]
    pub fn is_unknown_validator(&self) -> bool {
        matches!(self.kind, ValidationErrorKind::UnknownValidator { .. })
    }

    /// Returns true if the parameters were rejected.
    #[must_use]
    pub fn is_invalid_params(&self) -> bool {
        matches!(self.kind, ValidationErrorKind::InvalidParams { .. })
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ValidationErrorKind::UnknownValidator { name, suggestion } => {
                write!(f, "unknown validator '{}'", name)?;
                match suggestion {
                    Some(s) => write!(f, "; did you mean '{}'?", s),
                    None => write!(f, "; run `llm-call validators` to list the available ones"),
                }
            }
            ValidationErrorKind::InvalidParams { validator, reason } => {
                write!(f, "invalid parameters for validator '{}': {}", validator, reason)
            }
            ValidationErrorKind::MissingJudge { validator } => {
                write!(
                    f,
                    "validator '{}' needs a judge model; set judge_model in the configuration",
                    validator
                )
            }
        }
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_validator_with_suggestion() {
        let err = ValidationError::unknown_validator("lenght", Some("length".into()));
        assert!(err.is_unknown_validator());
        assert!(err.to_string().contains("did you mean 'length'"));
    }

    #[test]
    fn unknown_validator_without_suggestion() {
        let err = ValidationError::unknown_validator("zzz", None);
        assert!(err.to_string().contains("llm-call validators"));
    }

    #[test]
    fn invalid_params_display() {
        let err = ValidationError::invalid_params("regex", "missing 'pattern'");
        assert!(err.is_invalid_params());
        assert_eq!(
            err.to_string(),
            "invalid parameters for validator 'regex': missing 'pattern'"
        );
    }

    #[test]
    fn missing_judge_names_the_setting() {
        let err = ValidationError::missing_judge("ai_judge");
        assert!(err.to_string().contains("judge_model"));
    }
}
