//! Response validation.
//!
//! A [`ValidationStrategy`] checks one response and returns a
//! [`ValidationResult`]. Strategies are created by name through the
//! [`ValidatorRegistry`], which holds the built-in text checks
//! (`length`, `regex`, `json_string`, ...) and the AI-assisted ones
//! (`ai_judge`, `ai_contradiction_check`) that ask a judge model.
//!
//! # Example
//!
//! ```rust,ignore
//! use llm_call::validation::{ValidatorRegistry, ValidatorSpec, ValidationServices};
//!
//! let registry = ValidatorRegistry::with_builtins();
//! let validators = registry.create_all(
//!     &[ValidatorSpec::named("json_string"), ValidatorSpec::named("length").with_param("max_length", 500)],
//!     &ValidationServices::default(),
//! )?;
//! ```

mod ai;
mod builtin;
mod error;
mod registry;
mod strategy;

pub use ai::{parse_verdict, JudgeVerdict, LlmJudgeValidator, CONTRADICTION_CRITERIA};
pub use builtin::{
    strip_code_fence, CodeValidator, ContainsValidator, FieldPresentValidator, JsonValidator,
    LengthValidator, NotEmptyValidator, RegexValidator,
};
pub use error::{ValidationError, ValidationErrorKind};
pub use registry::{ValidationServices, ValidatorFactory, ValidatorRegistry, ValidatorSpec};
pub use strategy::{run_validators, ValidationContext, ValidationResult, ValidationStrategy};
