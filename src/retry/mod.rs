//! Retry with validation.
//!
//! [`retry_with_validation`] calls a model, validates the answer, and on
//! failure sends the model a correction and tries again with exponential
//! backoff. An optional [`StagedRetryConfig`] escalates repeated failures:
//! first by offering the model a tool, then by stopping for human review.

mod config;
mod error;
mod feedback;
mod run;
mod staged;

pub use config::RetryConfig;
pub use error::{RetryError, RetryErrorKind};
pub use feedback::{build_feedback, summarize_failures};
pub use run::{retry_with_validation, RetryOutcome};
pub use staged::{AttemptRecord, RetryStage, StagedRetryConfig, StagedRetryManager, ToolAssist};
