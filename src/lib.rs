//! # llm-call: route prompts, validate answers, retry
//!
//! Sends prompts to OpenAI, Anthropic, Gemini/Vertex AI, Ollama, a local
//! Claude proxy or the Claude CLI, chosen from the model name, and keeps
//! asking until the answer passes the requested validators.
//!
//! ## Architecture
//!
//! - **llm**: one [`LLMClient`](llm::LLMClient) per backend plus the prefix [`Router`](llm::Router)
//! - **validation**: built-in checks and AI-judge checks, created by name from a registry
//! - **retry**: the retry loop with backoff, correction feedback and staged escalation
//! - **caller**: the [`LlmCaller`] facade tying them together
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use llm_call::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), LlmCallError> {
//!     let caller = LlmCaller::load()?;
//!     let answer = caller.ask("claude-cli/sonnet", "Name a prime above 100.").await?;
//!     println!("{answer}");
//!     Ok(())
//! }
//! ```

pub mod caller;
pub mod config;
pub mod error;
pub mod llm;
pub mod logging;
pub mod messages;
pub mod retry;
pub mod types;
pub mod validation;

pub use caller::{CallResult, LlmCaller, LlmRequest};
pub use error::{LlmCallError, LlmCallErrorKind};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::caller::{CallResult, LlmCaller, LlmRequest};
    pub use crate::config::{LlmCallConfig, ProviderSection, ProvidersConfig};
    pub use crate::error::{LlmCallError, LlmCallErrorKind};
    pub use crate::llm::{
        CompletionRequest, CompletionResponse, LLMClient, LLMError, ProviderConfig, ProviderKind,
        ResponseFormat, Route, Router,
    };
    pub use crate::messages::{Message, MessageRole};
    pub use crate::retry::{RetryConfig, RetryError, StagedRetryConfig, ToolAssist};
    pub use crate::types::RequestId;
    pub use crate::validation::{
        ValidationContext, ValidationResult, ValidationStrategy, ValidatorRegistry, ValidatorSpec,
    };
}
