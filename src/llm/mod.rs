//! LLM provider module.
//!
//! This module contains the provider-independent client trait, one client per
//! supported backend, response-content extraction, and the router that maps
//! model names onto those clients.

mod anthropic;
mod claude_cli;
mod claude_proxy;
mod client;
mod config;
mod error;
mod gemini;
mod openai;
mod response;
mod router;

pub use anthropic::AnthropicClient;
pub use claude_cli::{flatten_conversation, ClaudeCliClient};
pub use claude_proxy::ClaudeProxyClient;
pub use client::{CompletionRequest, CompletionResponse, LLMClient, ResponseFormat, Usage};
pub use config::{ProviderConfig, ProviderKind};
pub use error::{LLMError, LLMErrorKind};
pub use gemini::GeminiClient;
pub use openai::OpenAIClient;
pub use response::extract_content;
pub use router::{create_client, resolve_route, Route, Router};
