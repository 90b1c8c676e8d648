//! Conversation messages exchanged with LLM providers.

mod types;

pub use types::{system_prompt, without_system, Message, MessageRole};
