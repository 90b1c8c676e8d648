//! Claude CLI backend.
//!
//! Runs the `claude` command-line tool in print mode as a subprocess and reads
//! its JSON result. The CLI takes a single prompt, so multi-turn
//! conversations are flattened into labelled turns.

use crate::llm::client::{CompletionRequest, CompletionResponse, LLMClient};
use crate::llm::config::ProviderConfig;
use crate::llm::error::LLMError;
use crate::llm::response::{extract_content, token_count};
use crate::messages::{system_prompt, without_system, Message, MessageRole};
use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use tokio::process::Command;

/// Maximum number of characters of stderr kept in a [`LLMError`].
const MAX_STDERR_CHARS: usize = 2000;

/// Client that shells out to the Claude CLI.
#[derive(Debug, Clone)]
pub struct ClaudeCliClient {
    config: ProviderConfig,
}

impl ClaudeCliClient {
    /// Creates a client running `config.program`.
    ///
    /// # Errors
    ///
    /// Returns an error if no program is configured.
    pub fn new(config: ProviderConfig) -> Result<Self, LLMError> {
        if config.program.trim().is_empty() {
            return Err(LLMError::invalid_config(
                "program",
                "the Claude CLI provider needs a program to run",
            ));
        }
        Ok(Self { config })
    }

    /// Builds the argument list for one request.
    fn build_args(&self, request: &CompletionRequest) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            flatten_conversation(&request.messages),
            "--output-format".to_string(),
            "json".to_string(),
        ];

        if !request.model.is_empty() {
            args.push("--model".to_string());
            args.push(request.model.clone());
        }

        if let Some(system) = system_prompt(&request.messages) {
            args.push("--append-system-prompt".to_string());
            args.push(system);
        }

        if let Some(ref mcp) = request.mcp_config {
            args.push("--mcp-config".to_string());
            args.push(mcp.to_string());
        }

        args
    }
}

/// Flattens the non-system messages into a single prompt.
///
/// A lone user message is passed through untouched; longer conversations
/// become `User:`/`Assistant:` turns separated by blank lines.
#[must_use]
pub fn flatten_conversation(messages: &[Message]) -> String {
    let turns = without_system(messages);
    if let [only] = turns.as_slice() {
        if only.role == MessageRole::User {
            return only.content.clone();
        }
    }

    turns
        .iter()
        .map(|m| {
            let label = match m.role {
                MessageRole::Assistant => "Assistant",
                _ => "User",
            };
            format!("{}: {}", label, m.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[async_trait]
impl LLMClient for ClaudeCliClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LLMError> {
        let program = &self.config.program;
        let args = self.build_args(request);

        tracing::debug!(program = %program, model = %request.model, "running Claude CLI");

        let child = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| LLMError::process_failed(program, None, format!("failed to start: {}", e)))?;

        let output = tokio::time::timeout(self.config.timeout, child.wait_with_output())
            .await
            .map_err(|_| LLMError::timeout(self.config.timeout))?
            .map_err(|e| LLMError::process_failed(program, None, e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(program = %program, code = ?output.status.code(), "Claude CLI failed");
            return Err(LLMError::process_failed(
                program,
                output.status.code(),
                truncate_chars(stderr.trim(), MAX_STDERR_CHARS),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let trimmed = stdout.trim();

        let raw: Value = serde_json::from_str(trimmed).unwrap_or(Value::Null);
        if raw.get("is_error").and_then(Value::as_bool) == Some(true) {
            let message = extract_content(&raw).unwrap_or_else(|| trimmed.to_string());
            return Err(LLMError::process_failed(program, Some(0), message));
        }

        let content = extract_content(&raw)
            .or_else(|| (!trimmed.is_empty()).then(|| trimmed.to_string()))
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| LLMError::empty_response(self.provider_name()))?;

        let usage = raw.get("usage").map(|u| crate::llm::client::Usage {
            input_tokens: token_count(u, "input_tokens"),
            output_tokens: token_count(u, "output_tokens"),
        });

        Ok(CompletionResponse {
            id: raw
                .get("session_id")
                .and_then(Value::as_str)
                .map(str::to_string),
            model: request.model.clone(),
            provider: self.provider_name().to_string(),
            content,
            finish_reason: raw
                .get("subtype")
                .and_then(Value::as_str)
                .map(str::to_string),
            usage,
            raw,
        })
    }

    fn provider_name(&self) -> &'static str {
        "claude_cli"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_user_message_is_passed_through() {
        let prompt = flatten_conversation(&[Message::system("rules"), Message::user("Hello")]);
        assert_eq!(prompt, "Hello");
    }

    #[test]
    fn conversation_is_flattened_into_turns() {
        let prompt = flatten_conversation(&[
            Message::user("Q1"),
            Message::assistant("A1"),
            Message::user("Q2"),
        ]);
        assert_eq!(prompt, "User: Q1\n\nAssistant: A1\n\nUser: Q2");
    }

    #[test]
    fn args_include_model_system_and_mcp() {
        let client = ClaudeCliClient::new(ProviderConfig::claude_cli("claude")).unwrap();
        let mut request = CompletionRequest::new(
            "sonnet",
            vec![Message::system("Be brief."), Message::user("Hi")],
        );
        request.mcp_config = Some(json!({"mcpServers": {"perplexity": {"command": "px"}}}));

        let args = client.build_args(&request);
        assert_eq!(&args[..4], ["-p", "Hi", "--output-format", "json"]);
        let model = args.iter().position(|a| a == "--model").unwrap();
        assert_eq!(args[model + 1], "sonnet");
        let system = args.iter().position(|a| a == "--append-system-prompt").unwrap();
        assert_eq!(args[system + 1], "Be brief.");
        let mcp = args.iter().position(|a| a == "--mcp-config").unwrap();
        assert!(args[mcp + 1].contains("perplexity"));
    }

    #[test]
    fn empty_program_is_rejected() {
        assert!(ClaudeCliClient::new(ProviderConfig::claude_cli("  ")).is_err());
    }

    #[test]
    fn stderr_truncation_is_char_safe() {
        assert_eq!(truncate_chars("héllo", 2), "hé...");
        assert_eq!(truncate_chars("ok", 10), "ok");
    }

    #[cfg(unix)]
    fn fake_cli(dir: &tempfile::TempDir, script: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("fake-claude");
        std::fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn reads_json_result_from_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_cli(
            &dir,
            r#"echo '{"type":"result","subtype":"success","is_error":false,"result":"forty-two","session_id":"s1"}'"#,
        );

        let client = ClaudeCliClient::new(ProviderConfig::claude_cli(program)).unwrap();
        let request = CompletionRequest::new("sonnet", vec![Message::user("6*7?")]);
        let response = client.complete(&request).await.unwrap();

        assert_eq!(response.content, "forty-two");
        assert_eq!(response.id.as_deref(), Some("s1"));
        assert_eq!(response.provider, "claude_cli");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn plain_text_stdout_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_cli(&dir, "echo 'just text'");

        let client = ClaudeCliClient::new(ProviderConfig::claude_cli(program)).unwrap();
        let request = CompletionRequest::new("", vec![Message::user("hi")]);
        let response = client.complete(&request).await.unwrap();

        assert_eq!(response.content, "just text");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_becomes_process_failed() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_cli(&dir, "echo 'not logged in' >&2\nexit 3");

        let client = ClaudeCliClient::new(ProviderConfig::claude_cli(program)).unwrap();
        let request = CompletionRequest::new("sonnet", vec![Message::user("hi")]);
        let err = client.complete(&request).await.unwrap_err();

        assert!(matches!(
            err.kind,
            crate::llm::error::LLMErrorKind::ProcessFailed { exit_code: Some(3), ref stderr, .. }
                if stderr == "not logged in"
        ));
    }

    #[tokio::test]
    async fn missing_program_fails_to_start() {
        let client =
            ClaudeCliClient::new(ProviderConfig::claude_cli("/nonexistent/claude-binary")).unwrap();
        let request = CompletionRequest::new("sonnet", vec![Message::user("hi")]);
        let err = client.complete(&request).await.unwrap_err();
        assert!(err.to_string().contains("failed to start"));
    }
}
