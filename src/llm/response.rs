//! Response helpers shared by the HTTP providers.
//!
//! Providers (and proxies in front of them) answer in several shapes. This
//! module pulls the assistant text out of whichever shape arrived and turns
//! HTTP error responses into [`LLMError`]s.

use crate::llm::error::LLMError;
use serde_json::Value;
use std::time::Duration;

/// Extracts the assistant text from a response body.
///
/// Recognised shapes, first match wins:
///
/// 1. a bare JSON string
/// 2. `choices[0].message.content` (OpenAI chat)
/// 3. `choices[0].text` (legacy completions)
/// 4. `content` as a string or as an array of `{"type": "text"}` blocks (Anthropic)
/// 5. `candidates[0].content.parts[*].text` (Gemini)
/// 6. `result` (Claude CLI `--output-format json`)
/// 7. `text`, `response` or `message` string fields
///
/// # Examples
///
/// ```
/// use llm_call::llm::extract_content;
/// use serde_json::json;
///
/// let body = json!({"choices": [{"message": {"role": "assistant", "content": "Hi"}}]});
/// assert_eq!(extract_content(&body).as_deref(), Some("Hi"));
/// ```
#[must_use]
pub fn extract_content(value: &Value) -> Option<String> {
    if let Some(s) = value.as_str() {
        return Some(s.to_string());
    }

    if let Some(choice) = value.get("choices").and_then(|c| c.get(0)) {
        if let Some(content) = choice.pointer("/message/content") {
            if let Some(text) = content_to_text(content) {
                return Some(text);
            }
        }
        if let Some(text) = choice.get("text").and_then(Value::as_str) {
            return Some(text.to_string());
        }
    }

    if let Some(content) = value.get("content") {
        if let Some(text) = content_to_text(content) {
            return Some(text);
        }
    }

    if let Some(parts) = value
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
    {
        let text: String = parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect();
        return Some(text);
    }

    ["result", "text", "response", "message"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

/// Converts a `content` field that is either a string or a list of blocks.
fn content_to_text(content: &Value) -> Option<String> {
    match content {
        Value::String(s) => Some(s.clone()),
        Value::Array(blocks) => {
            let texts: Vec<&str> = blocks
                .iter()
                .filter(|b| b.get("type").and_then(Value::as_str).unwrap_or("text") == "text")
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .collect();
            if texts.is_empty() {
                None
            } else {
                Some(texts.concat())
            }
        }
        _ => None,
    }
}

/// Reads a token count from a usage object, saturating at `u32::MAX`.
pub(crate) fn token_count(usage: &Value, field: &str) -> u32 {
    usage
        .get(field)
        .and_then(Value::as_u64)
        .map_or(0, |n| u32::try_from(n).unwrap_or(u32::MAX))
}

/// Maps a transport-level reqwest error to an [`LLMError`].
///
/// The request URL is dropped from the message.
pub(crate) fn error_from_send(error: reqwest::Error, timeout: Duration) -> LLMError {
    let error = error.without_url();
    if error.is_timeout() {
        LLMError::timeout(timeout)
    } else if error.is_connect() {
        LLMError::network(format!("connection failed: {}", error))
    } else {
        LLMError::network(format!("request failed: {}", error))
    }
}

/// Maps a non-success HTTP response to an [`LLMError`].
///
/// The body is expected to follow the common `{"error": {"type", "message"}}`
/// convention; `error.status` (Google) and `error.code` are accepted as the
/// error type too.
pub(crate) async fn error_from_response(model: &str, response: reqwest::Response) -> LLMError {
    let status = response.status();
    let status_code = status.as_u16();

    if status_code == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(60);

        return LLMError::rate_limited(Duration::from_secs(retry_after));
    }

    let body = response.text().await.unwrap_or_default();
    error_from_body(model, status_code, status.canonical_reason(), &body)
}

fn error_from_body(model: &str, status_code: u16, reason: Option<&str>, body: &str) -> LLMError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let detail = parsed.as_ref().and_then(|v| v.get("error"));

    let message = detail
        .and_then(|d| d.get("message").and_then(Value::as_str).or_else(|| d.as_str()))
        .map(str::to_string)
        .unwrap_or_else(|| {
            if body.is_empty() {
                reason.unwrap_or("Unknown error").to_string()
            } else {
                body.to_string()
            }
        });

    let error_type = detail.and_then(|d| {
        ["type", "status", "code"]
            .iter()
            .find_map(|k| d.get(*k))
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
    });

    match (status_code, error_type.as_deref()) {
        (401 | 403, _) | (_, Some("authentication_error" | "invalid_api_key" | "UNAUTHENTICATED")) => {
            LLMError::authentication_failed(message)
        }
        (529, _) | (_, Some("overloaded_error")) => LLMError::model_overloaded(model),
        (400, Some("invalid_request_error" | "INVALID_ARGUMENT")) => {
            LLMError::invalid_request(message)
        }
        _ => LLMError::api_error(status_code, message, error_type),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::error::LLMErrorKind;
    use serde_json::json;

    #[test]
    fn token_counts_saturate() {
        let usage = json!({"prompt_tokens": 5_000_000_000_u64, "completion_tokens": 12});
        assert_eq!(token_count(&usage, "prompt_tokens"), u32::MAX);
        assert_eq!(token_count(&usage, "completion_tokens"), 12);
        assert_eq!(token_count(&usage, "missing"), 0);
    }

    #[tokio::test]
    async fn send_errors_omit_the_url() {
        let err = reqwest::Client::new()
            .get("http://127.0.0.1:9/v1/models?key=hidden-value")
            .send()
            .await
            .unwrap_err();
        let mapped = error_from_send(err, Duration::from_secs(1));
        assert!(matches!(mapped.kind, LLMErrorKind::Network { .. }));
        assert!(!mapped.to_string().contains("hidden-value"));
    }

    #[test]
    fn extracts_bare_string() {
        assert_eq!(extract_content(&json!("plain")).as_deref(), Some("plain"));
    }

    #[test]
    fn extracts_openai_chat_shape() {
        let body = json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "42"}}]
        });
        assert_eq!(extract_content(&body).as_deref(), Some("42"));
    }

    #[test]
    fn extracts_legacy_completion_shape() {
        let body = json!({"choices": [{"text": "legacy"}]});
        assert_eq!(extract_content(&body).as_deref(), Some("legacy"));
    }

    #[test]
    fn extracts_anthropic_blocks() {
        let body = json!({
            "content": [
                {"type": "text", "text": "Hello, "},
                {"type": "tool_use", "id": "t1", "name": "x", "input": {}},
                {"type": "text", "text": "world"}
            ]
        });
        assert_eq!(extract_content(&body).as_deref(), Some("Hello, world"));
    }

    #[test]
    fn extracts_gemini_parts() {
        let body = json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "a"}, {"text": "b"}]}}]
        });
        assert_eq!(extract_content(&body).as_deref(), Some("ab"));
    }

    #[test]
    fn extracts_claude_cli_result() {
        let body = json!({"type": "result", "subtype": "success", "result": "done", "session_id": "s"});
        assert_eq!(extract_content(&body).as_deref(), Some("done"));
    }

    #[test]
    fn extracts_fallback_fields() {
        assert_eq!(extract_content(&json!({"response": "r"})).as_deref(), Some("r"));
        assert_eq!(extract_content(&json!({"text": "t"})).as_deref(), Some("t"));
    }

    #[test]
    fn returns_none_for_unknown_shape() {
        assert!(extract_content(&json!({"data": [1, 2, 3]})).is_none());
        assert!(extract_content(&json!(null)).is_none());
    }

    #[test]
    fn null_message_content_falls_through() {
        let body = json!({"choices": [{"message": {"content": null}}], "result": "fallback"});
        assert_eq!(extract_content(&body).as_deref(), Some("fallback"));
    }

    #[test]
    fn auth_status_maps_to_authentication_failed() {
        let err = error_from_body("gpt-4o", 401, Some("Unauthorized"), "");
        assert!(matches!(err.kind, LLMErrorKind::AuthenticationFailed { .. }));
    }

    #[test]
    fn anthropic_overloaded_maps_to_model_overloaded() {
        let body = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        let err = error_from_body("claude-3-5-sonnet", 529, None, body);
        assert_eq!(err, LLMError::model_overloaded("claude-3-5-sonnet"));
        assert!(err.is_retriable());
    }

    #[test]
    fn invalid_request_type_maps_to_invalid_request() {
        let body = r#"{"error":{"type":"invalid_request_error","message":"max_tokens too large"}}"#;
        let err = error_from_body("m", 400, None, body);
        assert_eq!(err, LLMError::invalid_request("max_tokens too large"));
    }

    #[test]
    fn google_status_used_as_error_type() {
        let body = r#"{"error":{"code":500,"message":"internal","status":"INTERNAL"}}"#;
        let err = error_from_body("gemini-1.5-pro", 500, None, body);
        assert_eq!(err, LLMError::api_error(500, "internal", Some("INTERNAL".into())));
    }

    #[test]
    fn unparseable_body_is_used_as_message() {
        let err = error_from_body("m", 502, Some("Bad Gateway"), "upstream died");
        assert_eq!(err, LLMError::api_error(502, "upstream died", None));

        let empty = error_from_body("m", 502, Some("Bad Gateway"), "");
        assert_eq!(empty, LLMError::api_error(502, "Bad Gateway", None));
    }
}
