//! AI-assisted validators.
//!
//! These make a nested completion call, asking a judge model whether the
//! response meets some criteria. The judge answers with a JSON verdict.

use crate::llm::{CompletionRequest, CompletionResponse, LLMClient, ResponseFormat};
use crate::messages::Message;
use crate::validation::strategy::{ValidationContext, ValidationResult, ValidationStrategy};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// Criteria used by `ai_contradiction_check`.
pub const CONTRADICTION_CRITERIA: &str = "The response must be internally consistent. \
No statement in it may contradict another statement in the response, \
and it must not contradict facts stated in the original request.";

const JUDGE_SYSTEM_PROMPT: &str =
    "You are a strict reviewer of AI-generated answers. You only ever reply with JSON.";

/// Judge prompt; the placeholders are replaced before sending.
const JUDGE_PROMPT_TEMPLATE: &str = r#"Evaluate the response below against the criteria.

Criteria:
{criteria}

Original request:
```
{prompt}
```

Response to evaluate:
```
{response}
```

Reply with a single JSON object and nothing else:
{"valid": true or false, "reason": "one sentence explaining the verdict", "suggestions": ["concrete fix", "..."]}"#;

/// Substitutes `{name}` placeholders in one pass over `template`.
///
/// Inserted values are never rescanned, so braces in user text survive as-is.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() + values.iter().map(|(_, v)| v.len()).sum::<usize>());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        let hit = values.iter().find_map(|(name, value)| {
            tail.strip_prefix(name)
                .and_then(|after| after.strip_prefix('}'))
                .map(|after| (*value, after))
        });
        match hit {
            Some((value, after)) => {
                out.push_str(value);
                rest = after;
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

/// The verdict the judge is asked to return.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JudgeVerdict {
    /// Whether the response meets the criteria
    pub valid: bool,
    /// Explanation of the verdict
    #[serde(default)]
    pub reason: String,
    /// Fixes the judge proposes
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// Parses the first JSON object in `text` that reads as a [`JudgeVerdict`].
///
/// Judges often wrap the JSON in prose or a code fence, so every `{` is tried
/// as a starting point.
#[must_use]
pub fn parse_verdict(text: &str) -> Option<JudgeVerdict> {
    text.match_indices('{').find_map(|(start, _)| {
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value @ Value::Object(_))) => serde_json::from_value(value).ok(),
            _ => None,
        }
    })
}

/// Asks a judge model whether a response satisfies free-form criteria.
#[derive(Debug, Clone)]
pub struct LlmJudgeValidator {
    name: String,
    judge: Arc<dyn LLMClient>,
    judge_model: String,
    criteria: String,
    fail_open: bool,
}

impl LlmJudgeValidator {
    /// Creates a judge validator.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        judge: Arc<dyn LLMClient>,
        judge_model: impl Into<String>,
        criteria: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            judge,
            judge_model: judge_model.into(),
            criteria: criteria.into(),
            fail_open: false,
        }
    }

    /// When set, a judge that cannot deliver a verdict lets the response pass.
    #[must_use]
    pub fn with_fail_open(mut self, fail_open: bool) -> Self {
        self.fail_open = fail_open;
        self
    }

    /// Returns the criteria.
    #[must_use]
    pub fn criteria(&self) -> &str {
        &self.criteria
    }

    fn judge_request(&self, response: &CompletionResponse, context: &ValidationContext) -> CompletionRequest {
        let prompt = fill_template(
            JUDGE_PROMPT_TEMPLATE,
            &[
                ("criteria", &self.criteria),
                ("prompt", &context.original_prompt),
                ("response", &response.content),
            ],
        );

        CompletionRequest::new(
            self.judge_model.clone(),
            vec![Message::system(JUDGE_SYSTEM_PROMPT), Message::user(prompt)],
        )
        .with_temperature(0.1)
        .with_max_tokens(500)
        .with_response_format(ResponseFormat::JsonObject)
    }

    /// Result used when the judge itself fails.
    fn judge_unavailable(&self, reason: String) -> ValidationResult {
        if self.fail_open {
            tracing::warn!(validator = %self.name, reason = %reason, "judge unavailable, passing response");
            ValidationResult::success().with_debug("judge_error", reason)
        } else {
            tracing::warn!(validator = %self.name, reason = %reason, "judge unavailable, failing response");
            ValidationResult::failure(format!("judge could not evaluate the response: {}", reason))
                .with_debug("judge_error", reason)
        }
    }
}

#[async_trait]
impl ValidationStrategy for LlmJudgeValidator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn validate(&self, response: &CompletionResponse, context: &ValidationContext) -> ValidationResult {
        let request = self.judge_request(response, context);

        let reply = match self.judge.complete(&request).await {
            Ok(reply) => reply,
            Err(e) => return self.judge_unavailable(e.to_string()),
        };

        let Some(verdict) = parse_verdict(&reply.content) else {
            return self.judge_unavailable(format!("unparseable verdict: {}", reply.content));
        };

        tracing::debug!(
            validator = %self.name,
            judge_model = %self.judge_model,
            valid = verdict.valid,
            "judge verdict"
        );

        let mut result = if verdict.valid {
            ValidationResult::success()
        } else if verdict.reason.is_empty() {
            ValidationResult::failure("the judge rejected the response")
        } else {
            ValidationResult::failure(verdict.reason.clone())
        };
        result.suggestions = verdict.suggestions;
        result.with_debug("judge_model", self.judge_model.clone())
    }
}
