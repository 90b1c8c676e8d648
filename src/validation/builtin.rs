//! Built-in validators that inspect the response text without calling a model.

use crate::llm::CompletionResponse;
use crate::validation::error::ValidationError;
use crate::validation::strategy::{ValidationContext, ValidationResult, ValidationStrategy};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};

// Parameter helpers shared with the AI-assisted validators.

pub(crate) fn param_str<'a>(
    validator: &str,
    params: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a str>, ValidationError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(ValidationError::invalid_params(
            validator,
            format!("'{}' must be a string, got {}", key, other),
        )),
    }
}

pub(crate) fn param_bool(
    validator: &str,
    params: &Map<String, Value>,
    key: &str,
    default: bool,
) -> Result<bool, ValidationError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(ValidationError::invalid_params(
            validator,
            format!("'{}' must be true or false, got {}", key, other),
        )),
    }
}

fn param_usize(
    validator: &str,
    params: &Map<String, Value>,
    key: &str,
) -> Result<Option<usize>, ValidationError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| {
                ValidationError::invalid_params(
                    validator,
                    format!("'{}' must be a non-negative integer, got {}", key, v),
                )
            }),
    }
}

/// Removes one Markdown code fence wrapping the whole text, if present.
///
/// ```
/// use llm_call::validation::strip_code_fence;
///
/// assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
/// assert_eq!(strip_code_fence("  plain  "), "plain");
/// ```
#[must_use]
pub fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(body) = trimmed
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    else {
        return trimmed;
    };

    match body.split_once('\n') {
        Some((tag, inner)) if tag.trim().chars().all(|c| c.is_ascii_alphanumeric()) => inner.trim(),
        _ => body.trim(),
    }
}

/// Fails when the response is blank.
#[derive(Debug, Clone, Default)]
pub struct NotEmptyValidator;

#[async_trait]
impl ValidationStrategy for NotEmptyValidator {
    fn name(&self) -> &str {
        "response_not_empty"
    }

    async fn validate(&self, response: &CompletionResponse, _: &ValidationContext) -> ValidationResult {
        if response.content.trim().is_empty() {
            ValidationResult::failure("response is empty")
                .with_suggestion("Provide a non-empty answer to the request")
        } else {
            ValidationResult::success()
        }
    }
}

/// Checks the response length in characters, bounds inclusive.
#[derive(Debug, Clone)]
pub struct LengthValidator {
    min_length: Option<usize>,
    max_length: Option<usize>,
}

impl LengthValidator {
    /// Creates a validator with the given bounds.
    ///
    /// # Errors
    ///
    /// Returns an error if neither bound is given or `min > max`.
    pub fn new(min_length: Option<usize>, max_length: Option<usize>) -> Result<Self, ValidationError> {
        match (min_length, max_length) {
            (None, None) => Err(ValidationError::invalid_params(
                "length",
                "at least one of 'min_length' or 'max_length' is required",
            )),
            (Some(min), Some(max)) if min > max => Err(ValidationError::invalid_params(
                "length",
                format!("min_length ({}) is greater than max_length ({})", min, max),
            )),
            _ => Ok(Self {
                min_length,
                max_length,
            }),
        }
    }

    /// Creates the validator from registry parameters.
    ///
    /// # Errors
    ///
    /// Returns an error for missing or malformed bounds.
    pub fn from_params(params: &Map<String, Value>) -> Result<Self, ValidationError> {
        Self::new(
            param_usize("length", params, "min_length")?,
            param_usize("length", params, "max_length")?,
        )
    }
}

#[async_trait]
impl ValidationStrategy for LengthValidator {
    fn name(&self) -> &str {
        "length"
    }

    async fn validate(&self, response: &CompletionResponse, _: &ValidationContext) -> ValidationResult {
        let length = response.content.chars().count();

        if let Some(min) = self.min_length.filter(|min| length < *min) {
            return ValidationResult::failure(format!(
                "response is {} characters, shorter than the minimum of {}",
                length, min
            ))
            .with_suggestion(format!("Expand the answer to at least {} characters", min))
            .with_debug("length", length);
        }

        if let Some(max) = self.max_length.filter(|max| length > *max) {
            return ValidationResult::failure(format!(
                "response is {} characters, longer than the maximum of {}",
                length, max
            ))
            .with_suggestion(format!("Shorten the answer to at most {} characters", max))
            .with_debug("length", length);
        }

        ValidationResult::success()
    }
}

/// Searches the response for a regular expression.
#[derive(Debug, Clone)]
pub struct RegexValidator {
    regex: Regex,
    must_match: bool,
}

impl RegexValidator {
    /// Creates the validator from registry parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if `pattern` is missing or does not compile.
    pub fn from_params(params: &Map<String, Value>) -> Result<Self, ValidationError> {
        let pattern = param_str("regex", params, "pattern")?
            .ok_or_else(|| ValidationError::invalid_params("regex", "missing 'pattern'"))?;
        let regex = Regex::new(pattern)
            .map_err(|e| ValidationError::invalid_params("regex", format!("bad pattern: {}", e)))?;

        Ok(Self {
            regex,
            must_match: param_bool("regex", params, "must_match", true)?,
        })
    }
}

#[async_trait]
impl ValidationStrategy for RegexValidator {
    fn name(&self) -> &str {
        "regex"
    }

    async fn validate(&self, response: &CompletionResponse, _: &ValidationContext) -> ValidationResult {
        let found = self.regex.is_match(&response.content);
        match (found, self.must_match) {
            (true, true) | (false, false) => ValidationResult::success(),
            (false, true) => ValidationResult::failure(format!(
                "response does not match the pattern `{}`",
                self.regex.as_str()
            ))
            .with_suggestion("Follow the required output format exactly"),
            (true, false) => ValidationResult::failure(format!(
                "response matches the forbidden pattern `{}`",
                self.regex.as_str()
            ))
            .with_suggestion("Remove the disallowed content"),
        }
    }
}

/// Requires the response to be a JSON document.
#[derive(Debug, Clone, Default)]
pub struct JsonValidator;

#[async_trait]
impl ValidationStrategy for JsonValidator {
    fn name(&self) -> &str {
        "json_string"
    }

    async fn validate(&self, response: &CompletionResponse, _: &ValidationContext) -> ValidationResult {
        match serde_json::from_str::<Value>(strip_code_fence(&response.content)) {
            Ok(_) => ValidationResult::success(),
            Err(e) => ValidationResult::failure(format!("response is not valid JSON: {}", e))
                .with_suggestion("Respond with valid JSON only, without commentary"),
        }
    }
}

/// Requires a substring.
#[derive(Debug, Clone)]
pub struct ContainsValidator {
    text: String,
    case_sensitive: bool,
}

impl ContainsValidator {
    /// Creates the validator from registry parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if `text` is missing or empty.
    pub fn from_params(params: &Map<String, Value>) -> Result<Self, ValidationError> {
        let text = param_str("contains", params, "text")?
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ValidationError::invalid_params("contains", "missing 'text'"))?;

        Ok(Self {
            text: text.to_string(),
            case_sensitive: param_bool("contains", params, "case_sensitive", false)?,
        })
    }
}

#[async_trait]
impl ValidationStrategy for ContainsValidator {
    fn name(&self) -> &str {
        "contains"
    }

    async fn validate(&self, response: &CompletionResponse, _: &ValidationContext) -> ValidationResult {
        let found = if self.case_sensitive {
            response.content.contains(&self.text)
        } else {
            response
                .content
                .to_lowercase()
                .contains(&self.text.to_lowercase())
        };

        if found {
            ValidationResult::success()
        } else {
            ValidationResult::failure(format!("response does not contain \"{}\"", self.text))
                .with_suggestion(format!("Include \"{}\" in the answer", self.text))
        }
    }
}

/// Requires the response to be JSON with the given dotted paths present.
#[derive(Debug, Clone)]
pub struct FieldPresentValidator {
    fields: Vec<String>,
}

impl FieldPresentValidator {
    /// Creates the validator from registry parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if `fields` is not a non-empty array of strings.
    pub fn from_params(params: &Map<String, Value>) -> Result<Self, ValidationError> {
        let fields: Vec<String> = match params.get("fields") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Option<_>>()
                .ok_or_else(|| {
                    ValidationError::invalid_params("field_present", "'fields' must contain only strings")
                })?,
            Some(Value::String(single)) => vec![single.clone()],
            _ => {
                return Err(ValidationError::invalid_params(
                    "field_present",
                    "missing 'fields' (an array of dotted paths)",
                ))
            }
        };

        if fields.is_empty() {
            return Err(ValidationError::invalid_params("field_present", "'fields' is empty"));
        }
        Ok(Self { fields })
    }

    /// Walks a dotted path; numeric segments index arrays.
    fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
        path.split('.').try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }
}

#[async_trait]
impl ValidationStrategy for FieldPresentValidator {
    fn name(&self) -> &str {
        "field_present"
    }

    async fn validate(&self, response: &CompletionResponse, _: &ValidationContext) -> ValidationResult {
        let document: Value = match serde_json::from_str(strip_code_fence(&response.content)) {
            Ok(v) => v,
            Err(e) => {
                return ValidationResult::failure(format!("response is not valid JSON: {}", e))
                    .with_suggestion("Respond with a JSON object containing the required fields")
            }
        };

        let missing: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| Self::lookup(&document, f).is_none())
            .map(String::as_str)
            .collect();

        if missing.is_empty() {
            ValidationResult::success()
        } else {
            ValidationResult::failure(format!("missing required fields: {}", missing.join(", ")))
                .with_suggestion(format!("Add the fields {} to the JSON", missing.join(", ")))
                .with_debug("missing", missing)
        }
    }
}

/// Requires a fenced code block, optionally in a given language.
#[derive(Debug, Clone, Default)]
pub struct CodeValidator {
    language: Option<String>,
}

impl CodeValidator {
    /// Creates the validator from registry parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if `language` is not a string.
    pub fn from_params(params: &Map<String, Value>) -> Result<Self, ValidationError> {
        Ok(Self {
            language: param_str("code", params, "language")?
                .filter(|l| !l.trim().is_empty())
                .map(|l| l.trim().to_string()),
        })
    }

    /// Returns the info strings of all closed code blocks.
    fn block_tags(content: &str) -> Vec<&str> {
        let mut tags = Vec::new();
        let mut open: Option<&str> = None;

        for line in content.lines() {
            let Some(rest) = line.trim_start().strip_prefix("```") else {
                continue;
            };
            match open.take() {
                Some(tag) => tags.push(tag),
                None => open = Some(rest.trim()),
            }
        }
        tags
    }
}

#[async_trait]
impl ValidationStrategy for CodeValidator {
    fn name(&self) -> &str {
        "code"
    }

    async fn validate(&self, response: &CompletionResponse, _: &ValidationContext) -> ValidationResult {
        let tags = Self::block_tags(&response.content);

        match &self.language {
            None if !tags.is_empty() => ValidationResult::success(),
            None => ValidationResult::failure("response contains no fenced code block")
                .with_suggestion("Put the code in a ``` fenced block"),
            Some(lang) if tags.iter().any(|t| t.eq_ignore_ascii_case(lang)) => {
                ValidationResult::success()
            }
            Some(lang) => ValidationResult::failure(format!(
                "response contains no ```{} code block",
                lang
            ))
            .with_suggestion(format!("Put the {} code in a ```{} fenced block", lang, lang))
            .with_debug("found_languages", tags),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(content: &str) -> CompletionResponse {
        CompletionResponse::text("test", "m", content)
    }

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    async fn check(v: &dyn ValidationStrategy, content: &str) -> ValidationResult {
        v.validate(&response(content), &ValidationContext::default()).await
    }

    #[test]
    fn fence_stripping() {
        assert_eq!(strip_code_fence("```\n[1,2]\n```"), "[1,2]");
        assert_eq!(strip_code_fence("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("```{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("text ```x```"), "text ```x```");
    }

    #[tokio::test]
    async fn not_empty_rejects_whitespace() {
        assert!(!check(&NotEmptyValidator, " \n\t").await.valid);
        assert!(check(&NotEmptyValidator, "hi").await.valid);
    }

    #[tokio::test]
    async fn length_bounds_are_inclusive_and_count_chars() {
        let v = LengthValidator::new(Some(3), Some(5)).unwrap();
        assert!(check(&v, "abc").await.valid);
        assert!(check(&v, "ééééé").await.valid);
        assert!(!check(&v, "ab").await.valid);

        let too_long = check(&v, "abcdef").await;
        assert!(too_long.error_message().contains("maximum of 5"));
        assert_eq!(too_long.debug_info["length"], 6);
    }

    #[test]
    fn length_requires_a_bound() {
        assert!(LengthValidator::from_params(&Map::new()).unwrap_err().is_invalid_params());
        assert!(LengthValidator::new(Some(10), Some(2)).is_err());
        assert!(LengthValidator::from_params(&params(json!({"min_length": -1}))).is_err());
    }

    #[tokio::test]
    async fn regex_must_match_and_must_not_match() {
        let v = RegexValidator::from_params(&params(json!({"pattern": r"^\d{3}$"}))).unwrap();
        assert!(check(&v, "123").await.valid);
        assert!(!check(&v, "12a").await.valid);

        let forbid =
            RegexValidator::from_params(&params(json!({"pattern": "(?i)sorry", "must_match": false})))
                .unwrap();
        assert!(!check(&forbid, "Sorry, I can't").await.valid);
        assert!(check(&forbid, "Here you go").await.valid);
    }

    #[test]
    fn regex_rejects_bad_pattern() {
        let err = RegexValidator::from_params(&params(json!({"pattern": "("}))).unwrap_err();
        assert!(err.to_string().contains("bad pattern"));
    }

    #[tokio::test]
    async fn json_accepts_fenced_json() {
        assert!(check(&JsonValidator, "```json\n{\"ok\": true}\n```").await.valid);
        assert!(check(&JsonValidator, "[1, 2, 3]").await.valid);

        let bad = check(&JsonValidator, "{\"ok\": tru").await;
        assert!(!bad.valid);
        assert!(!bad.suggestions.is_empty());
    }

    #[tokio::test]
    async fn contains_is_case_insensitive_by_default() {
        let v = ContainsValidator::from_params(&params(json!({"text": "Paris"}))).unwrap();
        assert!(check(&v, "the capital is paris").await.valid);

        let strict =
            ContainsValidator::from_params(&params(json!({"text": "Paris", "case_sensitive": true})))
                .unwrap();
        assert!(!check(&strict, "the capital is paris").await.valid);
    }

    #[tokio::test]
    async fn field_present_walks_dotted_paths() {
        let v = FieldPresentValidator::from_params(&params(json!({
            "fields": ["name", "address.city", "tags.0"]
        })))
        .unwrap();

        assert!(
            check(&v, r#"{"name":"a","address":{"city":"Oslo"},"tags":["x"]}"#)
                .await
                .valid
        );

        let missing = check(&v, r#"{"name":"a","address":{},"tags":[]}"#).await;
        assert!(!missing.valid);
        assert_eq!(missing.debug_info["missing"], json!(["address.city", "tags.0"]));

        assert!(!check(&v, "not json").await.valid);
    }

    #[test]
    fn field_present_requires_fields() {
        assert!(FieldPresentValidator::from_params(&Map::new()).is_err());
        assert!(FieldPresentValidator::from_params(&params(json!({"fields": []}))).is_err());
        assert!(FieldPresentValidator::from_params(&params(json!({"fields": [1]}))).is_err());
    }

    #[tokio::test]
    async fn code_block_detection() {
        let any = CodeValidator::default();
        assert!(check(&any, "Here:\n```\nls -la\n```").await.valid);
        assert!(!check(&any, "just run ls -la").await.valid);
        assert!(!check(&any, "```python\nunterminated").await.valid);

        let python = CodeValidator::from_params(&params(json!({"language": "python"}))).unwrap();
        assert!(check(&python, "```Python\nprint(1)\n```").await.valid);
        let wrong = check(&python, "```rust\nfn main() {}\n```").await;
        assert!(!wrong.valid);
        assert_eq!(wrong.debug_info["found_languages"], json!(["rust"]));
    }
}
