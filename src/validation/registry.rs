//! Validator registry.
//!
//! Maps validator names, as they appear in requests and configuration, to
//! factories that build a [`ValidationStrategy`] from JSON parameters.

use crate::llm::LLMClient;
use crate::validation::ai::{LlmJudgeValidator, CONTRADICTION_CRITERIA};
use crate::validation::builtin::{
    param_bool, param_str, CodeValidator, ContainsValidator, FieldPresentValidator, JsonValidator,
    LengthValidator, NotEmptyValidator, RegexValidator,
};
use crate::validation::error::ValidationError;
use crate::validation::strategy::ValidationStrategy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Minimum Jaro-Winkler similarity for a "did you mean" suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.8;

/// A validator named in a request, with its parameters.
///
/// Deserializes either from an object or from a bare name:
///
/// ```
/// use llm_call::validation::ValidatorSpec;
///
/// let full: ValidatorSpec =
///     serde_json::from_str(r#"{"type": "length", "params": {"min_length": 10}}"#).unwrap();
/// let bare: ValidatorSpec = serde_json::from_str(r#""json_string""#).unwrap();
///
/// assert_eq!(full.kind, "length");
/// assert_eq!(bare, ValidatorSpec::named("json_string"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SpecRepr")]
pub struct ValidatorSpec {
    /// Registered validator name
    #[serde(rename = "type")]
    pub kind: String,
    /// Factory parameters
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SpecRepr {
    Name(String),
    Full {
        #[serde(rename = "type")]
        kind: String,
        #[serde(default)]
        params: Map<String, Value>,
    },
}

impl From<SpecRepr> for ValidatorSpec {
    fn from(repr: SpecRepr) -> Self {
        match repr {
            SpecRepr::Name(kind) => Self {
                kind,
                params: Map::new(),
            },
            SpecRepr::Full { kind, params } => Self { kind, params },
        }
    }
}

impl ValidatorSpec {
    /// A spec with no parameters.
    #[must_use]
    pub fn named(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: Map::new(),
        }
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Things a factory may need beyond its parameters.
#[derive(Debug, Clone, Default)]
pub struct ValidationServices {
    /// Client for AI-assisted validators
    pub judge: Option<Arc<dyn LLMClient>>,
    /// Model name to send to the judge client
    pub judge_model: String,
}

impl ValidationServices {
    /// Services with a judge.
    #[must_use]
    pub fn with_judge(judge: Arc<dyn LLMClient>, judge_model: impl Into<String>) -> Self {
        Self {
            judge: Some(judge),
            judge_model: judge_model.into(),
        }
    }
}

/// Builds a validator from its parameters.
pub type ValidatorFactory = Arc<
    dyn Fn(&Map<String, Value>, &ValidationServices) -> Result<Box<dyn ValidationStrategy>, ValidationError>
        + Send
        + Sync,
>;

/// Name-to-factory registry.
#[derive(Clone, Default)]
pub struct ValidatorRegistry {
    factories: HashMap<String, ValidatorFactory>,
}

impl fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorRegistry")
            .field("names", &self.names())
            .finish()
    }
}

fn judge_validator(
    name: &str,
    criteria: String,
    params: &Map<String, Value>,
    services: &ValidationServices,
) -> Result<Box<dyn ValidationStrategy>, ValidationError> {
    let judge = services
        .judge
        .clone()
        .ok_or_else(|| ValidationError::missing_judge(name))?;
    let model = param_str(name, params, "model")?
        .map(str::to_string)
        .unwrap_or_else(|| services.judge_model.clone());
    let fail_open = param_bool(name, params, "fail_open", false)?;

    Ok(Box::new(
        LlmJudgeValidator::new(name, judge, model, criteria).with_fail_open(fail_open),
    ))
}

impl ValidatorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in and AI-assisted validator.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        registry.register("response_not_empty", |_, _| Ok(Box::new(NotEmptyValidator)));
        registry.register("not_empty", |_, _| Ok(Box::new(NotEmptyValidator)));
        registry.register("length", |p, _| Ok(Box::new(LengthValidator::from_params(p)?)));
        registry.register("regex", |p, _| Ok(Box::new(RegexValidator::from_params(p)?)));
        registry.register("json_string", |_, _| Ok(Box::new(JsonValidator)));
        registry.register("json", |_, _| Ok(Box::new(JsonValidator)));
        registry.register("contains", |p, _| Ok(Box::new(ContainsValidator::from_params(p)?)));
        registry.register("field_present", |p, _| {
            Ok(Box::new(FieldPresentValidator::from_params(p)?))
        });
        registry.register("code", |p, _| Ok(Box::new(CodeValidator::from_params(p)?)));

        registry.register("ai_judge", |p, services| {
            let criteria = param_str("ai_judge", p, "criteria")?
                .filter(|c| !c.trim().is_empty())
                .ok_or_else(|| ValidationError::invalid_params("ai_judge", "missing 'criteria'"))?;
            judge_validator("ai_judge", criteria.to_string(), p, services)
        });
        registry.register("ai_contradiction_check", |p, services| {
            judge_validator(
                "ai_contradiction_check",
                CONTRADICTION_CRITERIA.to_string(),
                p,
                services,
            )
        });

        registry
    }

    /// Registers a factory, replacing any previous one with the same name.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Map<String, Value>, &ValidationServices) -> Result<Box<dyn ValidationStrategy>, ValidationError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Returns true if a validator is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Returns the registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the registered name closest to `name`, if any is close enough.
    #[must_use]
    pub fn suggest(&self, name: &str) -> Option<String> {
        self.factories
            .keys()
            .map(|candidate| (strsim::jaro_winkler(name, candidate), candidate))
            .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, candidate)| candidate.clone())
    }

    /// Builds one validator.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown names or rejected parameters.
    pub fn create(
        &self,
        spec: &ValidatorSpec,
        services: &ValidationServices,
    ) -> Result<Box<dyn ValidationStrategy>, ValidationError> {
        let factory = self
            .factories
            .get(&spec.kind)
            .ok_or_else(|| ValidationError::unknown_validator(&spec.kind, self.suggest(&spec.kind)))?;
        factory(&spec.params, services)
    }

    /// Builds every validator, stopping at the first error.
    ///
    /// # Errors
    ///
    /// Returns the first creation error.
    pub fn create_all(
        &self,
        specs: &[ValidatorSpec],
        services: &ValidationServices,
    ) -> Result<Vec<Box<dyn ValidationStrategy>>, ValidationError> {
        specs.iter().map(|spec| self.create(spec, services)).collect()
    }
}
