//! The retry-with-validation loop.

use crate::llm::{CompletionRequest, CompletionResponse, LLMClient};
use crate::messages::Message;
use crate::retry::config::RetryConfig;
use crate::retry::error::RetryError;
use crate::retry::feedback::{build_feedback, summarize_failures};
use crate::retry::staged::{AttemptRecord, RetryStage, StagedRetryConfig, StagedRetryManager};
use crate::validation::{run_validators, ValidationContext, ValidationStrategy};
use serde::{Deserialize, Serialize};

/// An accepted response and how it was obtained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryOutcome {
    /// The response that passed every validator
    pub response: CompletionResponse,
    /// Attempts used, including the accepted one
    pub attempts: u32,
    /// Every attempt, in order
    pub history: Vec<AttemptRecord>,
}

/// Thresholds that never escalate, used when no staged config is given.
fn unstaged() -> StagedRetryConfig {
    StagedRetryConfig {
        tool_suggestion_after: u32::MAX - 1,
        human_review_after: u32::MAX,
        tool: None,
    }
}

/// Calls the model until a response passes every validator.
///
/// Each failed validation appends the rejected answer and a correction
/// message to the conversation before the next attempt. Retriable provider
/// errors are retried too; the wait is the larger of the backoff delay and
/// the provider's `retry-after` hint. With a staged config, failed attempts
/// first unlock the configured tool and then stop the loop for human review.
///
/// # Errors
///
/// - `InvalidConfig` if either configuration fails validation
/// - `Provider` for a non-retriable provider error, or a retriable one on
///   the last attempt
/// - `HumanReviewNeeded` once the failure count reaches the review threshold,
///   whether the failures were rejected answers or retriable provider errors
/// - `Exhausted` when the last attempt still fails validation
pub async fn retry_with_validation(
    client: &dyn LLMClient,
    request: CompletionRequest,
    validators: &[Box<dyn ValidationStrategy>],
    config: &RetryConfig,
    staged: Option<&StagedRetryConfig>,
    context: &ValidationContext,
) -> Result<RetryOutcome, RetryError> {
    config.validate()?;
    if let Some(staged) = staged {
        staged.validate()?;
    }

    let mut manager = StagedRetryManager::new(staged.cloned().unwrap_or_else(unstaged));
    let mut request = request;
    let mut failed: u32 = 0;
    let mut last_errors: Vec<String> = Vec::new();
    let mut last_content: Option<String> = None;

    for attempt in 1..=config.max_attempts {
        let stage = manager.stage_for(failed);
        match stage {
            RetryStage::HumanReview => {
                tracing::warn!(failed, "stopping for human review");
                return Err(RetryError::human_review_needed(
                    failed,
                    last_errors,
                    manager.into_history(),
                ));
            }
            RetryStage::ToolAssisted => {
                manager.apply_tool_assist(&mut request);
            }
            RetryStage::Basic => {}
        }

        tracing::info!(
            attempt,
            max_attempts = config.max_attempts,
            stage = %stage,
            model = %request.model,
            provider = client.provider_name(),
            "calling model"
        );

        let response = match client.complete(&request).await {
            Ok(response) => response,
            Err(e) => {
                failed += 1;
                manager.record(AttemptRecord::provider_failed(attempt, stage, e.to_string()));

                if !e.is_retriable() {
                    tracing::error!(attempt, error = %e, "provider call failed");
                    return Err(RetryError::provider(attempt, e));
                }

                last_errors = vec![format!("provider: {e}")];
                if manager.stage_for(failed) == RetryStage::HumanReview {
                    tracing::warn!(attempt, error = %e, failed, "stopping for human review");
                    return Err(RetryError::human_review_needed(
                        failed,
                        last_errors,
                        manager.into_history(),
                    ));
                }

                if attempt == config.max_attempts {
                    tracing::error!(attempt, error = %e, "provider call failed");
                    return Err(RetryError::provider(attempt, e));
                }

                let delay = config
                    .delay_for_attempt(attempt)
                    .max(e.retry_after().unwrap_or_default());
                tracing::warn!(
                    attempt,
                    error = %e,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "retriable provider error"
                );
                tokio::time::sleep(delay).await;
                continue;
            }
        };

        if config.debug_mode {
            tracing::debug!(attempt, content = %response.content, "model response");
        }

        let failures = run_validators(validators, &response, &context.for_attempt(attempt)).await;

        if failures.is_empty() {
            tracing::info!(attempt, "response accepted");
            manager.record(AttemptRecord::accepted(attempt, stage, response.content.clone()));
            return Ok(RetryOutcome {
                response,
                attempts: attempt,
                history: manager.into_history(),
            });
        }

        failed += 1;
        let errors = summarize_failures(&failures);
        tracing::warn!(attempt, errors = ?errors, "response failed validation");
        manager.record(AttemptRecord::rejected(
            attempt,
            stage,
            response.content.clone(),
            errors.clone(),
        ));

        let next_stage = manager.stage_for(failed);
        if attempt < config.max_attempts && next_stage != RetryStage::HumanReview {
            let tool_hint = match next_stage {
                RetryStage::ToolAssisted => manager.tool_suggestion(&errors),
                _ => None,
            };
            let feedback = build_feedback(&failures, attempt, tool_hint.as_deref());

            if config.debug_mode {
                tracing::debug!(attempt, feedback = %feedback.content, "feedback message");
            }

            request.messages.push(Message::assistant(response.content.clone()));
            request.messages.push(feedback);

            let delay = config.delay_for_attempt(attempt);
            tracing::debug!(
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "backing off"
            );
            tokio::time::sleep(delay).await;
        }

        last_errors = errors;
        last_content = Some(response.content);
    }

    if manager.stage_for(failed) == RetryStage::HumanReview {
        return Err(RetryError::human_review_needed(
            failed,
            last_errors,
            manager.into_history(),
        ));
    }

    Err(RetryError::exhausted(config.max_attempts, last_errors, last_content))
}
