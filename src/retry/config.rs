//! Retry loop configuration.

use crate::retry::error::RetryError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// (De)serializes a [`Duration`] as whole milliseconds.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Settings for [`retry_with_validation`](crate::retry::retry_with_validation).
///
/// In TOML the durations are written in milliseconds:
///
/// ```toml
/// [retry]
/// max_attempts = 3
/// initial_delay_ms = 1000
/// backoff_factor = 2.0
/// max_delay_ms = 60000
/// debug_mode = false
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    #[serde(rename = "initial_delay_ms", with = "duration_ms")]
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each failure
    pub backoff_factor: f64,
    /// Upper bound for any single delay
    #[serde(rename = "max_delay_ms", with = "duration_ms")]
    pub max_delay: Duration,
    /// Log every response and feedback message at debug level
    pub debug_mode: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(60),
            debug_mode: false,
        }
    }
}

impl RetryConfig {
    /// Creates a configuration with the given attempt budget.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Sets the initial delay.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the backoff factor.
    #[must_use]
    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Enables or disables debug logging of responses and feedback.
    #[must_use]
    pub fn with_debug_mode(mut self, debug: bool) -> Self {
        self.debug_mode = debug;
        self
    }

    /// Returns the delay to wait after the given failed attempt.
    ///
    /// `initial_delay * backoff_factor^(attempt - 1)`, capped at `max_delay`;
    /// zero for attempt 0.
    ///
    /// ```
    /// use llm_call::retry::RetryConfig;
    /// use std::time::Duration;
    ///
    /// let config = RetryConfig::default();
    /// assert_eq!(config.delay_for_attempt(1), Duration::from_secs(1));
    /// assert_eq!(config.delay_for_attempt(3), Duration::from_secs(4));
    /// assert_eq!(config.delay_for_attempt(20), Duration::from_secs(60));
    /// ```
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exponent);

        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs.max(0.0))
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `RetryErrorKind::InvalidConfig` if any value is out of range.
    pub fn validate(&self) -> Result<(), RetryError> {
        if self.max_attempts == 0 {
            return Err(RetryError::invalid_config(
                "retry.max_attempts",
                "must be at least 1",
            ));
        }

        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(RetryError::invalid_config(
                "retry.backoff_factor",
                format!("must be a number >= 1.0, got {}", self.backoff_factor),
            ));
        }

        if self.initial_delay > self.max_delay {
            return Err(RetryError::invalid_config(
                "retry.initial_delay_ms",
                "must not exceed max_delay_ms",
            ));
        }

        Ok(())
    }
}
