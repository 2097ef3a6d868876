//! # Recovery Module
//!
//! The error policy shared by conversion and duplicate detection.
//!
//! ## Per-class actions
//! | Class         | Action                                              |
//! |---------------|-----------------------------------------------------|
//! | memory        | low-memory fallback, then recommend stopping        |
//! | compatibility | substitute the next format in the chain, once       |
//! | corruption    | fail immediately                                    |
//! | network       | retry with exponential backoff (3 attempts)         |
//! | timeout       | fail                                                |
//! | generic       | fail                                                |
//!
//! ## Batch level
//! Stopping is recommended once more than half of at least ten completed
//! results failed, or as soon as any memory-class error is seen.

mod messages;

pub use messages::UserMessage;

use crate::error::{Classify, ErrorClass};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::thread;
use std::time::Duration;
use tracing::warn;

/// What to do about a failed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryAction {
    /// Re-run with smaller intermediate buffers
    LowMemoryFallback,
    /// Re-run once with the next format in the fallback chain
    SubstituteFormat,
    /// Re-run the same operation after a backoff delay
    Retry { max_attempts: u32 },
    /// Give up on this item
    Fail,
}

/// Why a batch should stop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StopReason {
    /// A memory-class error occurred
    MemoryPressure,
    /// Too many completed items failed
    FailureRate { failed: usize, completed: usize },
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::MemoryPressure => write!(f, "memory pressure"),
            StopReason::FailureRate { failed, completed } => {
                write!(f, "{} of {} files failed", failed, completed)
            }
        }
    }
}

/// Batch-level recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BatchDecision {
    Continue,
    Stop(StopReason),
}

/// Retry settings for transient failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each failure
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

/// Classifies failures and decides between retry, fallback and abort
#[derive(Debug, Clone)]
pub struct ErrorPolicy {
    retry: RetryConfig,
    stop_failure_rate: f64,
    min_sample: usize,
}

impl ErrorPolicy {
    /// Create a policy with the default thresholds
    pub fn new() -> Self {
        Self {
            retry: RetryConfig::default(),
            stop_failure_rate: 0.5,
            min_sample: 10,
        }
    }

    /// Replace the retry settings
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the batch stop threshold
    pub fn with_stop_threshold(mut self, failure_rate: f64, min_sample: usize) -> Self {
        self.stop_failure_rate = failure_rate;
        self.min_sample = min_sample;
        self
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Decide what to do about a failure of the given class
    pub fn action_for(&self, class: ErrorClass) -> RecoveryAction {
        match class {
            ErrorClass::Memory => RecoveryAction::LowMemoryFallback,
            ErrorClass::Compatibility => RecoveryAction::SubstituteFormat,
            ErrorClass::Network => RecoveryAction::Retry {
                max_attempts: self.retry.max_attempts,
            },
            ErrorClass::Corruption | ErrorClass::Timeout | ErrorClass::Generic => {
                RecoveryAction::Fail
            }
        }
    }

    /// Delay before the given retry (1 = first retry)
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.retry.base_delay.saturating_mul(factor)
    }

    /// Run an operation, retrying transient failures with exponential backoff.
    ///
    /// Non-transient failures are returned immediately. After the last
    /// attempt the final error is returned.
    pub fn retry<T, E, F>(&self, operation: &str, mut op: F) -> Result<T, E>
    where
        E: Classify + Display,
        F: FnMut() -> Result<T, E>,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.class().is_transient() && attempt < max_attempts => {
                    let delay = self.backoff_delay(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient failure, retrying"
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Recommend whether a batch should keep going
    pub fn batch_decision(
        &self,
        completed: usize,
        failed: usize,
        memory_error_seen: bool,
    ) -> BatchDecision {
        if memory_error_seen {
            return BatchDecision::Stop(StopReason::MemoryPressure);
        }

        if completed >= self.min_sample && completed > 0 {
            let rate = failed as f64 / completed as f64;
            if rate > self.stop_failure_rate {
                return BatchDecision::Stop(StopReason::FailureRate { failed, completed });
            }
        }

        BatchDecision::Continue
    }

    /// Build the user-facing message for an error
    pub fn user_message<E>(&self, error: &E) -> UserMessage
    where
        E: Classify + Display,
    {
        UserMessage::for_error(error)
    }
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self::new()
    }
}
