// ABOUTME: Retry and timeout execution for single actions
// ABOUTME: Runs one action under an attempt budget with geometric backoff and a hard per-attempt timeout

use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use super::action::{Action, ActionOutcome};
use super::error::EngineError;

/// Attempt budget and backoff shape for one task or rollback action.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no backoff. Timeout still applies.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn exponential_backoff(max_attempts: u32, initial_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_attempts,
            initial_delay,
            backoff_multiplier: multiplier,
            max_delay: Duration::from_secs(300),
        }
    }

    pub fn fixed_delay(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: delay,
            backoff_multiplier: 1.0,
            max_delay: delay,
        }
    }

    /// Delay before the retry following the given attempt (1-indexed):
    /// `initial_delay * multiplier^(attempt - 1)`, capped at `max_delay`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let delay_ms = (self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(exponent as i32)) as u64;

        let delay = Duration::from_millis(delay_ms);
        if delay > self.max_delay {
            self.max_delay
        } else {
            delay
        }
    }
}

/// Result of driving one action through its full retry budget.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptReport {
    pub outcome: ActionOutcome,
    pub attempts: u32,
    pub timed_out: bool,
    pub attempt_timeout: Duration,
}

impl AttemptReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    /// The engine error a failed report corresponds to; None on success.
    pub fn to_error(&self, description: &str) -> Option<EngineError> {
        if self.is_success() {
            return None;
        }
        Some(if self.timed_out {
            EngineError::ActionTimeout {
                description: description.to_string(),
                timeout: self.attempt_timeout,
                attempt: self.attempts,
            }
        } else {
            EngineError::ActionFailure {
                description: description.to_string(),
                message: self
                    .outcome
                    .error_message()
                    .unwrap_or("unknown failure")
                    .to_string(),
            }
        })
    }
}

/// Executes actions under a combined attempt/backoff and wall-clock contract.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    default_timeout: Duration,
}

impl RetryExecutor {
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Run `action` for up to `policy.max_attempts` attempts, each bounded by
    /// `attempt_timeout` (falling back to the executor default). The first
    /// success short-circuits; between failed attempts (not after the last)
    /// the backoff delay is slept. A timed-out attempt is forcibly
    /// terminated via the action's cancel capability when it has one, and
    /// counts as a failed attempt.
    pub async fn execute_with_retry(
        &self,
        action: &dyn Action,
        policy: &RetryPolicy,
        attempt_timeout: Option<Duration>,
        description: &str,
    ) -> AttemptReport {
        let attempt_timeout = attempt_timeout.unwrap_or(self.default_timeout);
        let max_attempts = policy.max_attempts.max(1);

        let mut last_outcome = ActionOutcome::failure("action never ran");
        let mut timed_out = false;

        for attempt in 1..=max_attempts {
            info!(
                description,
                attempt, max_attempts, "executing action"
            );

            match timeout(attempt_timeout, action.run()).await {
                Ok(ActionOutcome::Success) => {
                    debug!(description, attempt, "action succeeded");
                    return AttemptReport {
                        outcome: ActionOutcome::Success,
                        attempts: attempt,
                        timed_out: false,
                        attempt_timeout,
                    };
                }
                Ok(outcome) => {
                    warn!(
                        description,
                        attempt,
                        error = outcome.error_message(),
                        "action attempt failed"
                    );
                    timed_out = false;
                    last_outcome = outcome;
                }
                Err(_) => {
                    warn!(
                        description,
                        attempt,
                        timeout = ?attempt_timeout,
                        "action attempt timed out"
                    );

                    if action.supports_cancel() {
                        action.cancel().await;
                    } else {
                        warn!(
                            description,
                            "action has no cancel support; detaching, work may still be running"
                        );
                    }

                    timed_out = true;
                    last_outcome = ActionOutcome::failure(format!(
                        "timed out after {:?}",
                        attempt_timeout
                    ));
                }
            }

            if attempt < max_attempts {
                let delay = policy.delay_after(attempt);
                debug!(description, ?delay, "backing off before retry");
                sleep(delay).await;
            }
        }

        error!(
            description,
            attempts = max_attempts,
            "action failed after exhausting retry budget"
        );

        AttemptReport {
            outcome: last_outcome,
            attempts: max_attempts,
            timed_out,
            attempt_timeout,
        }
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(Duration::from_secs(3600))
    }
}
