//! Retry policy and per-leg retry state machine.
//!
//! Each fetch attempt resolves to an [`AttemptResult`]:
//! - `Success`: done
//! - `RetryableTimeout`: retry the same query after the backoff
//! - `RetryableMalformed`: retry with the issuance shifted one interval back
//!   (once per leg), keeping at least `malformed_min_remaining` attempts
//! - `Fatal`: stop immediately

use crate::error::FetchFailure;
use crate::models::ForecastValue;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_ATTEMPT_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_BACKOFF_MS: u64 = 1000;
pub const DEFAULT_MALFORMED_MIN_REMAINING: u32 = 2;

/// Retry configuration for one comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts allowed per leg before giving up
    pub max_attempts: u32,
    /// Upper bound on a single attempt
    pub per_attempt_timeout: Duration,
    /// Fixed pause between attempts
    pub backoff: Duration,
    /// Attempts guaranteed to remain after the issuance shift
    pub malformed_min_remaining: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            per_attempt_timeout: Duration::from_millis(DEFAULT_ATTEMPT_TIMEOUT_MS),
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
            malformed_min_remaining: DEFAULT_MALFORMED_MIN_REMAINING,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, per_attempt_timeout: Duration, backoff: Duration) -> Self {
        Self {
            max_attempts,
            per_attempt_timeout,
            backoff,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_malformed_min_remaining(mut self, remaining: u32) -> Self {
        self.malformed_min_remaining = remaining;
        self
    }

    /// Worst-case wall time of one leg, including a budget extension
    #[must_use]
    pub fn worst_case(&self) -> Duration {
        let attempts = self.max_attempts.max(1).saturating_add(self.malformed_min_remaining);
        self.per_attempt_timeout
            .saturating_add(self.backoff)
            .saturating_mul(attempts)
    }
}

/// Classified result of a single attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptResult {
    Success(ForecastValue),
    RetryableTimeout,
    RetryableMalformed(String),
    Fatal(String),
}

impl From<Result<ForecastValue, FetchFailure>> for AttemptResult {
    fn from(result: Result<ForecastValue, FetchFailure>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(FetchFailure::Timeout) => Self::RetryableTimeout,
            Err(FetchFailure::Malformed(msg)) => Self::RetryableMalformed(msg),
            Err(FetchFailure::Fatal(msg)) => Self::Fatal(msg),
        }
    }
}

/// What the leg driver should do next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryStep {
    Done(ForecastValue),
    Retry { shift_issuance: bool },
    GiveUp(FetchFailure),
}

/// Trial bookkeeping for one leg; lives only for one invocation
#[derive(Debug, Clone)]
pub struct RetryState {
    trials: u32,
    budget: u32,
    shifted: bool,
    min_remaining_after_shift: u32,
}

impl RetryState {
    #[must_use]
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            trials: 0,
            budget: policy.max_attempts.max(1),
            shifted: false,
            min_remaining_after_shift: policy.malformed_min_remaining,
        }
    }

    #[must_use]
    pub fn trials(&self) -> u32 {
        self.trials
    }

    #[must_use]
    pub fn budget(&self) -> u32 {
        self.budget
    }

    #[must_use]
    pub fn has_shifted(&self) -> bool {
        self.shifted
    }

    fn remaining(&self) -> u32 {
        self.budget.saturating_sub(self.trials)
    }

    /// Fold one attempt into the state and decide the next step
    pub fn record(&mut self, attempt: AttemptResult) -> RetryStep {
        match attempt {
            AttemptResult::Success(value) => RetryStep::Done(value),
            AttemptResult::Fatal(cause) => RetryStep::GiveUp(FetchFailure::Fatal(cause)),
            AttemptResult::RetryableTimeout => {
                self.trials += 1;
                if self.remaining() > 0 {
                    RetryStep::Retry {
                        shift_issuance: false,
                    }
                } else {
                    RetryStep::GiveUp(FetchFailure::Timeout)
                }
            }
            AttemptResult::RetryableMalformed(msg) => {
                self.trials += 1;
                if self.shifted {
                    return if self.remaining() > 0 {
                        RetryStep::Retry {
                            shift_issuance: false,
                        }
                    } else {
                        RetryStep::GiveUp(FetchFailure::Malformed(msg))
                    };
                }

                self.shifted = true;
                if self.remaining() < self.min_remaining_after_shift {
                    self.budget = self.trials.saturating_add(self.min_remaining_after_shift);
                    debug!(budget = self.budget, "extended trial budget after issuance shift");
                }
                if self.remaining() > 0 {
                    RetryStep::Retry {
                        shift_issuance: true,
                    }
                } else {
                    RetryStep::GiveUp(FetchFailure::Malformed(msg))
                }
            }
        }
    }
}
