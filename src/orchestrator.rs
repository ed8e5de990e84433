//! Today-vs-yesterday forecast comparison.
//!
//! Two legs (day offset 0 and -1) run concurrently on the same task. Each leg
//! drives its own [`RetryState`]; neither leg can cancel the other. The
//! comparison always resolves to a [`FetchOutcome`], never an error.

use crate::base_time::BaseTimeResolver;
use crate::error::FetchFailure;
use crate::models::{
    FetchFailureReason, FetchOutcome, ForecastProduct, ForecastQuery, ForecastValue, GridCell,
};
use crate::retry::{AttemptResult, RetryPolicy, RetryState, RetryStep};
use crate::weather::ForecastFetcher;
use chrono::{DateTime, TimeZone};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

const TODAY: i64 = 0;
const YESTERDAY: i64 = -1;

/// Issues the two time-shifted fetches and merges their results
#[derive(Clone)]
pub struct ForecastFetchOrchestrator {
    fetcher: Arc<dyn ForecastFetcher>,
    product: ForecastProduct,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl ForecastFetchOrchestrator {
    pub fn new(fetcher: Arc<dyn ForecastFetcher>, product: ForecastProduct) -> Self {
        Self {
            fetcher,
            product,
            policy: RetryPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Use an externally owned cancellation signal (e.g. caller shutdown)
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Compare today's and yesterday's temperature for `cell` as of `now`
    pub async fn compare_temperatures<Tz: TimeZone>(
        &self,
        cell: GridCell,
        now: &DateTime<Tz>,
    ) -> FetchOutcome {
        self.compare_with_policy(cell, now, &self.policy).await
    }

    /// Same as [`Self::compare_temperatures`] with retry knobs given per call
    pub async fn compare_temperatures_with<Tz: TimeZone>(
        &self,
        cell: GridCell,
        now: &DateTime<Tz>,
        max_retries: u32,
        per_attempt_timeout: Duration,
        backoff: Duration,
    ) -> FetchOutcome {
        let policy = RetryPolicy {
            max_attempts: max_retries,
            per_attempt_timeout,
            backoff,
            ..self.policy.clone()
        };
        self.compare_with_policy(cell, now, &policy).await
    }

    /// Run the comparison on the runtime; the receiver gets exactly one outcome
    pub fn spawn_comparison<Tz: TimeZone>(
        &self,
        cell: GridCell,
        now: &DateTime<Tz>,
    ) -> oneshot::Receiver<FetchOutcome> {
        let (tx, rx) = oneshot::channel();
        self.spawn_comparison_with_callback(cell, now, move |outcome| {
            if tx.send(outcome).is_err() {
                debug!("comparison receiver dropped before completion");
            }
        });
        rx
    }

    /// Run the comparison on the runtime and hand the outcome to `on_complete`
    /// once, even when both legs fail
    pub fn spawn_comparison_with_callback<Tz, F>(
        &self,
        cell: GridCell,
        now: &DateTime<Tz>,
        on_complete: F,
    ) -> JoinHandle<()>
    where
        Tz: TimeZone,
        F: FnOnce(FetchOutcome) + Send + 'static,
    {
        let this = self.clone();
        let now = now.with_timezone(&chrono::Utc);
        tokio::spawn(async move {
            let outcome = this.compare_temperatures(cell, &now).await;
            on_complete(outcome);
        })
    }

    async fn compare_with_policy<Tz: TimeZone>(
        &self,
        cell: GridCell,
        now: &DateTime<Tz>,
        policy: &RetryPolicy,
    ) -> FetchOutcome {
        let resolver = BaseTimeResolver::for_product(self.product);
        let query_for = |day_offset| ForecastQuery {
            product: self.product,
            cell,
            issuance: resolver.resolve(now, day_offset),
            day_offset,
        };
        let today_query = query_for(TODAY);
        let yesterday_query = query_for(YESTERDAY);

        info!(
            product = %self.product,
            %cell,
            today = %today_query.issuance,
            yesterday = %yesterday_query.issuance,
            "comparing forecast temperatures"
        );

        let (today, yesterday) = tokio::join!(
            self.run_leg(today_query, policy)
                .instrument(info_span!("leg", day_offset = TODAY)),
            self.run_leg(yesterday_query, policy)
                .instrument(info_span!("leg", day_offset = YESTERDAY)),
        );

        let (today_temp, today_failure) = split(today);
        let (yesterday_temp, yesterday_failure) = split(yesterday);
        let outcome = FetchOutcome {
            today_temp,
            yesterday_temp,
            today_failure,
            yesterday_failure,
        };

        match outcome.difference() {
            Some(delta) => info!(delta, "forecast comparison complete"),
            None => warn!(?outcome, "forecast comparison incomplete"),
        }
        outcome
    }

    async fn run_leg(
        &self,
        mut query: ForecastQuery,
        policy: &RetryPolicy,
    ) -> Result<ForecastValue, FetchFailure> {
        let mut state = RetryState::new(policy);

        loop {
            let attempt = self.attempt(&query, policy.per_attempt_timeout).await;
            debug!(trial = state.trials() + 1, issuance = %query.issuance, ?attempt, "attempt finished");

            match state.record(attempt) {
                RetryStep::Done(value) => return Ok(value),
                RetryStep::GiveUp(failure) => {
                    warn!(trials = state.trials(), %failure, "giving up on leg");
                    return Err(failure);
                }
                RetryStep::Retry { shift_issuance } => {
                    if shift_issuance {
                        let shifted = query.shifted();
                        info!(from = %query.issuance, to = %shifted.issuance, "shifting issuance after malformed response");
                        query = shifted;
                    }
                    tokio::select! {
                        _ = self.cancel.cancelled() => {
                            return Err(FetchFailure::fatal("cancelled during backoff"));
                        }
                        _ = tokio::time::sleep(policy.backoff) => {}
                    }
                }
            }
        }
    }

    async fn attempt(&self, query: &ForecastQuery, timeout: Duration) -> AttemptResult {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => AttemptResult::Fatal("cancelled".to_string()),
            result = tokio::time::timeout(timeout, self.fetcher.fetch(query)) => match result {
                Ok(fetched) => AttemptResult::from(fetched),
                Err(_) => AttemptResult::RetryableTimeout,
            },
        }
    }
}

fn split(
    result: Result<ForecastValue, FetchFailure>,
) -> (Option<i32>, Option<FetchFailureReason>) {
    match result {
        Ok(value) => (Some(value.temperature), None),
        Err(failure) => (None, Some(failure.into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;

    struct Fixed(i32);

    #[async_trait]
    impl ForecastFetcher for Fixed {
        async fn fetch(&self, _query: &ForecastQuery) -> Result<ForecastValue, FetchFailure> {
            Ok(ForecastValue { temperature: self.0 })
        }
    }

    #[tokio::test]
    async fn test_fixed_fetcher_has_zero_difference() {
        let orchestrator = ForecastFetchOrchestrator::new(Arc::new(Fixed(7)), ForecastProduct::ShortTerm);
        let outcome = orchestrator
            .compare_temperatures(GridCell::from_raw(60, 127), &Utc::now())
            .await;
        assert_eq!(outcome.difference(), Some(0));
        assert!(outcome.today_failure.is_none());
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_is_fatal() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let orchestrator = ForecastFetchOrchestrator::new(Arc::new(Fixed(7)), ForecastProduct::ShortTerm)
            .with_cancellation(cancel);
        let outcome = orchestrator
            .compare_temperatures(GridCell::from_raw(60, 127), &Utc::now())
            .await;
        assert!(outcome.is_empty());
        assert!(matches!(outcome.today_failure, Some(FetchFailureReason::Fatal(_))));
        assert!(matches!(outcome.yesterday_failure, Some(FetchFailureReason::Fatal(_))));
    }
}
