//! Experiment Runner - bounded-concurrency trial scheduler
//!
//! ## Scheduling
//!
//! Each trial is spawned as its own task once a permit from a shared
//! semaphore is available, so at most `max_concurrency` trials are in flight
//! and a slot is handed to the next pending trial the moment any trial
//! finishes. Join handles are kept in submission order, which means the
//! returned outcomes line up with the input regardless of completion order.
//!
//! ## Failure isolation
//!
//! A failed, panicking or timed-out trial produces a failed outcome in its own
//! slot. Under [`FailurePolicy::FailOpen`] nothing else changes. Under
//! [`FailurePolicy::FailFast`] no new trials start after the first failure
//! and each unstarted trial is reported as a failed outcome.
//!
//! ## Cancellation
//!
//! Dropping the `run_trials` future aborts every trial it spawned.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::options::FailurePolicy;
use super::trial::{join_error_message, AbortOnDrop, Trial, TrialOutcome};
use crate::{Error, Result};

/// Error recorded for trials never started under a fail-fast policy.
pub const SKIPPED_AFTER_FAILURE: &str = "skipped: an earlier trial failed (fail-fast)";

/// Runs batches of trials with a concurrency bound.
#[derive(Debug, Clone, Copy)]
pub struct ExperimentRunner {
    max_concurrency: usize,
    failure_policy: FailurePolicy,
}

enum Slot<O> {
    Spawned {
        handle: AbortOnDrop<TrialOutcome<O>>,
        row_index: usize,
        repetition: usize,
    },
    Skipped {
        row_index: usize,
        repetition: usize,
    },
}

impl ExperimentRunner {
    /// Create a runner allowing `max_concurrency` trials in flight.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `max_concurrency` is zero.
    pub fn new(max_concurrency: usize) -> Result<Self> {
        if max_concurrency == 0 {
            return Err(Error::InvalidInput(
                "max_concurrency must be a positive integer".to_string(),
            ));
        }
        Ok(Self {
            max_concurrency,
            failure_policy: FailurePolicy::default(),
        })
    }

    /// Set the failure policy.
    #[must_use]
    pub const fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// The concurrency bound.
    #[must_use]
    pub const fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// The failure policy.
    #[must_use]
    pub const fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// Execute `trials` and return one outcome per trial, in input order.
    ///
    /// Returns only after every spawned trial has finished.
    pub async fn run_trials<I, O>(&self, trials: Vec<Trial<I, O>>) -> Vec<TrialOutcome<O>>
    where
        I: Clone + Send + Sync + 'static,
        O: Send + 'static,
    {
        if trials.is_empty() {
            return Vec::new();
        }

        let total = trials.len();
        let permits = Arc::new(Semaphore::new(self.max_concurrency.min(total)));
        let halted = Arc::new(AtomicBool::new(false));
        let fail_fast = self.failure_policy == FailurePolicy::FailFast;
        debug!(total, max_concurrency = self.max_concurrency, "scheduling trials");

        let mut slots = Vec::with_capacity(total);
        for trial in trials {
            let row_index = trial.row_index();
            let repetition = trial.repetition();

            // The semaphore is owned here and never closed.
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                slots.push(Slot::Skipped {
                    row_index,
                    repetition,
                });
                continue;
            };
            if fail_fast && halted.load(Ordering::Acquire) {
                slots.push(Slot::Skipped {
                    row_index,
                    repetition,
                });
                continue;
            }

            let halted = Arc::clone(&halted);
            let handle = AbortOnDrop(tokio::spawn(async move {
                let _permit = permit;
                let outcome = trial.execute().await;
                if outcome.is_failed() {
                    halted.store(true, Ordering::Release);
                }
                outcome
            }));
            slots.push(Slot::Spawned {
                handle,
                row_index,
                repetition,
            });
        }

        let mut outcomes = Vec::with_capacity(total);
        for slot in slots {
            let outcome = match slot {
                Slot::Spawned {
                    mut handle,
                    row_index,
                    repetition,
                } => match handle.join().await {
                    Ok(outcome) => outcome,
                    // Trial::execute never panics; only runtime shutdown lands here
                    Err(err) => {
                        let message = join_error_message(err);
                        warn!(row = row_index, repetition, %message, "trial task did not return");
                        TrialOutcome::failed(row_index, repetition, message, Utc::now(), Duration::ZERO)
                    }
                },
                Slot::Skipped {
                    row_index,
                    repetition,
                } => TrialOutcome::failed(
                    row_index,
                    repetition,
                    SKIPPED_AFTER_FAILURE,
                    Utc::now(),
                    Duration::ZERO,
                ),
            };
            outcomes.push(outcome);
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::trial::TrialFn;
    use std::sync::atomic::AtomicUsize;
    use anyhow::anyhow;

    fn trials<F>(n: usize, func: F) -> Vec<Trial<usize, usize>>
    where
        F: TrialFn<usize, usize>,
    {
        let func: Arc<dyn TrialFn<usize, usize>> = Arc::new(func);
        (0..n)
            .map(|i| Trial::new(Arc::new(i), i, 0, Arc::clone(&func), "exp-runner"))
            .collect()
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let err = ExperimentRunner::new(0).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let runner = ExperimentRunner::new(4).unwrap();
        let outcomes = runner
            .run_trials(trials(0, |x: usize| async move { Ok::<_, anyhow::Error>(x) }))
            .await;
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_outcomes_follow_input_order() {
        let runner = ExperimentRunner::new(8).unwrap();
        let outcomes = runner
            .run_trials(trials(8, |x: usize| async move {
                // Later rows finish first
                tokio::time::sleep(Duration::from_millis((8 - x as u64) * 5)).await;
                Ok::<_, anyhow::Error>(x * 10)
            }))
            .await;

        let values: Vec<usize> = outcomes.iter().map(|o| o.output.unwrap()).collect();
        assert_eq!(values, vec![0, 10, 20, 30, 40, 50, 60, 70]);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_siblings() {
        let runner = ExperimentRunner::new(2).unwrap();
        let outcomes = runner
            .run_trials(trials(5, |x: usize| async move {
                if x == 1 {
                    Err(anyhow!("row {x} exploded"))
                } else {
                    Ok(x)
                }
            }))
            .await;

        assert_eq!(outcomes.len(), 5);
        assert!(outcomes[1].is_failed());
        assert_eq!(outcomes[1].error.as_deref(), Some("row 1 exploded"));
        assert!(outcomes.iter().enumerate().all(|(i, o)| i == 1 || o.is_completed()));
    }

    #[tokio::test]
    async fn test_panic_is_isolated() {
        let runner = ExperimentRunner::new(3).unwrap();
        let outcomes = runner
            .run_trials(trials(3, |x: usize| async move {
                assert!(x != 2, "bad row");
                Ok::<_, anyhow::Error>(x)
            }))
            .await;

        assert!(outcomes[0].is_completed());
        assert!(outcomes[1].is_completed());
        assert_eq!(outcomes[2].error.as_deref(), Some("trial panicked: bad row"));
    }

    #[tokio::test]
    async fn test_fail_fast_stops_after_panic() {
        let started = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&started);
        let runner = ExperimentRunner::new(1)
            .unwrap()
            .with_failure_policy(FailurePolicy::FailFast);
        let outcomes = runner
            .run_trials(trials(4, move |x: usize| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    assert!(x != 0, "boom");
                    Ok::<_, anyhow::Error>(x)
                }
            }))
            .await;

        assert_eq!(outcomes.len(), 4);
        assert_eq!(outcomes[0].error.as_deref(), Some("trial panicked: boom"));
        for outcome in &outcomes[1..] {
            assert_eq!(outcome.error.as_deref(), Some(SKIPPED_AFTER_FAILURE));
        }
        assert_eq!(started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_run_aborts_spawned_trials() {
        let finished = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&finished);
        let runner = ExperimentRunner::new(4).unwrap();
        let run = runner.run_trials(trials(4, move |x: usize| {
            let counter = Arc::clone(&counter);
            async move {
                tokio::time::sleep(Duration::from_secs(10)).await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, anyhow::Error>(x)
            }
        }));

        assert!(tokio::time::timeout(Duration::from_secs(1), run).await.is_err());
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fail_fast_skips_unstarted_trials() {
        let runner = ExperimentRunner::new(1)
            .unwrap()
            .with_failure_policy(FailurePolicy::FailFast);
        let outcomes = runner
            .run_trials(trials(4, |x: usize| async move {
                if x == 1 {
                    Err(anyhow!("stop here"))
                } else {
                    Ok(x)
                }
            }))
            .await;

        assert_eq!(outcomes.len(), 4);
        assert!(outcomes[0].is_completed());
        assert_eq!(outcomes[1].error.as_deref(), Some("stop here"));
        assert_eq!(outcomes[2].error.as_deref(), Some(SKIPPED_AFTER_FAILURE));
        assert_eq!(outcomes[3].error.as_deref(), Some(SKIPPED_AFTER_FAILURE));
        assert_eq!(outcomes[3].row_index, 3);
    }
}
