//! Trial - one execution of the user function against one dataset row

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::context;

/// Boxed future returned by a [`TrialFn`].
pub type TrialFuture<O> = Pin<Box<dyn Future<Output = anyhow::Result<O>> + Send>>;

/// The function under evaluation.
///
/// Implemented for any `Fn(I) -> impl Future<Output = anyhow::Result<O>>`,
/// so plain async closures work:
///
/// ```rust
/// use evalrun::experiment::TrialFn;
///
/// let greet = |name: String| async move { Ok::<_, anyhow::Error>(format!("hi {name}")) };
/// fn assert_trial_fn<F: TrialFn<String, String>>(_: &F) {}
/// assert_trial_fn(&greet);
/// ```
pub trait TrialFn<I, O>: Send + Sync + 'static {
    /// Invoke the function with one row.
    fn call(&self, input: I) -> TrialFuture<O>;
}

impl<I, O, F, Fut> TrialFn<I, O> for F
where
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<O>> + Send + 'static,
{
    fn call(&self, input: I) -> TrialFuture<O> {
        Box::pin(self(input))
    }
}

/// Terminal state of a single trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrialState {
    /// The user function returned a value.
    Completed,
    /// The user function returned an error, panicked, timed out, or was
    /// skipped under a fail-fast policy.
    Failed,
}

/// Outcome of one trial. Produced exactly once per trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialOutcome<O> {
    /// Completed or failed.
    pub state: TrialState,
    /// Return value of a completed trial.
    pub output: Option<O>,
    /// Error message of a failed trial.
    pub error: Option<String>,
    /// Index of the dataset row the trial ran against.
    pub row_index: usize,
    /// Repetition index of this row (0-based).
    pub repetition: usize,
    /// Wall-clock start time.
    pub started_at: DateTime<Utc>,
    /// Time from just before invocation to just after completion or failure.
    pub duration: Duration,
}

impl<O> TrialOutcome<O> {
    /// A completed outcome.
    #[must_use]
    pub fn completed(
        row_index: usize,
        repetition: usize,
        output: O,
        started_at: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        Self {
            state: TrialState::Completed,
            output: Some(output),
            error: None,
            row_index,
            repetition,
            started_at,
            duration,
        }
    }

    /// A failed outcome.
    #[must_use]
    pub fn failed(
        row_index: usize,
        repetition: usize,
        error: impl Into<String>,
        started_at: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        Self {
            state: TrialState::Failed,
            output: None,
            error: Some(error.into()),
            row_index,
            repetition,
            started_at,
            duration,
        }
    }

    /// Whether the trial completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state == TrialState::Completed
    }

    /// Whether the trial failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.state == TrialState::Failed
    }
}

/// One (row, repetition) pairing bound to the user function and the
/// experiment id.
pub struct Trial<I, O> {
    row: Arc<I>,
    row_index: usize,
    repetition: usize,
    func: Arc<dyn TrialFn<I, O>>,
    experiment_id: Arc<str>,
    timeout: Option<Duration>,
}

impl<I, O> Trial<I, O>
where
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
{
    /// Create a trial. The row and function are shared, never copied per
    /// trial until invocation.
    #[must_use]
    pub fn new(
        row: Arc<I>,
        row_index: usize,
        repetition: usize,
        func: Arc<dyn TrialFn<I, O>>,
        experiment_id: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            row,
            row_index,
            repetition,
            func,
            experiment_id: experiment_id.into(),
            timeout: None,
        }
    }

    /// Fail the trial if it runs longer than `timeout`.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Index of the dataset row.
    #[must_use]
    pub const fn row_index(&self) -> usize {
        self.row_index
    }

    /// Repetition index.
    #[must_use]
    pub const fn repetition(&self) -> usize {
        self.repetition
    }

    /// Experiment id this trial correlates with.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Run the user function once inside the experiment's correlation
    /// context. Errors, panics and timeouts become a failed outcome; nothing
    /// propagates out.
    ///
    /// The function runs on its own task, which is aborted if this future
    /// is dropped.
    pub async fn execute(self) -> TrialOutcome<O> {
        let Self {
            row,
            row_index,
            repetition,
            func,
            experiment_id,
            timeout,
        } = self;

        let started_at = Utc::now();
        let clock = Instant::now();
        let mut task = AbortOnDrop(tokio::spawn(context::run_in_context(
            experiment_id,
            async move {
                let call = func.call(I::clone(&row));
                match timeout {
                    Some(limit) => tokio::time::timeout(limit, call)
                        .await
                        .unwrap_or_else(|_| Err(anyhow!("trial timed out after {limit:?}"))),
                    None => call.await,
                }
            },
        )));
        let joined = task.join().await;
        let duration = clock.elapsed();

        match joined {
            Ok(Ok(output)) => {
                debug!(row = row_index, repetition, ?duration, "trial completed");
                TrialOutcome::completed(row_index, repetition, output, started_at, duration)
            }
            Ok(Err(err)) => {
                debug!(row = row_index, repetition, error = %err, "trial failed");
                TrialOutcome::failed(row_index, repetition, format!("{err:#}"), started_at, duration)
            }
            Err(err) => {
                let message = join_error_message(err);
                warn!(row = row_index, repetition, %message, "trial task did not return");
                TrialOutcome::failed(row_index, repetition, message, started_at, duration)
            }
        }
    }
}

/// Join handle that aborts its task when dropped.
pub(super) struct AbortOnDrop<T>(pub(super) JoinHandle<T>);

impl<T> AbortOnDrop<T> {
    /// Wait for the task to finish.
    pub(super) async fn join(&mut self) -> Result<T, JoinError> {
        (&mut self.0).await
    }
}

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Failure message for a task that panicked or was cancelled.
pub(super) fn join_error_message(err: JoinError) -> String {
    if err.is_panic() {
        match panic_text(err.into_panic().as_ref()) {
            Some(text) => format!("trial panicked: {text}"),
            None => "trial panicked".to_string(),
        }
    } else {
        format!("trial cancelled: {err}")
    }
}

fn panic_text(payload: &(dyn Any + Send)) -> Option<String> {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial<F: TrialFn<u32, u32>>(func: F) -> Trial<u32, u32> {
        Trial::new(Arc::new(21), 3, 1, Arc::new(func), "exp-trial")
    }

    #[tokio::test]
    async fn test_execute_completed() {
        let outcome = trial(|x: u32| async move { Ok::<_, anyhow::Error>(x * 2) }).execute().await;

        assert!(outcome.is_completed());
        assert_eq!(outcome.output, Some(42));
        assert!(outcome.error.is_none());
        assert_eq!(outcome.row_index, 3);
        assert_eq!(outcome.repetition, 1);
    }

    #[tokio::test]
    async fn test_execute_error_becomes_failed_outcome() {
        let outcome = trial(|_: u32| async move { Err::<u32, _>(anyhow!("boom")) }).execute().await;

        assert!(outcome.is_failed());
        assert_eq!(outcome.error.as_deref(), Some("boom"));
        assert!(outcome.output.is_none());
    }

    #[tokio::test]
    async fn test_execute_keeps_error_context() {
        let outcome = trial(|_: u32| async move {
            Err::<u32, _>(anyhow!("connection reset")).map_err(|e| e.context("calling model"))
        })
        .execute()
        .await;

        assert_eq!(
            outcome.error.as_deref(),
            Some("calling model: connection reset")
        );
    }

    #[tokio::test]
    async fn test_execute_sees_experiment_id() {
        let outcome = Trial::new(
            Arc::new(()),
            0,
            0,
            Arc::new(|(): ()| async move {
                Ok::<_, anyhow::Error>(
                    crate::context::current_experiment_id().map(|id| id.to_string()),
                )
            }),
            "exp-ctx",
        )
        .execute()
        .await;

        assert_eq!(outcome.output, Some(Some("exp-ctx".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_panic_keeps_timing() {
        let outcome = trial(|x: u32| async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            assert!(x == 0, "bad row {x}");
            Ok::<_, anyhow::Error>(x)
        })
        .execute()
        .await;

        assert!(outcome.is_failed());
        assert_eq!(outcome.error.as_deref(), Some("trial panicked: bad row 21"));
        assert!(outcome.duration >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_execute_stops_user_function() {
        let finished = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        let slow = trial(move |x: u32| {
            let flag = Arc::clone(&flag);
            async move {
                tokio::time::sleep(Duration::from_secs(10)).await;
                flag.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok::<_, anyhow::Error>(x)
            }
        });

        let cut_short = tokio::time::timeout(Duration::from_secs(1), slow.execute()).await;
        assert!(cut_short.is_err());
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert!(!finished.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_timeout() {
        let outcome = trial(|x: u32| async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, anyhow::Error>(x)
        })
        .with_timeout(Some(Duration::from_secs(1)))
        .execute()
        .await;

        assert!(outcome.is_failed());
        assert!(outcome.error.unwrap().contains("timed out"));
    }
}
