//! Experiment configuration

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{Error, Result};

/// Default number of concurrently executing trials.
pub const DEFAULT_N_WORKERS: usize = 10;

/// Default bounded wait for trace writes before finalizing.
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// What the runner does after a trial fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep scheduling the remaining trials.
    #[default]
    FailOpen,
    /// Stop starting new trials once any trial has failed. Unstarted trials
    /// are reported as failed; in-flight trials run to completion.
    FailFast,
}

/// Options controlling how an experiment runs.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use evalrun::experiment::{ExperimentOptions, FailurePolicy};
///
/// let options = ExperimentOptions::default()
///     .with_n_trials(3)
///     .with_n_workers(4)
///     .with_trial_timeout(Duration::from_secs(30))
///     .with_failure_policy(FailurePolicy::FailFast);
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentOptions {
    /// Repetitions per dataset row.
    pub n_trials: usize,
    /// Maximum number of trials in flight at once.
    pub n_workers: usize,
    /// Metadata forwarded to the registry when the experiment is created.
    pub metadata: BTreeMap<String, String>,
    /// Per-trial timeout; `None` lets a trial run indefinitely.
    pub trial_timeout: Option<Duration>,
    /// Runner behaviour after a trial failure.
    pub failure_policy: FailurePolicy,
    /// Upper bound on the wait for trace writes before finalization.
    pub flush_timeout: Duration,
}

impl Default for ExperimentOptions {
    fn default() -> Self {
        Self {
            n_trials: 1,
            n_workers: DEFAULT_N_WORKERS,
            metadata: BTreeMap::new(),
            trial_timeout: None,
            failure_policy: FailurePolicy::FailOpen,
            flush_timeout: DEFAULT_FLUSH_TIMEOUT,
        }
    }
}

impl ExperimentOptions {
    /// Defaults overlaid with `EVALRUN_*` environment variables.
    ///
    /// Recognised: `EVALRUN_N_TRIALS`, `EVALRUN_N_WORKERS`,
    /// `EVALRUN_TRIAL_TIMEOUT_MS`, `EVALRUN_FLUSH_TIMEOUT_MS`,
    /// `EVALRUN_FAIL_FAST`. Unparsable values are logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Some(n) = env_var::<usize>("EVALRUN_N_TRIALS") {
            options.n_trials = n;
        }
        if let Some(n) = env_var::<usize>("EVALRUN_N_WORKERS") {
            options.n_workers = n;
        }
        if let Some(ms) = env_var::<u64>("EVALRUN_TRIAL_TIMEOUT_MS") {
            options.trial_timeout = Some(Duration::from_millis(ms));
        }
        if let Some(ms) = env_var::<u64>("EVALRUN_FLUSH_TIMEOUT_MS") {
            options.flush_timeout = Duration::from_millis(ms);
        }
        if let Some(true) = env_var::<bool>("EVALRUN_FAIL_FAST") {
            options.failure_policy = FailurePolicy::FailFast;
        }
        options
    }

    /// Set repetitions per row.
    #[must_use]
    pub const fn with_n_trials(mut self, n_trials: usize) -> Self {
        self.n_trials = n_trials;
        self
    }

    /// Set the concurrency bound.
    #[must_use]
    pub const fn with_n_workers(mut self, n_workers: usize) -> Self {
        self.n_workers = n_workers;
        self
    }

    /// Add a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Set the per-trial timeout.
    #[must_use]
    pub const fn with_trial_timeout(mut self, timeout: Duration) -> Self {
        self.trial_timeout = Some(timeout);
        self
    }

    /// Set the failure policy.
    #[must_use]
    pub const fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Set the flush timeout.
    #[must_use]
    pub const fn with_flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout = timeout;
        self
    }

    /// Check input constraints.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `n_trials` or `n_workers` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.n_trials == 0 {
            return Err(Error::InvalidInput("n_trials must be at least 1".to_string()));
        }
        if self.n_workers == 0 {
            return Err(Error::InvalidInput("n_workers must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn env_var<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(var = name, value = %raw, "ignoring unparsable environment override");
            None
        }
    }
}
