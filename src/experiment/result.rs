//! Result Aggregator - experiment-level summary of trial outcomes

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::stats::ExperimentStats;
use super::status::ExperimentStatus;
use super::trial::TrialOutcome;

/// Fraction of completed outcomes, `0.0` for an empty batch.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn success_rate<O>(outcomes: &[TrialOutcome<O>]) -> f64 {
    if outcomes.is_empty() {
        return 0.0;
    }
    let completed = outcomes.iter().filter(|o| o.is_completed()).count();
    completed as f64 / outcomes.len() as f64
}

/// Newline-joined, order-preserving error messages of failed outcomes.
///
/// Empty messages are skipped; returns an empty string when nothing failed.
#[must_use]
pub fn errors_string<O>(outcomes: &[TrialOutcome<O>]) -> String {
    outcomes
        .iter()
        .filter(|o| o.is_failed())
        .filter_map(|o| o.error.as_deref())
        .filter(|e| !e.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// `Completed` if every outcome completed, otherwise `Failed`.
#[must_use]
pub fn determine_status<O>(outcomes: &[TrialOutcome<O>]) -> ExperimentStatus {
    if outcomes.iter().all(TrialOutcome::is_completed) {
        ExperimentStatus::Completed
    } else {
        ExperimentStatus::Failed
    }
}

/// Result of one experiment run.
///
/// `outcomes` has exactly one entry per submitted trial, in submission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResult<O> {
    name: String,
    run_name: String,
    experiment_id: String,
    outcomes: Vec<TrialOutcome<O>>,
    metadata: BTreeMap<String, String>,
    stats: Option<ExperimentStats>,
}

impl<O> ExperimentResult<O> {
    /// Create a result without trace stats.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        run_name: impl Into<String>,
        experiment_id: impl Into<String>,
        outcomes: Vec<TrialOutcome<O>>,
        metadata: BTreeMap<String, String>,
    ) -> Self {
        Self {
            name: name.into(),
            run_name: run_name.into(),
            experiment_id: experiment_id.into(),
            outcomes,
            metadata,
            stats: None,
        }
    }

    /// Attach the trace stats reported at finalization.
    #[must_use]
    pub fn with_stats(mut self, stats: Option<ExperimentStats>) -> Self {
        self.stats = stats;
        self
    }

    /// Experiment name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run name.
    #[must_use]
    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    /// Experiment id assigned by the registry.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Per-trial outcomes in submission order.
    #[must_use]
    pub fn outcomes(&self) -> &[TrialOutcome<O>] {
        &self.outcomes
    }

    /// Consume the result, keeping only the outcomes.
    #[must_use]
    pub fn into_outcomes(self) -> Vec<TrialOutcome<O>> {
        self.outcomes
    }

    /// Run metadata.
    #[must_use]
    pub const fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Trace stats, if finalization succeeded.
    #[must_use]
    pub const fn stats(&self) -> Option<&ExperimentStats> {
        self.stats.as_ref()
    }

    /// Fraction of completed trials.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        success_rate(&self.outcomes)
    }

    /// Newline-joined errors of failed trials.
    #[must_use]
    pub fn errors_string(&self) -> String {
        errors_string(&self.outcomes)
    }

    /// Status implied by the outcomes.
    #[must_use]
    pub fn status(&self) -> ExperimentStatus {
        determine_status(&self.outcomes)
    }
}
