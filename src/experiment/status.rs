//! Experiment status - lifecycle of a single experiment run

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status of an experiment run.
///
/// Transitions: `Pending -> Running` at launch, then `Running -> Completed`
/// when every trial completed, or `Running -> Failed` when any trial failed
/// or orchestration aborted the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentStatus {
    /// Experiment is created but not yet started.
    #[default]
    Pending,
    /// Experiment is currently executing trials.
    Running,
    /// Every trial completed.
    Completed,
    /// At least one trial failed, or the run was aborted.
    Failed,
}

impl ExperimentStatus {
    /// Whether the run has reached a final state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Lowercase wire name, as sent to the registry.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
