//! Error types for evalrun
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)
//!
//! Trial-level failures are never represented here: they are captured as
//! data in [`TrialOutcome`](crate::experiment::TrialOutcome). This enum only
//! covers orchestration failures that abort a whole run.

use std::time::Duration;

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// evalrun error types
#[derive(Error, Debug)]
pub enum Error {
    /// Caller-supplied configuration violates an input constraint
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Named dataset could not be resolved by the dataset provider
    #[error("Dataset not found: {0}")]
    DatasetNotFound(String),

    /// Dataset resolved but contains no rows
    #[error("Dataset is empty: {0}\nAn experiment needs at least one row to run")]
    EmptyDataset(String),

    /// A provider row could not be decoded into the experiment's input type
    #[error("Dataset row {index} could not be decoded: {source}")]
    RowDecode {
        /// Position of the row in the resolved dataset
        index: usize,
        /// Underlying decode error
        #[source]
        source: serde_json::Error,
    },

    /// Experiment registry collaborator failure
    #[error("Registry error: {0}")]
    Registry(String),

    /// Trace writes were still in flight when the flush deadline passed
    #[error("Trace flush timed out after {timeout:?} for experiment {experiment_id}")]
    FlushTimeout {
        /// Experiment whose traces were being flushed
        experiment_id: String,
        /// Deadline that elapsed
        timeout: Duration,
    },

    /// A run could not be completed at all
    #[error("Experiment {name} failed: {source}")]
    ExperimentFailed {
        /// Experiment name
        name: String,
        /// Orchestration error that aborted the run
        #[source]
        source: Box<Error>,
    },

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wrap an orchestration error so that it identifies the failed run.
    #[must_use]
    pub fn experiment_failed(name: impl Into<String>, source: Self) -> Self {
        Self::ExperimentFailed {
            name: name.into(),
            source: Box::new(source),
        }
    }
}
