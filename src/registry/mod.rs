//! Collaborator contracts: the experiment registry and the dataset provider
//!
//! The engine never talks to the network itself. It creates and finishes
//! experiments through an [`ExperimentRegistry`] and resolves named datasets
//! through a [`DatasetProvider`]. [`MemoryRegistry`] implements both in
//! process for tests and local runs.
//!
//! # Example
//!
//! ```rust
//! use evalrun::experiment::{CreateExperimentRequest, ExperimentStatus};
//! use evalrun::registry::{ExperimentRegistry, FinishExperimentRequest, MemoryRegistry};
//!
//! # async fn example() -> evalrun::Result<()> {
//! let registry = MemoryRegistry::new();
//! let record = registry
//!     .create_experiment(CreateExperimentRequest::new("qa", "run-1"))
//!     .await?;
//! let stats = registry
//!     .finish_experiment(record.uuid(), FinishExperimentRequest::new(ExperimentStatus::Completed))
//!     .await?;
//! assert!(stats.parent_trace_stats.is_empty());
//! # Ok(())
//! # }
//! ```

mod memory;

pub use memory::MemoryRegistry;

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::experiment::{
    CreateExperimentRequest, EvaluationScore, ExperimentRecord, ExperimentStats, ExperimentStatus,
    TestCaseCollection,
};
use crate::Result;

/// Payload sent when an experiment finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishExperimentRequest {
    /// Final status of the run.
    pub status: ExperimentStatus,
    /// Scores computed over the whole dataset.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dataset_level_stats: Vec<EvaluationScore>,
}

impl FinishExperimentRequest {
    /// Create a request with no dataset-level stats.
    #[must_use]
    pub const fn new(status: ExperimentStatus) -> Self {
        Self {
            status,
            dataset_level_stats: Vec::new(),
        }
    }

    /// Attach dataset-level stats.
    #[must_use]
    pub fn with_dataset_level_stats(mut self, stats: Vec<EvaluationScore>) -> Self {
        self.dataset_level_stats = stats;
        self
    }
}

/// Remote service that owns experiment records and collected traces.
pub trait ExperimentRegistry: Send + Sync {
    /// Register a new experiment run and return its record (with uuid).
    fn create_experiment(
        &self,
        request: CreateExperimentRequest,
    ) -> impl Future<Output = Result<ExperimentRecord>> + Send;

    /// Mark the run finished and return the trace stats collected for it.
    fn finish_experiment(
        &self,
        experiment_id: &str,
        request: FinishExperimentRequest,
    ) -> impl Future<Output = Result<ExperimentStats>> + Send;

    /// Wait until every in-flight trace write for `experiment_id` is
    /// recorded, or fail with `Error::FlushTimeout` after `timeout`.
    ///
    /// Registries that record traces synchronously need not override this.
    fn flush(
        &self,
        experiment_id: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<()>> + Send {
        let _ = (experiment_id, timeout);
        async { Ok(()) }
    }
}

/// Source of named test case collections.
pub trait DatasetProvider: Send + Sync {
    /// Look up a collection by name or id. `Ok(None)` means it does not exist.
    fn get_collection(
        &self,
        name_or_id: &str,
    ) -> impl Future<Output = Result<Option<TestCaseCollection>>> + Send;
}
