//! In-memory registry and dataset provider using `DashMap`.
//!
//! Data is lost on process restart. Useful for tests, demos and local
//! experiments that do not need the remote service.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Notify;
use tracing::{debug, warn};

use super::{DatasetProvider, ExperimentRegistry, FinishExperimentRequest};
use crate::context;
use crate::experiment::{
    CreateExperimentRequest, EvaluationScore, ExperimentRecord, ExperimentStats, ExperimentStatus,
    TestCaseCollection, TraceStats,
};
use crate::{Error, Result};

/// Registry state for one experiment run.
#[derive(Debug, Clone)]
struct ExperimentEntry {
    record: ExperimentRecord,
    status: ExperimentStatus,
    traces: Vec<TraceStats>,
    dataset_level_stats: Vec<EvaluationScore>,
    finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Inner {
    experiments: DashMap<String, ExperimentEntry>,
    collections: DashMap<String, TestCaseCollection>,
    pending_writes: DashMap<String, usize>,
    settled: Notify,
}

impl Inner {
    fn record_trace(&self, experiment_id: &str, stats: TraceStats) -> bool {
        match self.experiments.get_mut(experiment_id) {
            Some(mut entry) => {
                debug!(experiment_id, trace_id = %stats.trace_id, "trace recorded");
                entry.traces.push(stats);
                true
            }
            None => {
                warn!(experiment_id, "dropping trace for unknown experiment");
                false
            }
        }
    }

    fn pending(&self, experiment_id: &str) -> usize {
        self.pending_writes.get(experiment_id).map_or(0, |n| *n)
    }

    fn begin_write(&self, experiment_id: &str) {
        *self
            .pending_writes
            .entry(experiment_id.to_string())
            .or_insert(0) += 1;
    }

    fn end_write(&self, experiment_id: &str) {
        if let Some(mut n) = self.pending_writes.get_mut(experiment_id) {
            *n = n.saturating_sub(1);
        }
        // Checked under the shard lock, so a racing begin_write keeps its entry
        self.pending_writes.remove_if(experiment_id, |_, n| *n == 0);
        self.settled.notify_waiters();
    }
}

/// In-memory [`ExperimentRegistry`] and [`DatasetProvider`].
///
/// Cloning is cheap; clones share state.
///
/// # Example
///
/// ```rust
/// use evalrun::context;
/// use evalrun::experiment::{CreateExperimentRequest, TraceStats};
/// use evalrun::registry::{ExperimentRegistry, MemoryRegistry};
///
/// # async fn example() -> evalrun::Result<()> {
/// let registry = MemoryRegistry::new();
/// let record = registry.create_experiment(CreateExperimentRequest::new("qa", "run")).await?;
///
/// context::run_in_context(record.uuid(), async {
///     registry.log_trace(TraceStats::new("trace-1").with_score("accuracy", 1.0));
/// })
/// .await;
///
/// assert_eq!(registry.traces(record.uuid()).len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    inner: Arc<Inner>,
}

impl MemoryRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a collection, retrievable by name or id.
    pub fn add_collection(&self, collection: TestCaseCollection) {
        self.inner
            .collections
            .insert(collection.name.clone(), collection);
    }

    /// Number of experiments created.
    #[must_use]
    pub fn experiment_count(&self) -> usize {
        self.inner.experiments.len()
    }

    /// Get an experiment record by uuid.
    #[must_use]
    pub fn get_experiment(&self, experiment_id: &str) -> Option<ExperimentRecord> {
        self.inner
            .experiments
            .get(experiment_id)
            .map(|entry| entry.record.clone())
    }

    /// Last status reported for an experiment.
    #[must_use]
    pub fn status(&self, experiment_id: &str) -> Option<ExperimentStatus> {
        self.inner
            .experiments
            .get(experiment_id)
            .map(|entry| entry.status)
    }

    /// When the experiment was finished, if it was.
    #[must_use]
    pub fn finished_at(&self, experiment_id: &str) -> Option<DateTime<Utc>> {
        self.inner
            .experiments
            .get(experiment_id)
            .and_then(|entry| entry.finished_at)
    }

    /// Traces recorded for an experiment, in arrival order.
    #[must_use]
    pub fn traces(&self, experiment_id: &str) -> Vec<TraceStats> {
        self.inner
            .experiments
            .get(experiment_id)
            .map(|entry| entry.traces.clone())
            .unwrap_or_default()
    }

    /// Dataset-level stats sent when the experiment finished.
    #[must_use]
    pub fn dataset_level_stats(&self, experiment_id: &str) -> Vec<EvaluationScore> {
        self.inner
            .experiments
            .get(experiment_id)
            .map(|entry| entry.dataset_level_stats.clone())
            .unwrap_or_default()
    }

    /// Record `stats` against the experiment of the current correlation
    /// context.
    ///
    /// Returns `false` (and drops the trace) when no context is active or
    /// the experiment is unknown.
    pub fn log_trace(&self, stats: TraceStats) -> bool {
        match context::current_experiment_id() {
            Some(id) => self.inner.record_trace(&id, stats),
            None => {
                warn!(trace_id = %stats.trace_id, "no experiment in context, dropping trace");
                false
            }
        }
    }

    /// Like [`log_trace`](Self::log_trace), but the write completes on a
    /// background task. [`flush`](ExperimentRegistry::flush) waits for it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn log_trace_in_background(&self, stats: TraceStats) -> bool {
        let Some(id) = context::current_experiment_id() else {
            warn!(trace_id = %stats.trace_id, "no experiment in context, dropping trace");
            return false;
        };
        self.inner.begin_write(&id);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            inner.record_trace(&id, stats);
            inner.end_write(&id);
        });
        true
    }

    /// Number of background trace writes not yet recorded.
    #[must_use]
    pub fn pending_writes(&self, experiment_id: &str) -> usize {
        self.inner.pending(experiment_id)
    }
}

impl ExperimentRegistry for MemoryRegistry {
    async fn create_experiment(&self, request: CreateExperimentRequest) -> Result<ExperimentRecord> {
        let uuid = format!("{:032x}", rand::random::<u128>());
        let record = ExperimentRecord::new(uuid.clone(), request);
        self.inner.experiments.insert(
            uuid,
            ExperimentEntry {
                record: record.clone(),
                status: ExperimentStatus::Running,
                traces: Vec::new(),
                dataset_level_stats: Vec::new(),
                finished_at: None,
            },
        );
        Ok(record)
    }

    async fn finish_experiment(
        &self,
        experiment_id: &str,
        request: FinishExperimentRequest,
    ) -> Result<ExperimentStats> {
        let mut entry = self
            .inner
            .experiments
            .get_mut(experiment_id)
            .ok_or_else(|| Error::Registry(format!("unknown experiment {experiment_id}")))?;
        entry.status = request.status;
        entry.dataset_level_stats = request.dataset_level_stats;
        entry.finished_at = Some(Utc::now());
        Ok(ExperimentStats::new(entry.traces.clone()))
    }

    async fn flush(&self, experiment_id: &str, timeout: Duration) -> Result<()> {
        let settle = async {
            loop {
                // Register before checking so a concurrent end_write is not missed
                let settled = self.inner.settled.notified();
                if self.inner.pending(experiment_id) == 0 {
                    return;
                }
                settled.await;
            }
        };
        tokio::time::timeout(timeout, settle)
            .await
            .map_err(|_| Error::FlushTimeout {
                experiment_id: experiment_id.to_string(),
                timeout,
            })
    }
}

impl DatasetProvider for MemoryRegistry {
    async fn get_collection(&self, name_or_id: &str) -> Result<Option<TestCaseCollection>> {
        if let Some(collection) = self.inner.collections.get(name_or_id) {
            return Ok(Some(collection.clone()));
        }
        Ok(self
            .inner
            .collections
            .iter()
            .find(|entry| entry.id.to_string() == name_or_id)
            .map(|entry| entry.value().clone()))
    }
}
