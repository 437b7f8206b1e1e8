//! Experiment - a named run of the user function over a dataset
//!
//! ## Lifecycle
//!
//! ```text
//! Pending ──run()──> Running ──all trials completed──> Completed
//!                       │
//!                       └──any trial failed / orchestration error──> Failed
//! ```
//!
//! `run()` registers the experiment, resolves the dataset, expands it into
//! `rows × n_trials` trials, runs them through the [`ExperimentRunner`]
//! inside the experiment's correlation context, then flushes traces and
//! finalizes the experiment with the registry.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::dataset::Dataset;
use super::evaluator::DatasetEvaluator;
use super::experiment_record::CreateExperimentRequest;
use super::naming::random_run_name;
use super::options::ExperimentOptions;
use super::result::{determine_status, ExperimentResult};
use super::runner::ExperimentRunner;
use super::stats::{EvaluationScore, ExperimentStats};
use super::status::ExperimentStatus;
use super::trial::{Trial, TrialFn, TrialOutcome};
use crate::context;
use crate::registry::{DatasetProvider, ExperimentRegistry, FinishExperimentRequest};
use crate::{Error, Result};

/// A named experiment over a dataset.
///
/// # Example
///
/// ```rust
/// use evalrun::experiment::{DataRow, Experiment, ExperimentOptions, ExperimentStatus};
/// use evalrun::registry::MemoryRegistry;
/// use std::sync::Arc;
///
/// # async fn example() -> evalrun::Result<()> {
/// let rows = vec![
///     DataRow::new().with("question", "2+2").with("target", "4"),
///     DataRow::new().with("question", "3+3").with("target", "6"),
/// ];
/// let answer = |row: DataRow| async move {
///     Ok::<_, anyhow::Error>(row.get_str("target").unwrap_or_default().to_string())
/// };
///
/// let mut experiment = Experiment::new("arithmetic", rows, answer, Arc::new(MemoryRegistry::new()))
///     .with_options(ExperimentOptions::default().with_n_trials(2));
/// let result = experiment.run(Some("smoke")).await?;
///
/// assert_eq!(result.outcomes().len(), 4);
/// assert_eq!(experiment.state(), ExperimentStatus::Completed);
/// # Ok(())
/// # }
/// ```
pub struct Experiment<I, O, C> {
    name: String,
    dataset: Dataset<I>,
    func: Arc<dyn TrialFn<I, O>>,
    client: Arc<C>,
    options: ExperimentOptions,
    evaluators: Vec<Box<dyn DatasetEvaluator<O>>>,
    state: ExperimentStatus,
    run_name: Option<String>,
}

impl<I, O, C> Experiment<I, O, C>
where
    I: DeserializeOwned + Clone + Send + Sync + 'static,
    O: Send + 'static,
    C: ExperimentRegistry + DatasetProvider,
{
    /// Create an experiment in `Pending` state with default options.
    pub fn new<F>(name: impl Into<String>, dataset: impl Into<Dataset<I>>, func: F, client: Arc<C>) -> Self
    where
        F: TrialFn<I, O>,
    {
        Self {
            name: name.into(),
            dataset: dataset.into(),
            func: Arc::new(func),
            client,
            options: ExperimentOptions::default(),
            evaluators: Vec::new(),
            state: ExperimentStatus::Pending,
            run_name: None,
        }
    }

    /// Replace the options.
    #[must_use]
    pub fn with_options(mut self, options: ExperimentOptions) -> Self {
        self.options = options;
        self
    }

    /// Add an evaluator run over all outcomes before finalization.
    #[must_use]
    pub fn with_dataset_evaluator(mut self, evaluator: impl DatasetEvaluator<O> + 'static) -> Self {
        self.evaluators.push(Box::new(evaluator));
        self
    }

    /// Experiment name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ExperimentStatus {
        self.state
    }

    /// Name of the latest run, once `run` has been called.
    #[must_use]
    pub fn run_name(&self) -> Option<&str> {
        self.run_name.as_deref()
    }

    /// Options in effect.
    #[must_use]
    pub const fn options(&self) -> &ExperimentOptions {
        &self.options
    }

    /// Run every trial and return the per-trial outcomes.
    ///
    /// Trial failures are part of the result. A random run name is used
    /// when `run_name` is `None`.
    ///
    /// # Errors
    ///
    /// Returns `Error::ExperimentFailed` (and leaves the state `Failed`) if
    /// the options are invalid, the experiment cannot be registered, or the
    /// dataset cannot be resolved or is empty.
    pub async fn run(&mut self, run_name: Option<&str>) -> Result<ExperimentResult<O>> {
        let run_name = run_name.map_or_else(random_run_name, str::to_string);
        self.run_name = Some(run_name.clone());
        self.state = ExperimentStatus::Running;

        if let Err(err) = self.options.validate() {
            self.state = ExperimentStatus::Failed;
            return Err(Error::experiment_failed(&self.name, err));
        }

        let request = CreateExperimentRequest::new(&self.name, &run_name)
            .with_metadata(self.options.metadata.clone());
        let record = match self.client.create_experiment(request).await {
            Ok(record) => record,
            Err(err) => {
                self.state = ExperimentStatus::Failed;
                return Err(Error::experiment_failed(&self.name, err));
            }
        };
        let experiment_id: Arc<str> = Arc::from(record.uuid());
        info!(experiment = %self.name, run = %run_name, %experiment_id, "experiment started");

        let executed = context::run_in_context(
            Arc::clone(&experiment_id),
            self.execute(Arc::clone(&experiment_id)),
        )
        .await;

        let status = match &executed {
            Ok(outcomes) => determine_status(outcomes),
            Err(_) => ExperimentStatus::Failed,
        };
        self.state = status;

        let dataset_level_stats = match &executed {
            Ok(outcomes) => self.evaluate_dataset(outcomes),
            Err(_) => Vec::new(),
        };
        let stats = self.finalize(&experiment_id, status, dataset_level_stats).await;

        match executed {
            Ok(outcomes) => {
                let result = ExperimentResult::new(
                    &self.name,
                    &run_name,
                    &*experiment_id,
                    outcomes,
                    self.options.metadata.clone(),
                )
                .with_stats(stats);
                self.report(&result);
                Ok(result)
            }
            Err(err) => {
                warn!(experiment = %self.name, run = %run_name, error = %err, "experiment aborted");
                Err(Error::experiment_failed(&self.name, err))
            }
        }
    }

    async fn execute(&self, experiment_id: Arc<str>) -> Result<Vec<TrialOutcome<O>>> {
        let rows = self.resolve_rows().await?;
        let runner = ExperimentRunner::new(self.options.n_workers)?
            .with_failure_policy(self.options.failure_policy);

        let mut trials = Vec::with_capacity(rows.len() * self.options.n_trials);
        for (row_index, row) in rows.into_iter().enumerate() {
            let row = Arc::new(row);
            for repetition in 0..self.options.n_trials {
                trials.push(
                    Trial::new(
                        Arc::clone(&row),
                        row_index,
                        repetition,
                        Arc::clone(&self.func),
                        Arc::clone(&experiment_id),
                    )
                    .with_timeout(self.options.trial_timeout),
                );
            }
        }

        debug!(trials = trials.len(), workers = runner.max_concurrency(), "running trials");
        Ok(runner.run_trials(trials).await)
    }

    async fn resolve_rows(&self) -> Result<Vec<I>> {
        let rows = match &self.dataset {
            Dataset::Rows(rows) => rows.clone(),
            Dataset::Collection(name) => {
                info!(collection = %name, "fetching test collection");
                let collection = self
                    .client
                    .get_collection(name)
                    .await?
                    .ok_or_else(|| Error::DatasetNotFound(name.clone()))?;
                let rows = collection
                    .inputs_and_targets()
                    .into_iter()
                    .enumerate()
                    .map(|(index, row)| {
                        serde_json::from_value(row.into_value())
                            .map_err(|source| Error::RowDecode { index, source })
                    })
                    .collect::<Result<Vec<I>>>()?;
                info!(collection = %name, test_cases = rows.len(), "fetched test collection");
                rows
            }
        };
        if rows.is_empty() {
            return Err(Error::EmptyDataset(self.dataset.label()));
        }
        Ok(rows)
    }

    fn evaluate_dataset(&self, outcomes: &[TrialOutcome<O>]) -> Vec<EvaluationScore> {
        self.evaluators
            .iter()
            .filter_map(|evaluator| evaluator.evaluate(outcomes))
            .collect()
    }

    async fn finalize(
        &self,
        experiment_id: &str,
        status: ExperimentStatus,
        dataset_level_stats: Vec<EvaluationScore>,
    ) -> Option<ExperimentStats> {
        if let Err(err) = self
            .client
            .flush(experiment_id, self.options.flush_timeout)
            .await
        {
            warn!(experiment_id, error = %err, "finalizing before all traces were flushed");
        }

        let request =
            FinishExperimentRequest::new(status).with_dataset_level_stats(dataset_level_stats);
        match self.client.finish_experiment(experiment_id, request).await {
            Ok(stats) => Some(stats),
            Err(err) => {
                warn!(experiment_id, error = %err, "could not finish experiment");
                None
            }
        }
    }

    fn report(&self, result: &ExperimentResult<O>) {
        if let Some(stats) = result.stats() {
            for (stat, (mean, std_dev)) in stats.avg_std() {
                info!(experiment = %self.name, run = %result.run_name(), %stat, mean, std_dev, "avg stat");
            }
        }
        info!(
            experiment = %self.name,
            run = %result.run_name(),
            status = %self.state,
            success_rate = %format!("{:.1}%", result.success_rate() * 100.0),
            "experiment finished"
        );
        let errors = result.errors_string();
        if !errors.is_empty() {
            warn!(experiment = %self.name, run = %result.run_name(), "errors:\n{errors}");
        }
    }
}
