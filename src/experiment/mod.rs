//! Experiment execution engine
//!
//! This module runs a user-supplied async function over every row of a
//! dataset (optionally several times per row), with a bound on concurrent
//! executions, and aggregates the per-trial outcomes.
//!
//! ## Components
//!
//! ```text
//! Experiment ──builds──> Trial (row × repetition) ──runs in──> ExperimentRunner
//!     │                                                              │
//!     │                              ordered Vec<TrialOutcome> <─────┘
//!     ├──> ExperimentResult (success rate, error report)
//!     └──> ExperimentStats  (per-metric means from the registry's traces)
//! ```
//!
//! Every trial runs inside the experiment's correlation context (see
//! [`crate::context`]), so tracing code reached from the user function can
//! attribute its records to the right experiment.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use evalrun::experiment::{ExperimentRunner, Trial, TrialFn};
//!
//! # async fn example() -> evalrun::Result<()> {
//! let double: Arc<dyn TrialFn<u32, u32>> =
//!     Arc::new(|x: u32| async move { Ok::<_, anyhow::Error>(x * 2) });
//! let trials = (0..4)
//!     .map(|i| Trial::new(Arc::new(i), i as usize, 0, Arc::clone(&double), "exp-001"))
//!     .collect();
//!
//! let outcomes = ExperimentRunner::new(2)?.run_trials(trials).await;
//! let values: Vec<u32> = outcomes.into_iter().filter_map(|o| o.output).collect();
//! assert_eq!(values, vec![0, 2, 4, 6]);
//! # Ok(())
//! # }
//! ```

mod dataset;
mod evaluator;
mod experiment_record;
mod naming;
mod options;
pub mod result;
mod run;
mod runner;
mod stats;
mod status;
mod trial;

pub use dataset::{DataRow, Dataset, TestCase, TestCaseCollection};
pub use evaluator::{success_rate_evaluator, DatasetEvaluator};
pub use experiment_record::{CreateExperimentRequest, ExperimentRecord, ExperimentRecordBuilder};
pub use naming::random_run_name;
pub use options::{ExperimentOptions, FailurePolicy, DEFAULT_FLUSH_TIMEOUT, DEFAULT_N_WORKERS};
pub use result::ExperimentResult;
pub use run::Experiment;
pub use runner::{ExperimentRunner, SKIPPED_AFTER_FAILURE};
pub use stats::{
    EvaluationScore, ExperimentStats, StatSummary, TraceStats, SCORE_KEY_PREFIX, TRACE_FIELD_NAMES,
};
pub use status::ExperimentStatus;
pub use trial::{Trial, TrialFn, TrialFuture, TrialOutcome, TrialState};
