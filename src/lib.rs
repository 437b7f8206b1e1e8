//! # evalrun: Concurrent Experiment Engine for LLM Evaluation
//!
//! **Version**: 0.1.0
//!
//! evalrun runs an async function under evaluation over every row of a
//! dataset, bounds how many executions are in flight, isolates per-row
//! failures, threads the experiment id through each execution for trace
//! correlation, and reduces the results into experiment-level statistics.
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Jidoka**: A failing row stops itself, not the line (fail-open trials)
//! - **Heijunka**: A fixed pool of workers levels the load on model APIs
//! - **Poka-Yoke**: Task-scoped correlation ids cannot leak between experiments
//! - **Genchi Genbutsu**: Explicit trace flush instead of a guessed sleep
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use evalrun::experiment::{DataRow, Experiment, ExperimentOptions};
//! use evalrun::registry::MemoryRegistry;
//!
//! # async fn example() -> evalrun::Result<()> {
//! evalrun::telemetry::init_logging();
//!
//! let registry = Arc::new(MemoryRegistry::new());
//! let rows = vec![DataRow::new().with("question", "What is Rust?")];
//! let answer = |row: DataRow| async move {
//!     Ok::<_, anyhow::Error>(format!("answered {:?}", row.get_str("question")))
//! };
//!
//! let mut experiment = Experiment::new("qa-baseline", rows, answer, registry)
//!     .with_options(ExperimentOptions::from_env().with_n_workers(4));
//! let result = experiment.run(None).await?;
//! println!("success rate: {:.2}", result.success_rate());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod context;
pub mod error;
pub mod experiment;
pub mod registry;
pub mod telemetry;

pub use error::{Error, Result};
