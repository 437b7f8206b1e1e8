//! Correlation context: the experiment id visible to code running a trial.
//!
//! The id lives in tokio task-local storage, so it is scoped to the task
//! (and everything awaited inside it) rather than to the process. Two
//! experiments running concurrently in one runtime each observe their own id.
//!
//! Task-locals are not inherited by `tokio::spawn`. Code that fans out work
//! from inside a trial should use [`spawn`] to carry the id along.
//!
//! ```rust
//! use evalrun::context;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let seen = context::run_in_context("exp-42", async {
//!     context::current_experiment_id()
//! })
//! .await;
//! assert_eq!(seen.as_deref(), Some("exp-42"));
//! assert!(context::current_experiment_id().is_none());
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;

tokio::task_local! {
    static EXPERIMENT_ID: Arc<str>;
}

/// Run `fut` with `experiment_id` as the current experiment id.
///
/// Nested calls shadow the outer id for the duration of the inner future.
pub async fn run_in_context<F>(experiment_id: impl Into<Arc<str>>, fut: F) -> F::Output
where
    F: Future,
{
    EXPERIMENT_ID.scope(experiment_id.into(), fut).await
}

/// Synchronous counterpart of [`run_in_context`] for blocking code.
pub fn run_in_context_sync<R>(experiment_id: impl Into<Arc<str>>, f: impl FnOnce() -> R) -> R {
    EXPERIMENT_ID.sync_scope(experiment_id.into(), f)
}

/// The experiment id of the enclosing context, if any.
#[must_use]
pub fn current_experiment_id() -> Option<Arc<str>> {
    EXPERIMENT_ID.try_with(Arc::clone).ok()
}

/// Spawn `fut` on the runtime, carrying the caller's experiment id into it.
pub fn spawn<F>(fut: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    match current_experiment_id() {
        Some(id) => tokio::spawn(EXPERIMENT_ID.scope(id, fut)),
        None => tokio::spawn(fut),
    }
}
