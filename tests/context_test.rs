//! Correlation context tests: concurrent experiments never see each other's id

use std::sync::Arc;
use std::time::Duration;

use evalrun::context;
use evalrun::experiment::{ExperimentRunner, Trial, TrialFn};

fn id_probe() -> Arc<dyn TrialFn<usize, Option<String>>> {
    Arc::new(|row: usize| async move {
        // Interleave with the other experiment before and after a nested await
        tokio::time::sleep(Duration::from_millis((row % 3) as u64)).await;
        let before = context::current_experiment_id();
        let nested = async {
            tokio::task::yield_now().await;
            context::current_experiment_id()
        }
        .await;
        let spawned = context::spawn(async { context::current_experiment_id() })
            .await
            .ok()
            .flatten();
        if before != nested || before != spawned {
            anyhow::bail!("context changed within a trial");
        }
        Ok(before.map(|id| id.to_string()))
    })
}

fn trials(experiment_id: &str, n: usize) -> Vec<Trial<usize, Option<String>>> {
    let func = id_probe();
    (0..n)
        .map(|i| Trial::new(Arc::new(i), i, 0, Arc::clone(&func), experiment_id))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_experiments_do_not_alias() {
    let runner = ExperimentRunner::new(4).unwrap();

    let (a, b) = tokio::join!(
        runner.run_trials(trials("exp-a", 30)),
        runner.run_trials(trials("exp-b", 30)),
    );

    assert!(a.iter().all(|o| o.output == Some(Some("exp-a".to_string()))));
    assert!(b.iter().all(|o| o.output == Some(Some("exp-b".to_string()))));
}

#[tokio::test]
async fn test_concurrent_experiments_on_spawned_tasks() {
    let handles: Vec<_> = ["exp-x", "exp-y", "exp-z"]
        .into_iter()
        .map(|id| {
            tokio::spawn(async move {
                let runner = ExperimentRunner::new(2).unwrap();
                (id, runner.run_trials(trials(id, 10)).await)
            })
        })
        .collect();

    for handle in handles {
        let (id, outcomes) = handle.await.unwrap();
        assert_eq!(outcomes.len(), 10);
        for outcome in outcomes {
            assert_eq!(outcome.output, Some(Some(id.to_string())));
        }
    }
}

#[tokio::test]
async fn test_outer_scope_does_not_leak_into_trials() {
    let outcomes = context::run_in_context("outer", async {
        ExperimentRunner::new(2)
            .unwrap()
            .run_trials(trials("inner", 4))
            .await
    })
    .await;

    assert!(outcomes
        .iter()
        .all(|o| o.output == Some(Some("inner".to_string()))));
    assert!(context::current_experiment_id().is_none());
}
