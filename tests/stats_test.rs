//! Stats and result aggregation tests

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use evalrun::experiment::result::{errors_string, success_rate};
use evalrun::experiment::{
    ExperimentResult, ExperimentStats, ExperimentStatus, StatSummary, TraceStats, TrialOutcome,
};

const EPS: f64 = 1e-9;

fn completed(i: usize) -> TrialOutcome<&'static str> {
    TrialOutcome::completed(i, 0, "ok", Utc::now(), Duration::from_millis(3))
}

fn failed(i: usize, msg: &str) -> TrialOutcome<&'static str> {
    TrialOutcome::failed(i, 0, msg, Utc::now(), Duration::from_millis(3))
}

// =============================================================================
// Result Aggregator
// =============================================================================

#[test]
fn test_success_rate_two_of_three() {
    let outcomes = [completed(0), failed(1, "boom"), completed(2)];
    assert!((success_rate(&outcomes) - 2.0 / 3.0).abs() < EPS);
}

#[test]
fn test_success_rate_empty() {
    let outcomes: [TrialOutcome<&str>; 0] = [];
    assert!(success_rate(&outcomes).abs() < EPS);
}

#[test]
fn test_errors_string_joins_in_order() {
    let outcomes = [completed(0), failed(1, "boom"), failed(2, "bust")];
    assert_eq!(errors_string(&outcomes), "boom\nbust");
}

#[test]
fn test_errors_string_all_completed() {
    assert_eq!(errors_string(&[completed(0), completed(1)]), "");
}

#[test]
fn test_experiment_result_serializes() {
    let result = ExperimentResult::new(
        "qa",
        "run-7",
        "uuid-7",
        vec![completed(0), failed(1, "boom")],
        BTreeMap::new(),
    );

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["name"], "qa");
    assert_eq!(json["outcomes"][1]["state"], "failed");
    assert_eq!(json["outcomes"][1]["error"], "boom");
    assert_eq!(result.status(), ExperimentStatus::Failed);
}

// =============================================================================
// Stats Aggregator
// =============================================================================

#[test]
fn test_partial_metric_reporting() {
    let stats = ExperimentStats::new(vec![
        TraceStats::new("t1").with_score("a", 1.0).with_score("b", 2.0),
        TraceStats::new("t2").with_score("a", 3.0),
    ]);

    let avg = stats.avg_scores();
    assert_eq!(avg.len(), 2);
    assert!((avg["a"] - 2.0).abs() < EPS);
    assert!((avg["b"] - 2.0).abs() < EPS);
    assert!((stats.cumulative_avg_score() - 2.0).abs() < EPS);
}

#[test]
fn test_missing_metric_not_counted() {
    let stats = ExperimentStats::new(vec![
        TraceStats::new("t1").with_score("a", 4.0),
        TraceStats::new("t2"),
        TraceStats::new("t3"),
    ]);

    assert!((stats.avg_score("a") - 4.0).abs() < EPS);
    assert_eq!(stats.summary()["score:a"].count, 1);
}

#[test]
fn test_empty_stats_are_zero() {
    let stats = ExperimentStats::new(vec![]);
    assert!(stats.avg_scores().is_empty());
    assert!(stats.cumulative_avg_score().abs() < EPS);
    assert!(stats.summary().is_empty());
}

#[test]
fn test_avg_std_for_latency() {
    let stats = ExperimentStats::new(vec![
        TraceStats::new("t1").with_latency(1.0),
        TraceStats::new("t2").with_latency(3.0),
    ]);

    let (mean, std_dev) = stats.avg_std()["latency"];
    assert!((mean - 2.0).abs() < EPS);
    assert!((std_dev - 1.0).abs() < EPS);
}

#[test]
fn test_avg_std_for_nanosecond_latencies() {
    let stats = ExperimentStats::new(
        [1e9, 1e9 + 1.0, 1e9 + 2.0]
            .into_iter()
            .enumerate()
            .map(|(i, ns)| TraceStats::new(format!("t{i}")).with_latency(ns))
            .collect(),
    );

    let (mean, std_dev) = stats.avg_std()["latency"];
    assert!((mean - (1e9 + 1.0)).abs() < 1e-6);
    assert!((std_dev - (2.0f64 / 3.0).sqrt()).abs() < 1e-6);
}

#[test]
fn test_stat_summary_empty() {
    let summary = StatSummary::default();
    assert!(summary.mean().abs() < EPS);
    assert!(summary.variance().abs() < EPS);
    assert!(summary.std_dev().abs() < EPS);
}
