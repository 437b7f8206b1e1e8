//! Sentiment Evaluation Example
//!
//! Runs a stub sentiment classifier over a small labelled collection,
//! three times per row with four workers, and prints the aggregated
//! result and per-metric trace stats.
//!
//! Run with: RUST_LOG=evalrun=debug cargo run --example sentiment_eval

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use evalrun::experiment::{
    success_rate_evaluator, Experiment, ExperimentOptions, TestCase, TestCaseCollection,
    TraceStats,
};
use evalrun::registry::MemoryRegistry;
use evalrun::telemetry;
use serde::Deserialize;
use serde_json::{json, Map};

#[derive(Debug, Clone, Deserialize)]
struct Review {
    text: String,
    target: String,
}

fn reviews() -> TestCaseCollection {
    let labelled = [
        ("The battery lasts all week, love it", "positive"),
        ("Screen cracked on day two", "negative"),
        ("Does what it says, nothing more", "neutral"),
        ("Best purchase this year", "positive"),
        ("Support never answered my emails", "negative"),
        ("", "neutral"),
    ];

    let mut test_cases = BTreeMap::new();
    for (i, (text, label)) in labelled.into_iter().enumerate() {
        let id = i as i64 + 1;
        let mut inputs = Map::new();
        inputs.insert("text".to_string(), json!(text));
        test_cases.insert(
            id,
            TestCase {
                id,
                test_case_collection_id: 1,
                inputs,
                target: Some(label.to_string()),
                tags: vec!["reviews".to_string()],
            },
        );
    }

    TestCaseCollection {
        id: 1,
        name: "product-reviews".to_string(),
        created_at: "2024-06-01T00:00:00Z".to_string(),
        last_updated_at: "2024-06-01T00:00:00Z".to_string(),
        column_names: vec!["text".to_string()],
        test_cases,
    }
}

fn classify(text: &str) -> &'static str {
    let text = text.to_lowercase();
    if ["love", "best", "great"].iter().any(|w| text.contains(w)) {
        "positive"
    } else if ["cracked", "never", "broken"].iter().any(|w| text.contains(w)) {
        "negative"
    } else {
        "neutral"
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_logging();

    println!("=== evalrun Sentiment Evaluation ===\n");

    let registry = Arc::new(MemoryRegistry::new());
    registry.add_collection(reviews());

    let tracer = Arc::clone(&registry);
    let classifier = move |review: Review| {
        let tracer = Arc::clone(&tracer);
        async move {
            if review.text.is_empty() {
                bail!("empty review text");
            }
            // Simulated model latency
            tokio::time::sleep(Duration::from_millis(20)).await;
            let label = classify(&review.text);
            tracer.log_trace_in_background(
                TraceStats::new(format!("review-{}", review.text.len()))
                    .with_score("exact_match", f64::from(u8::from(label == review.target)))
                    .with_latency(0.02)
                    .with_tokens(review.text.split_whitespace().count() as f64, 1.0),
            );
            Ok(label.to_string())
        }
    };

    let options = ExperimentOptions::from_env()
        .with_n_trials(3)
        .with_n_workers(4)
        .with_metadata("model", "keyword-baseline");

    let mut experiment = Experiment::new("sentiment", "product-reviews", classifier, Arc::clone(&registry))
        .with_options(options)
        .with_dataset_evaluator(success_rate_evaluator("pass_rate"));

    let result = experiment.run(None).await?;

    println!("Run:          {}", result.run_name());
    println!("Experiment:   {}", result.experiment_id());
    println!("State:        {}", experiment.state());
    println!("Trials:       {}", result.outcomes().len());
    println!("Success rate: {:.1}%", result.success_rate() * 100.0);

    if let Some(stats) = result.stats() {
        println!("\nTrace stats (mean ± std):");
        for (stat, (mean, std_dev)) in stats.avg_std() {
            println!("  {stat:<14} {mean:>8.3} ± {std_dev:.3}");
        }
    }

    let errors = result.errors_string();
    if !errors.is_empty() {
        println!("\nErrors:\n{errors}");
    }

    Ok(())
}
