//! Stats Aggregator - per-metric reductions over trace stats records
//!
//! After an experiment finishes, the registry reports one [`TraceStats`]
//! record per traced execution. Records may report only some metrics; a
//! metric missing from a record does not count towards that metric's
//! denominator. Empty inputs reduce to `0.0` rather than an error.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Stat names reported for the numeric trace fields.
pub const TRACE_FIELD_NAMES: [&str; 5] = [
    "latency",
    "input_tokens",
    "output_tokens",
    "total_tokens",
    "cost",
];

/// Prefix of score keys in [`ExperimentStats::summary`].
pub const SCORE_KEY_PREFIX: &str = "score:";

/// A named score produced by an evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationScore {
    /// Metric name.
    pub name: String,
    /// Numeric score.
    pub score: f64,
    /// Optional explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl EvaluationScore {
    /// Create a score without a reason.
    #[must_use]
    pub fn new(name: impl Into<String>, score: f64) -> Self {
        Self {
            name: name.into(),
            score,
            reason: None,
        }
    }

    /// Attach a reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Stats for one traced execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceStats {
    /// Trace id.
    pub trace_id: String,
    /// Latency in seconds.
    #[serde(default)]
    pub latency: Option<f64>,
    /// Prompt tokens.
    #[serde(default)]
    pub input_tokens: Option<f64>,
    /// Completion tokens.
    #[serde(default)]
    pub output_tokens: Option<f64>,
    /// Prompt plus completion tokens.
    #[serde(default)]
    pub total_tokens: Option<f64>,
    /// Cost in USD.
    #[serde(default)]
    pub cost: Option<f64>,
    /// Evaluation scores attached to the trace.
    #[serde(default)]
    pub scores: Option<Vec<EvaluationScore>>,
}

impl TraceStats {
    /// Create an empty record for `trace_id`.
    #[must_use]
    pub fn new(trace_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            ..Self::default()
        }
    }

    /// Add a score.
    #[must_use]
    pub fn with_score(mut self, name: impl Into<String>, score: f64) -> Self {
        self.scores
            .get_or_insert_with(Vec::new)
            .push(EvaluationScore::new(name, score));
        self
    }

    /// Set the latency.
    #[must_use]
    pub const fn with_latency(mut self, latency: f64) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Set the cost.
    #[must_use]
    pub const fn with_cost(mut self, cost: f64) -> Self {
        self.cost = Some(cost);
        self
    }

    /// Set token counts; the total is derived.
    #[must_use]
    pub fn with_tokens(mut self, input_tokens: f64, output_tokens: f64) -> Self {
        self.input_tokens = Some(input_tokens);
        self.output_tokens = Some(output_tokens);
        self.total_tokens = Some(input_tokens + output_tokens);
        self
    }

    fn scores(&self) -> impl Iterator<Item = &EvaluationScore> {
        self.scores.iter().flatten()
    }

    fn trace_fields(&self) -> [(&'static str, Option<f64>); 5] {
        [
            (TRACE_FIELD_NAMES[0], self.latency),
            (TRACE_FIELD_NAMES[1], self.input_tokens),
            (TRACE_FIELD_NAMES[2], self.output_tokens),
            (TRACE_FIELD_NAMES[3], self.total_tokens),
            (TRACE_FIELD_NAMES[4], self.cost),
        ]
    }
}

/// Running count, mean and sum of squared deviations of one stat.
///
/// Updated with Welford's method so the variance of large values with a
/// small spread (nanosecond latencies, token totals) does not cancel out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatSummary {
    /// Number of observations.
    pub count: usize,
    mean: f64,
    m2: f64,
}

impl StatSummary {
    /// Add one observation.
    #[allow(clippy::cast_precision_loss)]
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// Fold `other` into `self` (Chan et al. pairwise update).
    #[allow(clippy::cast_precision_loss)]
    pub fn merge(&mut self, other: &Self) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }
        let (n_a, n_b) = (self.count as f64, other.count as f64);
        let n = n_a + n_b;
        let delta = other.mean - self.mean;
        self.mean += delta * n_b / n;
        self.m2 += other.m2 + delta * delta * n_a * n_b / n;
        self.count += other.count;
    }

    /// Sum of observations.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn sum(&self) -> f64 {
        self.mean * self.count as f64
    }

    /// Arithmetic mean, `0.0` when empty.
    #[must_use]
    pub const fn mean(&self) -> f64 {
        self.mean
    }

    /// Population variance, `0.0` when empty.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.m2 / self.count as f64
        }
    }

    /// Population standard deviation.
    #[must_use]
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}

impl FromIterator<f64> for StatSummary {
    fn from_iter<T: IntoIterator<Item = f64>>(iter: T) -> Self {
        let mut summary = Self::default();
        for value in iter {
            summary.push(value);
        }
        summary
    }
}

/// Trace stats reported by the registry when an experiment finishes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentStats {
    /// One record per traced execution under the experiment.
    pub parent_trace_stats: Vec<TraceStats>,
}

impl ExperimentStats {
    /// Wrap a list of trace records.
    #[must_use]
    pub const fn new(parent_trace_stats: Vec<TraceStats>) -> Self {
        Self { parent_trace_stats }
    }

    /// Mean of each score over the records that reported it.
    #[must_use]
    pub fn avg_scores(&self) -> BTreeMap<String, f64> {
        self.score_summaries()
            .into_iter()
            .map(|(name, summary)| (name, summary.mean()))
            .collect()
    }

    /// Mean of one score, `0.0` if no record reported it.
    #[must_use]
    pub fn avg_score(&self, name: &str) -> f64 {
        self.parent_trace_stats
            .iter()
            .flat_map(TraceStats::scores)
            .filter(|s| s.name == name)
            .map(|s| s.score)
            .collect::<StatSummary>()
            .mean()
    }

    /// Mean over every (record, score) pair, `0.0` when there are none.
    #[must_use]
    pub fn cumulative_avg_score(&self) -> f64 {
        self.parent_trace_stats
            .iter()
            .flat_map(TraceStats::scores)
            .map(|s| s.score)
            .collect::<StatSummary>()
            .mean()
    }

    /// Summary of every numeric trace field and score.
    ///
    /// Trace fields are keyed by field name and scores by
    /// `score:<name>` ([`SCORE_KEY_PREFIX`]), so a score named like a trace
    /// field stays separate.
    #[must_use]
    pub fn summary(&self) -> BTreeMap<String, StatSummary> {
        let mut summaries: BTreeMap<String, StatSummary> = BTreeMap::new();
        for record in &self.parent_trace_stats {
            for (name, value) in record.trace_fields() {
                if let Some(value) = value {
                    summaries.entry(name.to_string()).or_default().push(value);
                }
            }
        }
        for (name, summary) in self.score_summaries() {
            summaries
                .entry(format!("{SCORE_KEY_PREFIX}{name}"))
                .or_default()
                .merge(&summary);
        }
        summaries
    }

    /// `name -> (mean, std_dev)` rendered for reports.
    #[must_use]
    pub fn avg_std(&self) -> BTreeMap<String, (f64, f64)> {
        self.summary()
            .into_iter()
            .map(|(name, s)| (name, (s.mean(), s.std_dev())))
            .collect()
    }

    fn score_summaries(&self) -> BTreeMap<String, StatSummary> {
        let mut summaries: BTreeMap<String, StatSummary> = BTreeMap::new();
        for score in self.parent_trace_stats.iter().flat_map(TraceStats::scores) {
            summaries.entry(score.name.clone()).or_default().push(score.score);
        }
        summaries
    }
}
