//! Dataset-level evaluators: scores computed over all outcomes of a run

use super::stats::EvaluationScore;
use super::trial::TrialOutcome;

/// Computes one score over the full outcome list of a run.
///
/// Returning `None` skips the score (e.g. nothing to evaluate).
pub trait DatasetEvaluator<O>: Send + Sync {
    /// Evaluate the outcomes of a finished run.
    fn evaluate(&self, outcomes: &[TrialOutcome<O>]) -> Option<EvaluationScore>;
}

impl<O, F> DatasetEvaluator<O> for F
where
    F: Fn(&[TrialOutcome<O>]) -> Option<EvaluationScore> + Send + Sync,
{
    fn evaluate(&self, outcomes: &[TrialOutcome<O>]) -> Option<EvaluationScore> {
        self(outcomes)
    }
}

/// Evaluator reporting the fraction of completed trials as `name`.
#[must_use]
pub fn success_rate_evaluator<O>(name: impl Into<String>) -> impl DatasetEvaluator<O> {
    let name = name.into();
    move |outcomes: &[TrialOutcome<O>]| {
        (!outcomes.is_empty())
            .then(|| EvaluationScore::new(name.clone(), super::result::success_rate(outcomes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    #[test]
    fn test_closure_evaluator() {
        let longest = |outcomes: &[TrialOutcome<String>]| {
            outcomes
                .iter()
                .filter_map(|o| o.output.as_ref())
                .map(String::len)
                .max()
                .map(|len| EvaluationScore::new("max_len", len as f64))
        };
        let outcomes = vec![
            TrialOutcome::completed(0, 0, "abc".to_string(), Utc::now(), Duration::ZERO),
            TrialOutcome::completed(1, 0, "abcdef".to_string(), Utc::now(), Duration::ZERO),
        ];

        let score = longest.evaluate(&outcomes).unwrap();
        assert_eq!(score.name, "max_len");
        assert!((score.score - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_success_rate_evaluator() {
        let evaluator = success_rate_evaluator::<()>("pass_rate");
        assert!(evaluator.evaluate(&[]).is_none());

        let outcomes = vec![
            TrialOutcome::completed(0, 0, (), Utc::now(), Duration::ZERO),
            TrialOutcome::failed(1, 0, "x", Utc::now(), Duration::ZERO),
        ];
        let score = evaluator.evaluate(&outcomes).unwrap();
        assert!((score.score - 0.5).abs() < f64::EPSILON);
    }
}
