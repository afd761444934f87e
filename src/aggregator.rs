//! Score aggregation
//!
//! Combines the three sub-scores of a [`SignalSample`] into one weighted raw
//! score. Aggregation is pure and never fails: a missing or unusable sub-score
//! counts as 0.0.

use crate::config::SignalWeights;
use crate::types::{SignalKind, SignalSample};

/// Reason reported when no sub-signal contributed
pub const NO_INDICATORS: &str = "No productivity indicators detected";

/// Weighted combination of sub-scores
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreAggregator {
    weights: SignalWeights,
}

impl Default for ScoreAggregator {
    fn default() -> Self {
        Self::new(SignalWeights::default())
    }
}

impl ScoreAggregator {
    pub fn new(weights: SignalWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> SignalWeights {
        self.weights
    }

    /// Weighted raw score, capped to [0, 1]
    ///
    /// Formula: `visual * w_v + focus * w_f + typing * w_t`
    pub fn aggregate(&self, sample: &SignalSample) -> f64 {
        let raw: f64 = sample
            .scores()
            .iter()
            .map(|(kind, score)| sanitize(*score) * self.weight(*kind))
            .sum();

        raw.clamp(0.0, 1.0)
    }

    /// Human-readable list of the sub-signals that contributed to the score
    pub fn describe(&self, sample: &SignalSample) -> String {
        let parts: Vec<String> = sample
            .scores()
            .iter()
            .filter(|(kind, score)| sanitize(*score) > 0.0 && self.weight(*kind) > 0.0)
            .map(|(kind, score)| format!("{} {:.2}", kind.as_str(), sanitize(*score)))
            .collect();

        if parts.is_empty() {
            NO_INDICATORS.to_string()
        } else {
            parts.join(" | ")
        }
    }

    fn weight(&self, kind: SignalKind) -> f64 {
        match kind {
            SignalKind::Visual => self.weights.visual,
            SignalKind::Focus => self.weights.focus,
            SignalKind::Typing => self.weights.typing,
        }
    }
}

/// Map a sub-score into [0, 1], treating non-finite values as 0.0
pub(crate) fn sanitize(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_form_weighted_sum() {
        let aggregator = ScoreAggregator::default();
        let sample = SignalSample::new(0.75, 0.8, Some(0.5));

        let raw = aggregator.aggregate(&sample);
        assert!((raw - 0.72).abs() < 1e-9);
    }

    #[test]
    fn test_missing_typing_counts_as_zero() {
        let aggregator = ScoreAggregator::default();
        let sample = SignalSample::new(0.5, 0.5, None);

        assert!((aggregator.aggregate(&sample) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_capped_at_one() {
        let aggregator = ScoreAggregator::new(SignalWeights {
            visual: 1.0,
            focus: 1.0,
            typing: 1.0,
        });
        let sample = SignalSample::new(1.0, 1.0, Some(1.0));

        assert_eq!(aggregator.aggregate(&sample), 1.0);
    }

    #[test]
    fn test_output_in_unit_range() {
        let aggregator = ScoreAggregator::default();
        let steps = [0.0, 0.1, 0.25, 0.5, 0.75, 0.9, 1.0];

        for &v in &steps {
            for &f in &steps {
                for &t in &steps {
                    let raw = aggregator.aggregate(&SignalSample::new(v, f, Some(t)));
                    assert!((0.0..=1.0).contains(&raw));
                    let expected = (v * 0.4 + f * 0.4 + t * 0.2).min(1.0);
                    assert!((raw - expected).abs() < 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_unusable_scores_degrade() {
        let aggregator = ScoreAggregator::default();
        let sample = SignalSample::new(f64::NAN, 2.0, Some(-1.0));

        // NaN -> 0.0, 2.0 -> 1.0, -1.0 -> 0.0
        assert!((aggregator.aggregate(&sample) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_describe_lists_contributors() {
        let aggregator = ScoreAggregator::default();

        let reason = aggregator.describe(&SignalSample::new(0.75, 0.8, Some(0.5)));
        assert_eq!(reason, "visual 0.75 | focus 0.80 | typing 0.50");

        let reason = aggregator.describe(&SignalSample::new(0.0, 0.3, None));
        assert_eq!(reason, "focus 0.30");

        let reason = aggregator.describe(&SignalSample::default());
        assert_eq!(reason, NO_INDICATORS);
    }
}
