//! Baseline ratchet
//!
//! This module keeps the session's score floor. The floor is quantized to 0.1
//! steps, only ever moves up, and returns to zero on an explicit reset after a
//! trigger.

use crate::aggregator::sanitize;
use serde::{Deserialize, Serialize};

/// Width of one bucket
pub const BUCKET_WIDTH: f64 = 0.1;

/// Absorbs representation error such as `0.7 / 0.1 == 6.999...`; far below
/// any score difference that matters
const QUANTIZE_EPSILON: f64 = 1e-9;

/// Index of the 0.1 bucket a score falls into, rounding down
///
/// A score within `QUANTIZE_EPSILON` (1e-9) below a bucket edge counts as
/// reaching that edge, so `0.7` lands in bucket 7 and not 6. This is the one
/// case where the result is above the exact floor.
pub fn bucket_step(value: f64) -> u32 {
    (sanitize(value) / BUCKET_WIDTH + QUANTIZE_EPSILON).floor() as u32
}

/// Score rounded down to the nearest 0.1
pub fn quantize_down(value: f64) -> f64 {
    bucket_step(value) as f64 / 10.0
}

/// Monotonically non-decreasing score floor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineRatchet {
    /// Current floor in bucket steps
    step: u32,
}

impl BaselineRatchet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the floor to this raw score's bucket if it is higher, and return the floor
    pub fn update(&mut self, raw: f64) -> f64 {
        let candidate = bucket_step(raw);
        if candidate > self.step {
            self.step = candidate;
        }
        self.value()
    }

    /// Current floor
    pub fn value(&self) -> f64 {
        self.step as f64 / 10.0
    }

    /// Drop the floor back to 0.0
    pub fn reset(&mut self) {
        self.step = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_rounds_down() {
        assert_eq!(quantize_down(0.399999), 0.3);
        assert_eq!(quantize_down(0.4), 0.4);
        assert_eq!(quantize_down(0.72), 0.7);
        assert_eq!(quantize_down(0.09), 0.0);
        assert_eq!(quantize_down(1.0), 1.0);
    }

    #[test]
    fn test_quantize_absorbs_float_noise() {
        // 0.7 / 0.1 == 6.999999999999999
        assert_eq!(bucket_step(0.7), 7);
        assert_eq!(bucket_step(0.1 + 0.2), 3);
        assert_eq!(bucket_step(0.6), 6);
        // Inside the epsilon band an edge is reached; outside it is not
        assert_eq!(bucket_step(0.4 - 1e-12), 4);
        assert_eq!(bucket_step(0.4 - 1e-6), 3);
    }

    #[test]
    fn test_quantize_clamps_out_of_range() {
        assert_eq!(bucket_step(-0.5), 0);
        assert_eq!(bucket_step(3.0), 10);
        assert_eq!(bucket_step(f64::NAN), 0);
    }

    #[test]
    fn test_ratchet_only_moves_up() {
        let mut ratchet = BaselineRatchet::new();

        assert_eq!(ratchet.update(0.35), 0.3);
        assert_eq!(ratchet.update(0.10), 0.3);
        assert_eq!(ratchet.update(0.45), 0.4);
        assert_eq!(ratchet.update(0.0), 0.4);
    }

    #[test]
    fn test_monotonic_over_sequence() {
        let mut ratchet = BaselineRatchet::new();
        let raws = [0.2, 0.05, 0.61, 0.3, 0.0, 0.64, 0.99, 0.1];
        let mut previous = 0.0;

        for raw in raws {
            let baseline = ratchet.update(raw);
            assert!(baseline >= previous);
            previous = baseline;
        }
        assert_eq!(previous, 0.9);
    }

    #[test]
    fn test_reset_is_exactly_zero() {
        let mut ratchet = BaselineRatchet::new();
        ratchet.update(0.87);
        ratchet.reset();

        assert_eq!(ratchet.value(), 0.0);
        assert_eq!(ratchet.update(0.15), 0.1);
    }
}
