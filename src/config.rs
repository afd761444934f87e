//! Engine configuration
//!
//! Configuration is fixed at construction. Invalid values are the only fatal
//! condition the engine knows about, so everything is checked once in
//! [`EngineConfig::validate`].

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default combined score that fires a trigger
pub const DEFAULT_TRIGGER_THRESHOLD: f64 = 0.5;

/// Default seconds between ticks
pub const DEFAULT_TICK_INTERVAL_SECS: f64 = 3.0;

/// Shortest tick interval accepted
pub const MIN_TICK_INTERVAL_SECS: f64 = 0.001;

/// Default seconds of silence after a trigger
pub const DEFAULT_COOLDOWN_SECS: f64 = 120.0;

/// Default minimum seconds between two warnings
pub const DEFAULT_WARNING_RATE_LIMIT_SECS: f64 = 30.0;

/// Default seconds between two real suppression checks
pub const DEFAULT_SUPPRESSION_CHECK_INTERVAL_SECS: f64 = 5.0;

/// Weight of each sub-signal in the raw score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    pub visual: f64,
    pub focus: f64,
    pub typing: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            visual: 0.4,
            focus: 0.4,
            typing: 0.2,
        }
    }
}

/// What a failing suppression check resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionFailure {
    /// Treat the failure as "not suppressed" and evaluate normally
    #[default]
    FailOpen,
    /// Treat the failure as "suppressed" and skip the tick
    FailClosed,
}

/// Semantic fallback tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticConfig {
    /// Heuristic visual scores at or above this are never second-guessed
    pub low_score_ceiling: f64,
    /// Fixed increment added on a confident productive verdict
    pub boost: f64,
    /// Longest a tick waits on the classifier
    pub budget_ms: u64,
    /// Minimum seconds between two classifier calls
    pub min_interval_secs: f64,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            low_score_ceiling: 0.3,
            boost: 0.3,
            budget_ms: 750,
            min_interval_secs: 10.0,
        }
    }
}

/// Full engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub trigger_threshold: f64,
    pub tick_interval_secs: f64,
    pub cooldown_secs: f64,
    pub warning_rate_limit_secs: f64,
    pub weights: SignalWeights,
    pub suppression_failure: SuppressionFailure,
    pub suppression_check_interval_secs: f64,
    pub semantic: SemanticConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trigger_threshold: DEFAULT_TRIGGER_THRESHOLD,
            tick_interval_secs: DEFAULT_TICK_INTERVAL_SECS,
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            warning_rate_limit_secs: DEFAULT_WARNING_RATE_LIMIT_SECS,
            weights: SignalWeights::default(),
            suppression_failure: SuppressionFailure::default(),
            suppression_check_interval_secs: DEFAULT_SUPPRESSION_CHECK_INTERVAL_SECS,
            semantic: SemanticConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Check every field, returning the first violation found
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.trigger_threshold.is_finite()
            || self.trigger_threshold <= 0.0
            || self.trigger_threshold > 1.0
        {
            return Err(invalid(format!(
                "trigger_threshold must be in (0, 1], got {}",
                self.trigger_threshold
            )));
        }

        self.tick_interval()?;

        non_negative("cooldown_secs", self.cooldown_secs)?;
        non_negative("warning_rate_limit_secs", self.warning_rate_limit_secs)?;
        non_negative(
            "suppression_check_interval_secs",
            self.suppression_check_interval_secs,
        )?;

        non_negative("weights.visual", self.weights.visual)?;
        non_negative("weights.focus", self.weights.focus)?;
        non_negative("weights.typing", self.weights.typing)?;

        non_negative("semantic.low_score_ceiling", self.semantic.low_score_ceiling)?;
        non_negative("semantic.min_interval_secs", self.semantic.min_interval_secs)?;
        if !self.semantic.boost.is_finite() || !(0.0..=1.0).contains(&self.semantic.boost) {
            return Err(invalid(format!(
                "semantic.boost must be in [0, 1], got {}",
                self.semantic.boost
            )));
        }

        Ok(())
    }

    /// Tick interval as a [`Duration`]
    ///
    /// Fails when the value is below [`MIN_TICK_INTERVAL_SECS`] or does not
    /// fit in a `Duration`.
    pub fn tick_interval(&self) -> Result<Duration, EngineError> {
        let secs = self.tick_interval_secs;
        if secs.is_nan() || secs < MIN_TICK_INTERVAL_SECS {
            return Err(invalid(format!(
                "tick_interval_secs must be at least {MIN_TICK_INTERVAL_SECS}, got {secs}"
            )));
        }
        Duration::try_from_secs_f64(secs).map_err(|err| {
            invalid(format!("tick_interval_secs {secs} is out of range: {err}"))
        })
    }

    /// Parse a (possibly partial) JSON configuration and validate it
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to pretty JSON
    pub fn to_json_pretty(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn non_negative(field: &str, value: f64) -> Result<(), EngineError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{field} must be a finite value >= 0, got {value}")))
    }
}

fn invalid(message: String) -> EngineError {
    EngineError::InvalidConfig(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.weights.visual, 0.4);
        assert_eq!(config.weights.typing, 0.2);
        assert_eq!(config.suppression_failure, SuppressionFailure::FailOpen);
    }

    #[test]
    fn test_threshold_bounds() {
        let mut config = EngineConfig::default();

        config.trigger_threshold = 0.0;
        assert!(config.validate().is_err());

        config.trigger_threshold = 1.0;
        assert!(config.validate().is_ok());

        config.trigger_threshold = 1.01;
        assert!(config.validate().is_err());

        config.trigger_threshold = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_interval_and_durations() {
        let mut config = EngineConfig::default();
        config.tick_interval_secs = 0.0;
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfig(_))
        ));

        let mut config = EngineConfig::default();
        config.cooldown_secs = 0.0;
        config.warning_rate_limit_secs = 0.0;
        assert!(config.validate().is_ok());

        config.cooldown_secs = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_interval_too_small_or_large_rejected() {
        let mut config = EngineConfig::default();

        config.tick_interval_secs = 1e-12;
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfig(_))
        ));

        config.tick_interval_secs = 1e30;
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfig(_))
        ));
        assert!(config.tick_interval().is_err());

        config.tick_interval_secs = f64::INFINITY;
        assert!(config.validate().is_err());

        config.tick_interval_secs = MIN_TICK_INTERVAL_SECS;
        assert!(config.validate().is_ok());
        assert_eq!(config.tick_interval().unwrap(), Duration::from_millis(1));
    }

    #[test]
    fn test_negative_weight_rejected() {
        let mut config = EngineConfig::default();
        config.weights.focus = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json() {
        let config = EngineConfig::from_json(
            r#"{"trigger_threshold": 0.7, "suppression_failure": "fail_closed"}"#,
        )
        .unwrap();

        assert_eq!(config.trigger_threshold, 0.7);
        assert_eq!(config.suppression_failure, SuppressionFailure::FailClosed);
        assert_eq!(config.cooldown_secs, DEFAULT_COOLDOWN_SECS);
    }

    #[test]
    fn test_invalid_json_value() {
        let result = EngineConfig::from_json(r#"{"trigger_threshold": 2.0}"#);
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));

        let result = EngineConfig::from_json("not json");
        assert!(matches!(result, Err(EngineError::Json(_))));
    }
}
