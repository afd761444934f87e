//! Decision engine
//!
//! Owns the per-tick state (baseline, warning ladder, cooldown) and runs the
//! tick algorithm: suppression veto, cooldown gate, signal collection,
//! aggregation, ratchet, then either a trigger or a warning.

use crate::aggregator::ScoreAggregator;
use crate::baseline::BaselineRatchet;
use crate::config::EngineConfig;
use crate::cooldown::CooldownGate;
use crate::error::EngineError;
use crate::signals::SignalSources;
use crate::sinks::EventSink;
use crate::suppression::{SuppressionPolicy, Verdict};
use crate::types::{
    AggregateScore, EnginePhase, EngineSnapshot, SignalSample, StatusReport, TickKind,
    TickOutcome, TriggerEvent,
};
use crate::warning::WarningLadder;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};

/// Prefix of every trigger reason
pub const TRIGGER_REASON_PREFIX: &str = "Productivity detected: ";

/// Stateful tick evaluator
///
/// Not designed for concurrent access: the caller serializes `tick` calls,
/// usually through [`crate::runner::tick_loop`].
pub struct DecisionEngine {
    config: EngineConfig,
    sources: SignalSources,
    suppression: Box<dyn SuppressionPolicy>,
    sink: Box<dyn EventSink>,
    aggregator: ScoreAggregator,
    baseline: BaselineRatchet,
    warnings: WarningLadder,
    cooldown: CooldownGate,
    phase: EnginePhase,
    /// Ticks that got past the suppression veto
    ticks: u64,
    triggers: u64,
    released: bool,
}

impl DecisionEngine {
    /// Build an engine; fails only on invalid configuration
    pub fn new(
        config: EngineConfig,
        sources: SignalSources,
        suppression: impl SuppressionPolicy + 'static,
        sink: impl EventSink + 'static,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        Ok(Self {
            aggregator: ScoreAggregator::new(config.weights),
            baseline: BaselineRatchet::new(),
            warnings: WarningLadder::new(config.warning_rate_limit_secs),
            cooldown: CooldownGate::new(config.cooldown_secs),
            config,
            sources,
            suppression: Box::new(suppression),
            sink: Box::new(sink),
            phase: EnginePhase::Idle,
            ticks: 0,
            triggers: 0,
            released: false,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    pub fn baseline(&self) -> f64 {
        self.baseline.value()
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            phase: self.phase,
            baseline: self.baseline.value(),
            warning_level: self.warnings.last_level(),
            last_warned_at: self.warnings.last_warned_at(),
            cooldown: self.cooldown.state(),
            ticks: self.ticks,
            triggers: self.triggers,
        }
    }

    /// Run one evaluation at `now`
    ///
    /// A suppressed tick leaves every piece of engine state untouched,
    /// including the tick counter.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        let verdict = self
            .config
            .suppression_failure
            .resolve(self.suppression.check(now));
        if let Verdict::Suppressed(reason) = verdict {
            debug!("tick suppressed: {reason}");
            return self.skipped(TickKind::Suppressed, reason, now);
        }
        self.ticks += 1;

        if self.cooldown.is_blocking(now) {
            self.phase = EnginePhase::Cooldown;
            let reason = format!(
                "Cooldown active ({:.0}s remaining)",
                self.cooldown.remaining_secs(now)
            );
            return self.skipped(TickKind::Cooldown, reason, now);
        }
        if self.phase != EnginePhase::Evaluating {
            if self.phase == EnginePhase::Cooldown {
                info!("cooldown elapsed, resuming evaluation");
            }
            self.phase = EnginePhase::Evaluating;
        }

        let collection = self.sources.collect();
        let score = self.score(&collection.sample);
        debug!(
            "raw {:.2}, baseline {:.1}, combined {:.2}: {}",
            score.raw, score.baseline, score.combined, score.reason
        );
        self.report_status(score.combined, score.baseline, score.raw, now);

        if score.combined >= self.config.trigger_threshold {
            let reason = format!("{TRIGGER_REASON_PREFIX}{}", score.reason);
            let event = TriggerEvent::new(reason.clone(), score.combined, now);

            self.baseline.reset();
            self.warnings.reset();
            self.cooldown.arm(now);
            self.phase = EnginePhase::Cooldown;
            self.triggers += 1;

            info!(
                "trigger fired at {:.2}, cooling down for {}s",
                score.combined, self.config.cooldown_secs
            );
            if let Err(err) = self.sink.on_trigger(&event) {
                warn!("trigger sink failed: {err}");
            }

            return TickOutcome {
                kind: TickKind::Triggered,
                triggered: true,
                reason,
                score: score.combined,
                raw: score.raw,
                baseline: score.baseline,
                timestamp: now,
                degraded: collection.degraded,
                warning: None,
                trigger: Some(event),
            };
        }

        let warning = self.warnings.maybe_warn(score.combined, now);
        if let Some(message) = &warning {
            if let Err(err) = self.sink.on_warning(message) {
                warn!("warning sink failed: {err}");
            }
        }

        TickOutcome {
            kind: TickKind::Evaluated,
            triggered: false,
            reason: score.reason,
            score: score.combined,
            raw: score.raw,
            baseline: score.baseline,
            timestamp: now,
            degraded: collection.degraded,
            warning,
            trigger: None,
        }
    }

    /// Aggregate a sample and ratchet the baseline
    fn score(&mut self, sample: &SignalSample) -> AggregateScore {
        let raw = self.aggregator.aggregate(sample);
        let baseline = self.baseline.update(raw);
        AggregateScore {
            raw,
            baseline,
            combined: f64::min(f64::max(raw, baseline), 1.0),
            reason: self.aggregator.describe(sample),
        }
    }

    /// Release producer resources; later calls are no-ops
    pub fn release_producers(&mut self) {
        if !self.released {
            self.sources.release();
            self.released = true;
        }
    }

    fn skipped(&mut self, kind: TickKind, reason: String, now: DateTime<Utc>) -> TickOutcome {
        let baseline = self.baseline.value();
        self.report_status(0.0, baseline, 0.0, now);

        TickOutcome {
            kind,
            triggered: false,
            reason,
            score: 0.0,
            raw: 0.0,
            baseline,
            timestamp: now,
            degraded: Vec::new(),
            warning: None,
            trigger: None,
        }
    }

    fn report_status(&mut self, score: f64, baseline: f64, raw: f64, now: DateTime<Utc>) {
        let status = StatusReport {
            score,
            baseline,
            raw,
            timestamp: now,
        };
        if let Err(err) = self.sink.on_status(&status) {
            warn!("status sink failed: {err}");
        }
    }
}

impl Drop for DecisionEngine {
    fn drop(&mut self) {
        self.release_producers();
    }
}
