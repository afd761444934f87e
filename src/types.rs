//! Core types for the DeProductify engine
//!
//! This module defines the records that flow through a tick: the per-tick
//! signal sample, the aggregate score, and the events handed to consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one of the three sub-signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Visual,
    Focus,
    Typing,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Visual => "visual",
            SignalKind::Focus => "focus",
            SignalKind::Typing => "typing",
        }
    }
}

/// Snapshot of the three sub-scores for one tick, each in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SignalSample {
    /// Screen-content heuristics
    pub visual_score: f64,
    /// Window-focus duration and app classification
    pub focus_score: f64,
    /// Keystroke cadence; `None` when keyboard tracking is disabled
    pub typing_score: Option<f64>,
}

impl SignalSample {
    pub fn new(visual_score: f64, focus_score: f64, typing_score: Option<f64>) -> Self {
        Self {
            visual_score,
            focus_score,
            typing_score,
        }
    }

    /// Sub-scores in a fixed order, with an absent typing score reported as 0.0
    pub fn scores(&self) -> [(SignalKind, f64); 3] {
        [
            (SignalKind::Visual, self.visual_score),
            (SignalKind::Focus, self.focus_score),
            (SignalKind::Typing, self.typing_score.unwrap_or(0.0)),
        ]
    }
}

/// Result of aggregating one sample against the ratcheted baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateScore {
    /// This tick's weighted combination
    pub raw: f64,
    /// Ratcheted floor, quantized to 0.1 steps
    pub baseline: f64,
    /// `max(raw, baseline)` capped at 1.0
    pub combined: f64,
    /// Which sub-signals contributed
    pub reason: String,
}

/// The single decisive event fired when the combined score crosses the threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub id: Uuid,
    pub reason: String,
    pub score: f64,
    pub timestamp: DateTime<Utc>,
}

impl TriggerEvent {
    pub fn new(reason: impl Into<String>, score: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            reason: reason.into(),
            score,
            timestamp,
        }
    }
}

/// Wording tier of a warning, chosen from the warned bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningTier {
    Noticed,
    Rising,
    Elevated,
    Imminent,
}

/// Graduated notification emitted as the combined score climbs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarningMessage {
    /// Bucket warned at (0.1 steps)
    pub level: f64,
    pub tier: WarningTier,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Per-tick observability record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub score: f64,
    pub baseline: f64,
    pub raw: f64,
    pub timestamp: DateTime<Utc>,
}

/// Lifecycle phase of the decision engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnginePhase {
    /// Before the first tick
    Idle,
    /// Normal per-tick evaluation
    Evaluating,
    /// After a trigger, until the cooldown elapses
    Cooldown,
}

/// Cooldown bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CooldownState {
    pub active: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub duration_secs: f64,
}

/// How a tick was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickKind {
    Suppressed,
    Cooldown,
    Evaluated,
    Triggered,
}

/// Decision returned by one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickOutcome {
    pub kind: TickKind,
    pub triggered: bool,
    pub reason: String,
    /// Combined score, 0.0 on suppressed and cooldown ticks
    pub score: f64,
    pub raw: f64,
    pub baseline: f64,
    pub timestamp: DateTime<Utc>,
    /// Sub-signals whose producer failed this tick
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded: Vec<SignalKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<WarningMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<TriggerEvent>,
}

/// Serializable view of the state the engine owns across ticks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub phase: EnginePhase,
    pub baseline: f64,
    pub warning_level: f64,
    pub last_warned_at: Option<DateTime<Utc>>,
    pub cooldown: CooldownState,
    pub ticks: u64,
    pub triggers: u64,
}
