//! Deterministic replay
//!
//! Recorded sub-scores are fed back through a [`DecisionEngine`], using each
//! frame's timestamp as the clock. Gating (baseline, warnings, cooldown,
//! suppression) reproduces exactly without waiting in real time.

use crate::config::EngineConfig;
use crate::engine::DecisionEngine;
use crate::error::EngineError;
use crate::signals::{SharedScore, SignalSources};
use crate::sinks::{EngineEvent, MemorySink};
use crate::suppression::SharedSuppression;
use crate::types::{EngineSnapshot, TickOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reason reported for a suppressed frame that does not carry one
pub const DEFAULT_SUPPRESSION_REASON: &str = "Suppression active";

/// One recorded tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayFrame {
    pub at: DateTime<Utc>,
    pub visual: f64,
    pub focus: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typing: Option<f64>,
    #[serde(default)]
    pub suppressed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suppression_reason: Option<String>,
}

impl ReplayFrame {
    /// Parse a JSON array of frames
    pub fn parse_array(json: &str) -> Result<Vec<ReplayFrame>, EngineError> {
        let frames: Vec<ReplayFrame> = serde_json::from_str(json)?;
        Ok(frames)
    }

    /// Parse NDJSON, one frame per non-empty line
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<ReplayFrame>, EngineError> {
        let mut frames = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<ReplayFrame>(trimmed) {
                Ok(frame) => frames.push(frame),
                Err(e) => {
                    return Err(EngineError::Replay(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(frames)
    }

    /// Check every score is a finite value in [0, 1]
    pub fn validate(&self) -> Result<(), EngineError> {
        let scores = [
            ("visual", Some(self.visual)),
            ("focus", Some(self.focus)),
            ("typing", self.typing),
        ];
        for (name, score) in scores {
            if let Some(value) = score {
                if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                    return Err(EngineError::Replay(format!(
                        "{name} score {value} at {} is outside [0, 1]",
                        self.at.to_rfc3339()
                    )));
                }
            }
        }
        Ok(())
    }

    fn suppression_reason(&self) -> String {
        self.suppression_reason
            .clone()
            .unwrap_or_else(|| DEFAULT_SUPPRESSION_REASON.to_string())
    }
}

/// Validate a whole recording: every frame in range, timestamps non-decreasing
pub fn validate_frames(frames: &[ReplayFrame]) -> Result<(), EngineError> {
    let mut previous: Option<DateTime<Utc>> = None;
    for (index, frame) in frames.iter().enumerate() {
        frame.validate()?;
        if let Some(prev) = previous {
            if frame.at < prev {
                return Err(EngineError::Replay(format!(
                    "frame {} at {} is earlier than the frame before it",
                    index + 1,
                    frame.at.to_rfc3339()
                )));
            }
        }
        previous = Some(frame.at);
    }
    Ok(())
}

/// Everything a replay produced
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub outcomes: Vec<TickOutcome>,
    pub events: Vec<EngineEvent>,
    pub snapshot: EngineSnapshot,
}

/// Engine wired to cells that replay frames write into
pub struct Replayer {
    engine: DecisionEngine,
    visual: SharedScore,
    focus: SharedScore,
    typing: SharedScore,
    suppression: SharedSuppression,
    sink: MemorySink,
    last_at: Option<DateTime<Utc>>,
}

impl Replayer {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let visual = SharedScore::default();
        let focus = SharedScore::default();
        let typing = SharedScore::default();
        let suppression = SharedSuppression::new();
        let sink = MemorySink::new();

        let sources =
            SignalSources::new(visual.clone(), focus.clone()).with_typing(typing.clone());
        let engine = DecisionEngine::new(config, sources, suppression.clone(), sink.clone())?;

        Ok(Self {
            engine,
            visual,
            focus,
            typing,
            suppression,
            sink,
            last_at: None,
        })
    }

    /// Apply one frame and tick at its timestamp
    pub fn step(&mut self, frame: &ReplayFrame) -> Result<TickOutcome, EngineError> {
        frame.validate()?;
        if let Some(last) = self.last_at {
            if frame.at < last {
                return Err(EngineError::Replay(format!(
                    "frame at {} goes back in time",
                    frame.at.to_rfc3339()
                )));
            }
        }
        self.last_at = Some(frame.at);

        self.visual.set(frame.visual);
        self.focus.set(frame.focus);
        self.typing.set(frame.typing.unwrap_or(0.0));
        if frame.suppressed {
            self.suppression.suppress(frame.suppression_reason());
        } else {
            self.suppression.clear();
        }

        Ok(self.engine.tick(frame.at))
    }

    /// Replay a whole recording
    pub fn run(&mut self, frames: &[ReplayFrame]) -> Result<ReplayReport, EngineError> {
        validate_frames(frames)?;

        let mut outcomes = Vec::with_capacity(frames.len());
        for frame in frames {
            outcomes.push(self.step(frame)?);
        }

        Ok(ReplayReport {
            outcomes,
            events: self.sink.drain(),
            snapshot: self.engine.snapshot(),
        })
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.sink.events()
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        self.engine.snapshot()
    }
}
