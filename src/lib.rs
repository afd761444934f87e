//! DeProductify - productivity scoring and decision engine
//!
//! Three sub-signals (screen content, window focus, typing cadence) are
//! combined each tick into a raw score, floored by a ratcheted baseline, and
//! gated by suppression and cooldown before a single trigger fires:
//! signal collection → aggregation → baseline ratchet → warning or trigger.
//!
//! ## Modules
//!
//! - **Engine**: per-tick decision state machine ([`DecisionEngine`])
//! - **Producers**: typing cadence, focus duration and the semantic fallback
//! - **Runtime**: live tick loop on tokio and deterministic replay

pub mod aggregator;
pub mod baseline;
pub mod config;
pub mod cooldown;
pub mod engine;
pub mod error;
pub mod focus;
pub mod replay;
pub mod runner;
pub mod semantic;
pub mod signals;
pub mod sinks;
pub mod suppression;
pub mod types;
pub mod typing;
pub mod warning;

pub use aggregator::ScoreAggregator;
pub use baseline::BaselineRatchet;
pub use config::{EngineConfig, SemanticConfig, SignalWeights, SuppressionFailure};
pub use cooldown::CooldownGate;
pub use engine::DecisionEngine;
pub use error::{EngineError, SignalError, SinkError};
pub use replay::{ReplayFrame, ReplayReport, Replayer};
pub use runner::{tick_loop, EngineController};
pub use signals::{SharedScore, SignalProducer, SignalSources};
pub use sinks::{EngineEvent, EventSink};
pub use suppression::{SuppressionPolicy, Verdict};
pub use types::*;
pub use warning::WarningLadder;

/// Crate version reported by the CLI
pub const DEPROD_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name the engine reports itself under
pub const PRODUCER_NAME: &str = "deproductify";
