//! Error types for DeProductify
//!
//! Only [`EngineError`] ever reaches a caller. [`SignalError`] and [`SinkError`]
//! describe collaborator failures that the engine absorbs inside a tick.

use thiserror::Error;

/// Errors surfaced by engine construction, replay and the live loop
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid replay frame: {0}")]
    Replay(String),

    #[error("Tick task failed to join: {0}")]
    TaskJoin(String),

    #[error("Tick loop already running")]
    AlreadyRunning,
}

/// Failure reported by a signal producer, suppression check or classifier
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignalError {
    #[error("signal unavailable: {0}")]
    Unavailable(String),

    #[error("signal failed: {0}")]
    Failed(String),

    #[error("signal timed out after {0}ms")]
    Timeout(u64),
}

/// Failure reported by an event consumer
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink closed")]
    Closed,

    #[error("sink write failed: {0}")]
    Write(#[from] std::io::Error),

    #[error("sink encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}
