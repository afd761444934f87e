//! Live tick loop
//!
//! Drives a [`DecisionEngine`] on a fixed interval using the wall clock. A tick
//! runs on the blocking pool since producers may do synchronous work.
//! Cancellation is checked only between ticks, so a tick in flight always
//! completes before the loop exits.

use crate::engine::DecisionEngine;
use crate::error::EngineError;
use chrono::Utc;
use log::{debug, info};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Tick `engine` every `interval` until `cancel` fires
///
/// Returns the engine with its producers released, so callers can inspect
/// the final state.
pub async fn tick_loop(
    mut engine: DecisionEngine,
    interval: Duration,
    cancel: CancellationToken,
) -> Result<DecisionEngine, EngineError> {
    if interval.is_zero() {
        engine.release_producers();
        return Err(EngineError::InvalidConfig(
            "tick interval must be non-zero".to_string(),
        ));
    }

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let (returned, outcome) = tokio::task::spawn_blocking(move || {
                    let outcome = engine.tick(Utc::now());
                    (engine, outcome)
                })
                .await
                .map_err(|err| EngineError::TaskJoin(err.to_string()))?;
                engine = returned;
                debug!("tick {:?}: {} ({:.2})", outcome.kind, outcome.reason, outcome.score);
            }
            _ = cancel.cancelled() => {
                info!("tick loop shutting down");
                break;
            }
        }
    }

    engine.release_producers();
    Ok(engine)
}

/// Owns a spawned [`tick_loop`]
#[derive(Default)]
pub struct EngineController {
    handle: Option<JoinHandle<Result<DecisionEngine, EngineError>>>,
    cancel_token: Option<CancellationToken>,
}

impl EngineController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Spawn the loop at the engine's configured tick interval; must be called
    /// from within a tokio runtime
    pub fn start(&mut self, engine: DecisionEngine) -> Result<(), EngineError> {
        if self.handle.is_some() {
            return Err(EngineError::AlreadyRunning);
        }

        let interval = engine.config().tick_interval()?;
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(tick_loop(engine, interval, cancel_token.clone()));

        info!("tick loop started ({interval:?} interval)");
        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// Stop after the current tick and hand the engine back
    pub async fn stop(&mut self) -> Result<Option<DecisionEngine>, EngineError> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        match self.handle.take() {
            Some(handle) => {
                let engine = handle
                    .await
                    .map_err(|err| EngineError::TaskJoin(err.to_string()))??;
                Ok(Some(engine))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::signals::{SharedScore, SignalSources};
    use crate::sinks::MemorySink;
    use crate::suppression::NeverSuppress;
    use crate::typing::TypingCadence;

    fn fast_engine(visual: f64) -> (DecisionEngine, crate::typing::KeystrokeRecorder) {
        let config = EngineConfig {
            tick_interval_secs: 0.01,
            ..EngineConfig::default()
        };
        let typing = TypingCadence::default();
        let recorder = typing.recorder();
        let sources = SignalSources::new(SharedScore::new(visual), SharedScore::new(0.0))
            .with_typing(typing);
        let engine = DecisionEngine::new(config, sources, NeverSuppress, MemorySink::new()).unwrap();
        (engine, recorder)
    }

    #[tokio::test]
    async fn test_controller_ticks_and_releases() {
        let (engine, recorder) = fast_engine(0.2);
        let mut controller = EngineController::new();
        controller.start(engine).unwrap();
        assert!(controller.is_running());

        tokio::time::sleep(Duration::from_millis(80)).await;
        let engine = controller.stop().await.unwrap().unwrap();

        assert!(engine.snapshot().ticks >= 1);
        assert!(recorder.is_closed());
        assert!(!controller.is_running());
    }

    #[tokio::test]
    async fn test_start_twice_rejected() {
        let (first, _) = fast_engine(0.0);
        let (second, _) = fast_engine(0.0);
        let mut controller = EngineController::new();

        controller.start(first).unwrap();
        assert!(matches!(
            controller.start(second),
            Err(EngineError::AlreadyRunning)
        ));
        controller.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_zero_interval_loop_refused() {
        let (engine, recorder) = fast_engine(0.0);
        let result = tick_loop(engine, Duration::ZERO, CancellationToken::new()).await;

        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
        assert!(recorder.is_closed());
    }

    #[tokio::test]
    async fn test_stop_without_start() {
        let mut controller = EngineController::new();
        assert!(controller.stop().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancelled_loop_returns_engine() {
        let (engine, _) = fast_engine(0.9);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(tick_loop(engine, Duration::from_millis(5), cancel.clone()));

        tokio::time::sleep(Duration::from_millis(40)).await;
        cancel.cancel();
        let engine = task.await.unwrap().unwrap();

        // 0.9 * 0.4 stays under the threshold, so no cooldown was entered
        assert_eq!(engine.snapshot().triggers, 0);
        assert!(engine.snapshot().ticks >= 2);
    }
}
