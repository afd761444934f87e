//! Signal producers
//!
//! The engine never reaches into a producer. It asks each one for a score
//! once per tick through [`SignalProducer::score`], and [`SignalSources::collect`]
//! is the only place a producer failure is absorbed.

use crate::error::SignalError;
use crate::types::{SignalKind, SignalSample};
use log::warn;
use std::sync::{Arc, Mutex};

/// A source of one sub-score in [0, 1]
pub trait SignalProducer: Send {
    /// Current score; called once per evaluated tick and expected to return promptly
    fn score(&mut self) -> Result<f64, SignalError>;

    /// Release background resources; called once when the tick loop stops
    fn release(&mut self) {}
}

impl<F> SignalProducer for F
where
    F: FnMut() -> Result<f64, SignalError> + Send,
{
    fn score(&mut self) -> Result<f64, SignalError> {
        self()
    }
}

/// Sample plus the sub-signals that had to be degraded to produce it
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    pub sample: SignalSample,
    pub degraded: Vec<SignalKind>,
}

/// The three producers an engine reads from
pub struct SignalSources {
    visual: Box<dyn SignalProducer>,
    focus: Box<dyn SignalProducer>,
    typing: Option<Box<dyn SignalProducer>>,
}

impl SignalSources {
    pub fn new(
        visual: impl SignalProducer + 'static,
        focus: impl SignalProducer + 'static,
    ) -> Self {
        Self {
            visual: Box::new(visual),
            focus: Box::new(focus),
            typing: None,
        }
    }

    /// Enable keyboard tracking
    pub fn with_typing(mut self, typing: impl SignalProducer + 'static) -> Self {
        self.typing = Some(Box::new(typing));
        self
    }

    pub fn has_typing(&self) -> bool {
        self.typing.is_some()
    }

    /// Read every producer once; failures become 0.0 and are listed in `degraded`
    pub fn collect(&mut self) -> Collection {
        let mut degraded = Vec::new();

        let visual_score = read(SignalKind::Visual, self.visual.as_mut(), &mut degraded);
        let focus_score = read(SignalKind::Focus, self.focus.as_mut(), &mut degraded);
        let typing_score = self
            .typing
            .as_mut()
            .map(|producer| read(SignalKind::Typing, producer.as_mut(), &mut degraded));

        Collection {
            sample: SignalSample {
                visual_score,
                focus_score,
                typing_score,
            },
            degraded,
        }
    }

    /// Release every producer's background resources
    pub fn release(&mut self) {
        self.visual.release();
        self.focus.release();
        if let Some(typing) = self.typing.as_mut() {
            typing.release();
        }
    }
}

fn read(kind: SignalKind, producer: &mut dyn SignalProducer, degraded: &mut Vec<SignalKind>) -> f64 {
    match producer.score() {
        Ok(score) if score.is_finite() && (0.0..=1.0).contains(&score) => score,
        Ok(score) if score.is_finite() => {
            warn!("{} signal out of range ({score}), clamping", kind.as_str());
            degraded.push(kind);
            score.clamp(0.0, 1.0)
        }
        Ok(score) => {
            warn!("{} signal not a number ({score}), scoring 0.0", kind.as_str());
            degraded.push(kind);
            0.0
        }
        Err(err) => {
            warn!("{} signal failed, scoring 0.0: {err}", kind.as_str());
            degraded.push(kind);
            0.0
        }
    }
}

/// Thread-safe score cell written by a host and read by the engine
///
/// Clones share the same cell, so one clone can live in the engine while
/// another is updated from a listener thread.
#[derive(Debug, Clone)]
pub struct SharedScore {
    inner: Arc<Mutex<Result<f64, SignalError>>>,
}

impl Default for SharedScore {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl SharedScore {
    pub fn new(initial: f64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Ok(initial))),
        }
    }

    pub fn set(&self, score: f64) {
        self.store(Ok(score));
    }

    /// Make the next reads fail until a score is set again
    pub fn fail(&self, error: SignalError) {
        self.store(Err(error));
    }

    pub fn get(&self) -> Result<f64, SignalError> {
        match self.inner.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => Err(SignalError::Failed("score cell poisoned".to_string())),
        }
    }

    fn store(&self, value: Result<f64, SignalError>) {
        match self.inner.lock() {
            Ok(mut guard) => *guard = value,
            Err(poisoned) => *poisoned.into_inner() = value,
        }
    }
}

impl SignalProducer for SharedScore {
    fn score(&mut self) -> Result<f64, SignalError> {
        self.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_collect_all_healthy() {
        let mut sources = SignalSources::new(SharedScore::new(0.75), SharedScore::new(0.8))
            .with_typing(SharedScore::new(0.5));

        let collection = sources.collect();
        assert_eq!(collection.sample, SignalSample::new(0.75, 0.8, Some(0.5)));
        assert!(collection.degraded.is_empty());
    }

    #[test]
    fn test_typing_absent_when_disabled() {
        let mut sources = SignalSources::new(SharedScore::new(0.1), SharedScore::new(0.2));
        assert!(!sources.has_typing());
        assert_eq!(sources.collect().sample.typing_score, None);
    }

    #[test]
    fn test_failing_producer_degrades_to_zero() {
        let visual = SharedScore::new(0.9);
        visual.fail(SignalError::Unavailable("capture denied".to_string()));

        let mut sources = SignalSources::new(visual.clone(), SharedScore::new(0.6))
            .with_typing(|| -> Result<f64, SignalError> { Err(SignalError::Timeout(50)) });

        let collection = sources.collect();
        assert_eq!(collection.sample, SignalSample::new(0.0, 0.6, Some(0.0)));
        assert_eq!(
            collection.degraded,
            vec![SignalKind::Visual, SignalKind::Typing]
        );

        // Recovers as soon as the producer does
        visual.set(0.4);
        let collection = sources.collect();
        assert_eq!(collection.sample.visual_score, 0.4);
        assert_eq!(collection.degraded, vec![SignalKind::Typing]);
    }

    #[test]
    fn test_unusable_values_are_degraded() {
        let mut sources = SignalSources::new(SharedScore::new(f64::NAN), SharedScore::new(1.7));

        let collection = sources.collect();
        assert_eq!(collection.sample.visual_score, 0.0);
        assert_eq!(collection.sample.focus_score, 1.0);
        assert_eq!(
            collection.degraded,
            vec![SignalKind::Visual, SignalKind::Focus]
        );
    }

    #[test]
    fn test_shared_score_clones_share_state() {
        let cell = SharedScore::default();
        let mut reader = cell.clone();

        assert_eq!(reader.score(), Ok(0.0));
        cell.set(0.33);
        assert_eq!(reader.score(), Ok(0.33));
    }
}
