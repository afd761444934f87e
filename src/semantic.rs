//! Semantic fallback
//!
//! When the screen heuristics score low, an optional classifier may be asked
//! whether the current context looks like work. The call is best-effort: it
//! runs on a worker thread, a tick waits at most `budget_ms` for it, and a late
//! answer is picked up on a later tick. A confident productive verdict adds a
//! fixed boost to the visual score, capped at 1.0.

use crate::config::SemanticConfig;
use crate::error::SignalError;
use crate::signals::SignalProducer;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// What the classifier gets to see
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassifierContext {
    pub app: String,
    pub title: String,
    #[serde(default)]
    pub text_snippet: String,
}

/// Classifier answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub is_productive: bool,
    /// False when the classifier hedged
    pub confident: bool,
}

impl Classification {
    pub fn is_confident_productive(&self) -> bool {
        self.is_productive && self.confident
    }
}

/// Slow, possibly remote, semantic classifier
pub trait SemanticClassifier: Send + Sync {
    fn classify(&self, context: &ClassifierContext) -> Result<Classification, SignalError>;
}

/// A call still unanswered after this many `min_interval_secs` is abandoned
const STALE_AFTER_INTERVALS: f64 = 3.0;

/// Lower bound on the abandon cutoff, in multiples of `budget_ms`
const STALE_AFTER_BUDGETS: u32 = 20;

type ContextSource = Box<dyn FnMut() -> Option<ClassifierContext> + Send>;

struct PendingCall {
    context: ClassifierContext,
    rx: Receiver<Result<Classification, SignalError>>,
    started: Instant,
}

/// Visual producer wrapper that biases low heuristic scores with a classifier verdict
pub struct SemanticBoost<P> {
    inner: P,
    classifier: Arc<dyn SemanticClassifier>,
    context: ContextSource,
    settings: SemanticConfig,
    last_call: Option<Instant>,
    pending: Option<PendingCall>,
    verdict: Option<(ClassifierContext, Classification)>,
}

impl<P: SignalProducer> SemanticBoost<P> {
    pub fn new(
        inner: P,
        classifier: Arc<dyn SemanticClassifier>,
        context: impl FnMut() -> Option<ClassifierContext> + Send + 'static,
        settings: SemanticConfig,
    ) -> Self {
        Self {
            inner,
            classifier,
            context: Box::new(context),
            settings,
            last_call: None,
            pending: None,
            verdict: None,
        }
    }

    /// Boosted score for a heuristic score
    fn bias(&mut self, heuristic: f64) -> f64 {
        if heuristic >= self.settings.low_score_ceiling {
            return heuristic;
        }
        let Some(context) = (self.context)() else {
            return heuristic;
        };

        self.poll_pending();
        if !self.has_verdict_for(&context) && self.pending.is_none() && self.call_allowed() {
            self.call(context.clone());
        }

        match &self.verdict {
            Some((seen, verdict)) if *seen == context && verdict.is_confident_productive() => {
                debug!("classifier vouches for {}, boosting visual score", context.app);
                f64::min(heuristic + self.settings.boost, 1.0)
            }
            _ => heuristic,
        }
    }

    fn has_verdict_for(&self, context: &ClassifierContext) -> bool {
        matches!(&self.verdict, Some((seen, _)) if seen == context)
    }

    fn call_allowed(&self) -> bool {
        self.last_call
            .map(|at| at.elapsed().as_secs_f64() >= self.settings.min_interval_secs)
            .unwrap_or(true)
    }

    /// How long an unanswered call may hold the single in-flight slot
    fn stale_after(&self) -> Duration {
        let budgets =
            Duration::from_millis(self.settings.budget_ms).saturating_mul(STALE_AFTER_BUDGETS);
        let intervals =
            Duration::try_from_secs_f64(self.settings.min_interval_secs * STALE_AFTER_INTERVALS)
                .unwrap_or(Duration::MAX);
        budgets.max(intervals)
    }

    fn call(&mut self, context: ClassifierContext) {
        let (tx, rx) = mpsc::channel();
        let classifier = Arc::clone(&self.classifier);
        let request = context.clone();
        thread::spawn(move || {
            let _ = tx.send(classifier.classify(&request));
        });
        let started = Instant::now();
        self.last_call = Some(started);

        match rx.recv_timeout(Duration::from_millis(self.settings.budget_ms)) {
            Ok(result) => self.accept(context, result),
            Err(RecvTimeoutError::Timeout) => {
                debug!(
                    "classifier exceeded {}ms budget, using heuristic score",
                    self.settings.budget_ms
                );
                self.pending = Some(PendingCall {
                    context,
                    rx,
                    started,
                });
            }
            Err(RecvTimeoutError::Disconnected) => {
                warn!("classifier worker exited without an answer");
            }
        }
    }

    /// Collect a late answer if one arrived; abandon a call that never answers
    fn poll_pending(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        match pending.rx.try_recv() {
            Ok(result) => self.accept(pending.context, result),
            Err(TryRecvError::Empty) if pending.started.elapsed() >= self.stale_after() => {
                warn!(
                    "classifier unanswered after {:?}, abandoning the call",
                    pending.started.elapsed()
                );
            }
            Err(TryRecvError::Empty) => self.pending = Some(pending),
            Err(TryRecvError::Disconnected) => {
                warn!("classifier worker exited without an answer");
            }
        }
    }

    fn accept(&mut self, context: ClassifierContext, result: Result<Classification, SignalError>) {
        match result {
            Ok(classification) => self.verdict = Some((context, classification)),
            Err(err) => warn!("classifier failed, using heuristic score: {err}"),
        }
    }
}

impl<P: SignalProducer> SignalProducer for SemanticBoost<P> {
    fn score(&mut self) -> Result<f64, SignalError> {
        let heuristic = self.inner.score()?;
        Ok(self.bias(heuristic))
    }

    fn release(&mut self) {
        self.pending = None;
        self.inner.release();
    }
}
