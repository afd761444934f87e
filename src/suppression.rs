//! Suppression policy
//!
//! An external veto (for example "the user is gaming") that turns a tick into a
//! no-op regardless of score. A vetoed tick is not a missed trigger; no engine
//! state moves.

use crate::config::SuppressionFailure;
use crate::error::SignalError;
use crate::warning::elapsed_secs;
use chrono::{DateTime, Utc};
use log::warn;
use std::sync::{Arc, Mutex};

/// Result of a suppression check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Clear,
    Suppressed(String),
}

impl Verdict {
    pub fn is_suppressed(&self) -> bool {
        matches!(self, Verdict::Suppressed(_))
    }
}

/// Decides whether the current tick is vetoed
pub trait SuppressionPolicy: Send {
    fn check(&mut self, now: DateTime<Utc>) -> Result<Verdict, SignalError>;
}

impl<F> SuppressionPolicy for F
where
    F: FnMut() -> Result<Verdict, SignalError> + Send,
{
    fn check(&mut self, _now: DateTime<Utc>) -> Result<Verdict, SignalError> {
        self()
    }
}

impl SuppressionFailure {
    /// Turn a check result into a verdict, applying the configured failure policy
    pub fn resolve(self, result: Result<Verdict, SignalError>) -> Verdict {
        match result {
            Ok(verdict) => verdict,
            Err(err) => match self {
                SuppressionFailure::FailOpen => {
                    warn!("suppression check failed, evaluating normally: {err}");
                    Verdict::Clear
                }
                SuppressionFailure::FailClosed => {
                    warn!("suppression check failed, skipping tick: {err}");
                    Verdict::Suppressed(format!("Suppression check failed: {err}"))
                }
            },
        }
    }
}

/// Policy that never vetoes
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverSuppress;

impl SuppressionPolicy for NeverSuppress {
    fn check(&mut self, _now: DateTime<Utc>) -> Result<Verdict, SignalError> {
        Ok(Verdict::Clear)
    }
}

/// Host-written verdict cell; clones share the same cell
#[derive(Debug, Clone)]
pub struct SharedSuppression {
    inner: Arc<Mutex<Result<Verdict, SignalError>>>,
}

impl Default for SharedSuppression {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Ok(Verdict::Clear))),
        }
    }
}

impl SharedSuppression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn suppress(&self, reason: impl Into<String>) {
        self.store(Ok(Verdict::Suppressed(reason.into())));
    }

    pub fn clear(&self) {
        self.store(Ok(Verdict::Clear));
    }

    /// Make the next checks fail until a verdict is set again
    pub fn fail(&self, error: SignalError) {
        self.store(Err(error));
    }

    fn store(&self, value: Result<Verdict, SignalError>) {
        match self.inner.lock() {
            Ok(mut guard) => *guard = value,
            Err(poisoned) => *poisoned.into_inner() = value,
        }
    }
}

impl SuppressionPolicy for SharedSuppression {
    fn check(&mut self, _now: DateTime<Utc>) -> Result<Verdict, SignalError> {
        match self.inner.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => Err(SignalError::Failed("suppression cell poisoned".to_string())),
        }
    }
}

/// Runs an expensive inner check at most once per interval and reuses the
/// last result in between
pub struct ThrottledSuppression<P> {
    inner: P,
    interval_secs: f64,
    last_checked: Option<DateTime<Utc>>,
    cached: Result<Verdict, SignalError>,
}

impl<P: SuppressionPolicy> ThrottledSuppression<P> {
    pub fn new(inner: P, interval_secs: f64) -> Self {
        Self {
            inner,
            interval_secs,
            last_checked: None,
            cached: Ok(Verdict::Clear),
        }
    }
}

impl<P: SuppressionPolicy> SuppressionPolicy for ThrottledSuppression<P> {
    fn check(&mut self, now: DateTime<Utc>) -> Result<Verdict, SignalError> {
        let due = match self.last_checked {
            Some(at) => elapsed_secs(at, now) >= self.interval_secs,
            None => true,
        };

        if due {
            self.cached = self.inner.check(now);
            self.last_checked = Some(now);
        }
        self.cached.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap()
    }

    #[test]
    fn test_fail_open_and_closed() {
        let failure =
            || -> Result<Verdict, SignalError> { Err(SignalError::Failed("offline".to_string())) };

        assert_eq!(SuppressionFailure::FailOpen.resolve(failure()), Verdict::Clear);
        assert!(SuppressionFailure::FailClosed.resolve(failure()).is_suppressed());

        let ok = Ok(Verdict::Suppressed("Game detected: Celeste".to_string()));
        assert_eq!(
            SuppressionFailure::FailOpen.resolve(ok),
            Verdict::Suppressed("Game detected: Celeste".to_string())
        );
    }

    #[test]
    fn test_shared_suppression() {
        let cell = SharedSuppression::new();
        let mut policy = cell.clone();

        assert_eq!(policy.check(t0()), Ok(Verdict::Clear));
        cell.suppress("Game detected");
        assert_eq!(
            policy.check(t0()),
            Ok(Verdict::Suppressed("Game detected".to_string()))
        );
        cell.fail(SignalError::Unavailable("no window".to_string()));
        assert!(policy.check(t0()).is_err());
        cell.clear();
        assert_eq!(policy.check(t0()), Ok(Verdict::Clear));
    }

    #[test]
    fn test_throttled_reuses_cached_verdict() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let inner = move || -> Result<Verdict, SignalError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Verdict::Suppressed("Game detected".to_string()))
        };
        let mut policy = ThrottledSuppression::new(inner, 5.0);

        assert!(policy.check(t0()).unwrap().is_suppressed());
        assert!(policy.check(t0() + Duration::seconds(2)).unwrap().is_suppressed());
        assert!(policy.check(t0() + Duration::seconds(4)).unwrap().is_suppressed());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        policy.check(t0() + Duration::seconds(5)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_throttled_caches_failures() {
        let mut policy = ThrottledSuppression::new(
            || -> Result<Verdict, SignalError> { Err(SignalError::Failed("boom".to_string())) },
            5.0,
        );
        assert!(policy.check(t0()).is_err());
        assert!(policy.check(t0() + Duration::seconds(1)).is_err());
    }
}
