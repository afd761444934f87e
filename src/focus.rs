//! Focus duration producer
//!
//! The host reports which window is active (and whether its app is a
//! productive one) through a [`FocusFeed`]. [`FocusTracker`] scores how long
//! the same window has held focus.

use crate::error::SignalError;
use crate::signals::SignalProducer;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// Continuous focus on a productive app before it scores as fully focused
pub const DEFAULT_FOCUS_THRESHOLD_SECS: f64 = 300.0;

/// Score of a productive app held past the threshold
const PRODUCTIVE_FOCUS_SCORE: f64 = 0.8;

/// Ceiling of the duration-only score
const PARTIAL_FOCUS_CEILING: f64 = 0.6;

/// Minutes of focus at which the duration-only score saturates
const PARTIAL_FOCUS_MINUTES: f64 = 5.0;

/// Active window as seen by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowObservation {
    pub app: String,
    pub title: String,
    /// Host classification of the app as productive
    #[serde(default)]
    pub productive: bool,
}

#[derive(Debug, Default)]
struct FocusState {
    current: Option<WindowObservation>,
    focused_since: Option<Instant>,
}

impl FocusState {
    fn observe(&mut self, observation: Option<WindowObservation>, at: Instant) {
        match observation {
            None => {
                self.current = None;
                self.focused_since = None;
            }
            Some(window) => {
                let changed = self
                    .current
                    .as_ref()
                    .map(|current| current.app != window.app || current.title != window.title)
                    .unwrap_or(true);
                if changed {
                    self.focused_since = Some(at);
                }
                self.current = Some(window);
            }
        }
    }

    fn focus_secs(&self, now: Instant) -> f64 {
        self.focused_since
            .map(|since| now.saturating_duration_since(since).as_secs_f64())
            .unwrap_or(0.0)
    }
}

/// Handle the host uses to report the active window
#[derive(Debug, Clone)]
pub struct FocusFeed {
    state: Arc<Mutex<FocusState>>,
}

impl FocusFeed {
    /// Report the active window now; `None` when no window is active
    pub fn observe(&self, observation: Option<WindowObservation>) {
        self.observe_at(observation, Instant::now());
    }

    pub fn observe_at(&self, observation: Option<WindowObservation>, at: Instant) {
        lock(&self.state).observe(observation, at);
    }
}

/// Focus score from continuous window focus
#[derive(Debug)]
pub struct FocusTracker {
    state: Arc<Mutex<FocusState>>,
    threshold_secs: f64,
}

impl Default for FocusTracker {
    fn default() -> Self {
        Self::new(DEFAULT_FOCUS_THRESHOLD_SECS)
    }
}

impl FocusTracker {
    pub fn new(threshold_secs: f64) -> Self {
        Self {
            state: Arc::new(Mutex::new(FocusState::default())),
            threshold_secs,
        }
    }

    pub fn feed(&self) -> FocusFeed {
        FocusFeed {
            state: Arc::clone(&self.state),
        }
    }

    /// Seconds the current window has held focus
    pub fn focus_secs_at(&self, now: Instant) -> f64 {
        lock(&self.state).focus_secs(now)
    }

    /// Focus score at `now`
    ///
    /// A productive app focused for at least the threshold scores 0.8.
    /// Otherwise the score grows with focus time, `minutes / 5 * 0.6`, up to 0.6.
    pub fn score_at(&self, now: Instant) -> f64 {
        let state = lock(&self.state);
        let Some(window) = state.current.as_ref() else {
            return 0.0;
        };

        let focus_secs = state.focus_secs(now);
        if window.productive && focus_secs >= self.threshold_secs {
            return PRODUCTIVE_FOCUS_SCORE;
        }

        let minutes = focus_secs / 60.0;
        f64::min(minutes / PARTIAL_FOCUS_MINUTES * PARTIAL_FOCUS_CEILING, PARTIAL_FOCUS_CEILING)
    }
}

impl SignalProducer for FocusTracker {
    fn score(&mut self) -> Result<f64, SignalError> {
        Ok(self.score_at(Instant::now()))
    }
}

fn lock(state: &Mutex<FocusState>) -> MutexGuard<'_, FocusState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn window(app: &str, title: &str, productive: bool) -> Option<WindowObservation> {
        Some(WindowObservation {
            app: app.to_string(),
            title: title.to_string(),
            productive,
        })
    }

    #[test]
    fn test_no_window_scores_zero() {
        let tracker = FocusTracker::default();
        assert_eq!(tracker.score_at(Instant::now()), 0.0);
    }

    #[test]
    fn test_partial_score_grows_with_focus() {
        let tracker = FocusTracker::default();
        let feed = tracker.feed();
        let start = Instant::now();

        feed.observe_at(window("Spotify", "Daniel Caesar", false), start);
        let score = tracker.score_at(start + Duration::from_secs(150));
        assert!((score - 0.3).abs() < 1e-9);

        // Saturates at 0.6 for non-productive apps
        let score = tracker.score_at(start + Duration::from_secs(3600));
        assert!((score - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_productive_app_past_threshold() {
        let tracker = FocusTracker::new(300.0);
        let feed = tracker.feed();
        let start = Instant::now();

        feed.observe_at(window("Code", "main.rs - Code", true), start);
        feed.observe_at(window("Code", "main.rs - Code", true), start + Duration::from_secs(200));

        let before = tracker.score_at(start + Duration::from_secs(299));
        assert!(before < 0.6);
        assert_eq!(tracker.score_at(start + Duration::from_secs(300)), 0.8);
    }

    #[test]
    fn test_window_change_restarts_focus() {
        let tracker = FocusTracker::default();
        let feed = tracker.feed();
        let start = Instant::now();

        feed.observe_at(window("Code", "main.rs", true), start);
        let switched = start + Duration::from_secs(400);
        feed.observe_at(window("Code", "lib.rs", true), switched);

        assert_eq!(tracker.focus_secs_at(switched + Duration::from_secs(10)), 10.0);
    }

    #[test]
    fn test_lost_window_resets() {
        let tracker = FocusTracker::default();
        let feed = tracker.feed();
        let start = Instant::now();

        feed.observe_at(window("Code", "main.rs", true), start);
        feed.observe_at(None, start + Duration::from_secs(10));

        assert_eq!(tracker.score_at(start + Duration::from_secs(20)), 0.0);
    }
}
