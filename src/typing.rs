//! Typing cadence producer
//!
//! A host keyboard listener feeds keypress instants through a
//! [`KeystrokeRecorder`]; [`TypingCadence`] turns the recent window into a
//! typing score. Only timing is kept, never key content.

use crate::error::SignalError;
use crate::signals::SignalProducer;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Keypress instants kept in the ring buffer
pub const KEYPRESS_HISTORY: usize = 1000;

/// Window over which the typing rate is measured
const RATE_WINDOW: Duration = Duration::from_secs(5);

/// A pause longer than this ends the typing session
const SESSION_GAP: Duration = Duration::from_secs(5);

/// Rough keypresses per word
const KEYS_PER_WORD: u64 = 5;

/// Words in one session that count as "many"
const MANY_WORDS: u64 = 50;

/// Thresholds for what counts as steady typing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CadenceSettings {
    /// Seconds of continuous typing before it counts as steady
    pub steady_typing_secs: f64,
    /// Minimum keys per second for steady typing
    pub keypress_rate: f64,
}

impl Default for CadenceSettings {
    fn default() -> Self {
        Self {
            steady_typing_secs: 15.0,
            keypress_rate: 2.0,
        }
    }
}

/// Derived typing statistics at one instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TypingStats {
    pub keys_per_second: f64,
    pub session_secs: f64,
    pub session_keypresses: u64,
    pub word_estimate: u64,
    pub steady: bool,
}

#[derive(Debug, Default)]
struct KeystrokeWindow {
    history: VecDeque<Instant>,
    session_start: Option<Instant>,
    session_keypresses: u64,
    closed: bool,
}

impl KeystrokeWindow {
    fn record(&mut self, at: Instant) -> bool {
        if self.closed {
            return false;
        }

        let continues_session = self
            .history
            .back()
            .map(|last| at.saturating_duration_since(*last) <= SESSION_GAP)
            .unwrap_or(false);
        if !continues_session {
            self.session_start = Some(at);
            self.session_keypresses = 0;
        }

        self.history.push_back(at);
        while self.history.len() > KEYPRESS_HISTORY {
            self.history.pop_front();
        }
        self.session_keypresses += 1;
        true
    }

    fn stats(&self, now: Instant, settings: &CadenceSettings) -> TypingStats {
        let session_live = self
            .history
            .back()
            .map(|last| now.saturating_duration_since(*last) <= SESSION_GAP)
            .unwrap_or(false);

        let recent: Vec<&Instant> = self
            .history
            .iter()
            .filter(|at| now.saturating_duration_since(**at) <= RATE_WINDOW)
            .collect();

        let keys_per_second = match (recent.first(), recent.last()) {
            (Some(first), Some(last)) if recent.len() > 1 => {
                let span = last.saturating_duration_since(**first).as_secs_f64();
                if span > 0.0 {
                    recent.len() as f64 / span
                } else {
                    recent.len() as f64
                }
            }
            _ => 0.0,
        };

        let (session_secs, session_keypresses) = match (session_live, self.session_start) {
            (true, Some(start)) => (
                now.saturating_duration_since(start).as_secs_f64(),
                self.session_keypresses,
            ),
            _ => (0.0, 0),
        };

        TypingStats {
            keys_per_second,
            session_secs,
            session_keypresses,
            word_estimate: session_keypresses / KEYS_PER_WORD,
            steady: keys_per_second >= settings.keypress_rate
                && session_secs >= settings.steady_typing_secs,
        }
    }
}

/// Handle a keyboard listener uses to report keypresses
#[derive(Debug, Clone)]
pub struct KeystrokeRecorder {
    window: Arc<Mutex<KeystrokeWindow>>,
}

impl KeystrokeRecorder {
    /// Record a keypress now; returns false once the producer has been released
    pub fn record(&self) -> bool {
        self.record_at(Instant::now())
    }

    pub fn record_at(&self, at: Instant) -> bool {
        lock(&self.window).record(at)
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.window).closed
    }
}

/// Typing score from keypress cadence
#[derive(Debug)]
pub struct TypingCadence {
    window: Arc<Mutex<KeystrokeWindow>>,
    settings: CadenceSettings,
}

impl Default for TypingCadence {
    fn default() -> Self {
        Self::new(CadenceSettings::default())
    }
}

impl TypingCadence {
    pub fn new(settings: CadenceSettings) -> Self {
        Self {
            window: Arc::new(Mutex::new(KeystrokeWindow::default())),
            settings,
        }
    }

    /// A recorder feeding this producer
    pub fn recorder(&self) -> KeystrokeRecorder {
        KeystrokeRecorder {
            window: Arc::clone(&self.window),
        }
    }

    pub fn stats_at(&self, now: Instant) -> TypingStats {
        lock(&self.window).stats(now, &self.settings)
    }

    /// Activity score at `now`
    ///
    /// +0.4 steady typing, +0.3 fast typing (1.5x the steady rate),
    /// +0.2 many words this session, +0.1 any current activity; capped at 1.0
    pub fn score_at(&self, now: Instant) -> f64 {
        let stats = self.stats_at(now);
        let mut score = 0.0;

        if stats.steady {
            score += 0.4;
        }
        if stats.keys_per_second >= self.settings.keypress_rate * 1.5 {
            score += 0.3;
        }
        if stats.word_estimate >= MANY_WORDS {
            score += 0.2;
        }
        if stats.session_secs > 0.0 && stats.keys_per_second > 0.0 {
            score += 0.1;
        }

        f64::min(score, 1.0)
    }
}

impl SignalProducer for TypingCadence {
    fn score(&mut self) -> Result<f64, SignalError> {
        Ok(self.score_at(Instant::now()))
    }

    fn release(&mut self) {
        let mut window = lock(&self.window);
        window.closed = true;
        window.history.clear();
        window.session_start = None;
        window.session_keypresses = 0;
    }
}

fn lock(window: &Mutex<KeystrokeWindow>) -> MutexGuard<'_, KeystrokeWindow> {
    match window.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
