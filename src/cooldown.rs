//! Cooldown gate
//!
//! After a trigger the gate blocks every tick for a fixed duration. Expiry is
//! evaluated lazily: the gate deactivates on the first check at or past
//! `started_at + duration`.

use crate::types::CooldownState;
use crate::warning::elapsed_secs;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct CooldownGate {
    state: CooldownState,
}

impl CooldownGate {
    pub fn new(duration_secs: f64) -> Self {
        Self {
            state: CooldownState {
                active: false,
                started_at: None,
                duration_secs,
            },
        }
    }

    /// Start a cooldown window at `now`
    pub fn arm(&mut self, now: DateTime<Utc>) {
        self.state.active = true;
        self.state.started_at = Some(now);
    }

    /// Whether the gate blocks this tick; deactivates the gate once expired
    pub fn is_blocking(&mut self, now: DateTime<Utc>) -> bool {
        if !self.state.active {
            return false;
        }
        if self.remaining_secs(now) > 0.0 {
            return true;
        }
        self.state.active = false;
        false
    }

    /// Seconds left in the window, 0.0 when inactive or expired
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> f64 {
        match (self.state.active, self.state.started_at) {
            (true, Some(started_at)) => {
                (self.state.duration_secs - elapsed_secs(started_at, now)).max(0.0)
            }
            _ => 0.0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.active
    }

    pub fn state(&self) -> CooldownState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap()
    }

    #[test]
    fn test_inactive_never_blocks() {
        let mut gate = CooldownGate::new(120.0);
        assert!(!gate.is_blocking(t0()));
        assert_eq!(gate.remaining_secs(t0()), 0.0);
    }

    #[test]
    fn test_blocks_until_duration_elapsed() {
        let mut gate = CooldownGate::new(120.0);
        gate.arm(t0());

        assert!(gate.is_blocking(t0()));
        assert!(gate.is_blocking(t0() + Duration::seconds(119)));
        assert_eq!(gate.remaining_secs(t0() + Duration::seconds(100)), 20.0);
        assert!(gate.is_active());

        assert!(!gate.is_blocking(t0() + Duration::seconds(120)));
        assert!(!gate.is_active());
    }

    #[test]
    fn test_zero_duration_expires_immediately() {
        let mut gate = CooldownGate::new(0.0);
        gate.arm(t0());
        assert!(!gate.is_blocking(t0()));
    }

    #[test]
    fn test_rearm_restarts_window() {
        let mut gate = CooldownGate::new(10.0);
        gate.arm(t0());
        assert!(!gate.is_blocking(t0() + Duration::seconds(15)));

        gate.arm(t0() + Duration::seconds(20));
        assert!(gate.is_blocking(t0() + Duration::seconds(25)));
        assert_eq!(gate.state().started_at, Some(t0() + Duration::seconds(20)));
    }
}
