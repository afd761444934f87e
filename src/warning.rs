//! Warning ladder
//!
//! Emits one notification each time the combined score climbs into a higher
//! 0.1 bucket, rate-limited independently of the trigger cooldown.

use crate::baseline::bucket_step;
use crate::types::{WarningMessage, WarningTier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Graduated warning state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarningLadder {
    /// Last bucket warned at, in steps
    last_step: u32,
    /// `None` until the first warning (equivalent to the epoch)
    last_warned_at: Option<DateTime<Utc>>,
    rate_limit_secs: f64,
}

impl WarningLadder {
    pub fn new(rate_limit_secs: f64) -> Self {
        Self {
            last_step: 0,
            last_warned_at: None,
            rate_limit_secs,
        }
    }

    /// Warn if the score reached a higher bucket and the rate limit has elapsed
    pub fn maybe_warn(&mut self, combined: f64, now: DateTime<Utc>) -> Option<WarningMessage> {
        let step = bucket_step(combined);
        if step == 0 || step <= self.last_step || !self.rate_limit_elapsed(now) {
            return None;
        }

        self.last_step = step;
        self.last_warned_at = Some(now);

        let level = step as f64 / 10.0;
        let tier = tier_for(level);
        Some(WarningMessage {
            level,
            tier,
            message: message_for(tier, level),
            timestamp: now,
        })
    }

    /// Last bucket warned at
    pub fn last_level(&self) -> f64 {
        self.last_step as f64 / 10.0
    }

    pub fn last_warned_at(&self) -> Option<DateTime<Utc>> {
        self.last_warned_at
    }

    pub fn reset(&mut self) {
        self.last_step = 0;
        self.last_warned_at = None;
    }

    fn rate_limit_elapsed(&self, now: DateTime<Utc>) -> bool {
        match self.last_warned_at {
            Some(at) => elapsed_secs(at, now) >= self.rate_limit_secs,
            None => true,
        }
    }
}

/// Wording tier for a warned bucket
pub fn tier_for(level: f64) -> WarningTier {
    match bucket_step(level) {
        s if s >= 4 => WarningTier::Imminent,
        3 => WarningTier::Elevated,
        2 => WarningTier::Rising,
        _ => WarningTier::Noticed,
    }
}

/// Notification text for a tier and bucket
pub fn message_for(tier: WarningTier, level: f64) -> String {
    let percent = (level * 100.0).round() as u32;
    match tier {
        WarningTier::Imminent => {
            format!("Productivity at {percent}%: you're looking TOO productive, protocol imminent!")
        }
        WarningTier::Elevated => {
            format!("Productivity at {percent}%: levels rising... take a break?")
        }
        WarningTier::Rising => {
            format!("Productivity at {percent}%: you're starting to look productive...")
        }
        WarningTier::Noticed => format!("Productivity at {percent}%: noted."),
    }
}

pub(crate) fn elapsed_secs(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}
