//! Payment deadline enforcement for auction wins.
//!
//! Pure computation against a caller-supplied clock; never touches the
//! network or the intent store. Once a guard has reported a deadline as
//! expired it latches and never reports it live again, so a countdown that
//! straddles a clock adjustment cannot re-enable the pay action.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

/// Guard over an optional payment deadline. `None` means the purchase has
/// no time box and never expires.
#[derive(Debug)]
pub struct DeadlineGuard {
    deadline: Option<DateTime<Utc>>,
    latched: AtomicBool,
}

/// Point-in-time view of the countdown, second granularity.
#[derive(Debug, Clone, Serialize)]
pub struct DeadlineSnapshot {
    pub expired: bool,
    /// Whole seconds until the deadline, zero once passed. `None` when the
    /// purchase carries no deadline.
    pub remaining_seconds: Option<i64>,
}

impl DeadlineGuard {
    pub fn new(deadline: Option<DateTime<Utc>>) -> Self {
        Self {
            deadline,
            latched: AtomicBool::new(false),
        }
    }

    /// Time left before the deadline, clamped at zero.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.deadline
            .map(|d| (d - now).max(Duration::zero()))
    }

    /// Whether the payment window has closed. A deadline already in the
    /// past reports expired on the very first read.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        if self.latched.load(Ordering::Relaxed) {
            return true;
        }
        let expired = match self.deadline {
            Some(deadline) => now >= deadline,
            None => false,
        };
        if expired {
            self.latched.store(true, Ordering::Relaxed);
        }
        expired
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> DeadlineSnapshot {
        DeadlineSnapshot {
            expired: self.is_expired(now),
            remaining_seconds: self.remaining(now).map(|d| d.num_seconds()),
        }
    }
}
