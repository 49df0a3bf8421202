use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Anything recorded at a single instant that can be kept in a
/// [`SampleBuffer`](super::sample_buffer::SampleBuffer).
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Instantaneous CPU busy percentage (0–100) at `timestamp`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CpuSample {
    pub timestamp: DateTime<Utc>,
    pub usage_percent: f64,
}

impl CpuSample {
    #[must_use]
    pub const fn new(timestamp: DateTime<Utc>, usage_percent: f64) -> Self {
        Self {
            timestamp,
            usage_percent,
        }
    }
}

impl Timestamped for CpuSample {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Distinct active sessions observed at `timestamp`.
///
/// Only the count takes part in idle decisions; identifiers are kept for logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSample {
    pub timestamp: DateTime<Utc>,
    pub sessions: BTreeSet<String>,
}

impl SessionSample {
    #[must_use]
    pub const fn new(timestamp: DateTime<Utc>, sessions: BTreeSet<String>) -> Self {
        Self {
            timestamp,
            sessions,
        }
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}

impl Timestamped for SessionSample {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Cumulative CPU tick counters as exposed by the kernel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuCounters {
    pub busy_ticks: u64,
    pub idle_ticks: u64,
}

impl CpuCounters {
    #[must_use]
    pub const fn new(busy_ticks: u64, idle_ticks: u64) -> Self {
        Self {
            busy_ticks,
            idle_ticks,
        }
    }

    /// Busy percentage over the interval between `earlier` and `self`.
    ///
    /// A zero total delta (no ticks elapsed, or counters went backwards)
    /// reads as 0% rather than dividing by zero.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn busy_percent_since(&self, earlier: &Self) -> f64 {
        let busy = self.busy_ticks.saturating_sub(earlier.busy_ticks);
        let idle = self.idle_ticks.saturating_sub(earlier.idle_ticks);
        let total = busy.saturating_add(idle);
        if total == 0 {
            0.0
        } else {
            (busy as f64 / total as f64) * 100.0
        }
    }
}
