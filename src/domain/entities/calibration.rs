use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::CalibrationTimings;

/// Whether a machine-specific CPU threshold has been learned yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalibrationPhase {
    /// No calibration has succeeded; shutdown decisions are suspended in auto mode.
    Learning,
    /// A threshold is in force and is refreshed periodically.
    Calibrated,
}

impl std::fmt::Display for CalibrationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Learning => write!(f, "learning"),
            Self::Calibrated => write!(f, "calibrated"),
        }
    }
}

/// Durable calibration record, the single source of truth for the
/// learning flag and the threshold in force in auto mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationState {
    /// Flips to `true` once, at the first successful calibration.
    pub initial_done: bool,
    /// First start of the daemon on this machine.
    pub start_time: DateTime<Utc>,
    /// Time of the latest successful calibration, if any.
    #[serde(default)]
    pub last_calibration_time: Option<DateTime<Utc>>,
    /// Threshold (whole percent) produced by the latest calibration.
    #[serde(default)]
    pub current_threshold: f64,
    /// Idle baseline (percent) measured by the latest calibration.
    #[serde(default)]
    pub idle_baseline: f64,
}

impl CalibrationState {
    /// State for a machine seen for the first time at `now`.
    #[must_use]
    pub const fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            initial_done: false,
            start_time: now,
            last_calibration_time: None,
            current_threshold: 0.0,
            idle_baseline: 0.0,
        }
    }

    #[must_use]
    pub const fn phase(&self) -> CalibrationPhase {
        if self.initial_done {
            CalibrationPhase::Calibrated
        } else {
            CalibrationPhase::Learning
        }
    }

    /// Time left before the first calibration is attempted, never negative.
    #[must_use]
    pub fn learning_time_remaining(
        &self,
        timings: &CalibrationTimings,
        now: DateTime<Utc>,
    ) -> TimeDelta {
        let elapsed = now.signed_duration_since(self.start_time);
        timings
            .initial_lookback
            .checked_sub(&elapsed)
            .map_or(TimeDelta::MAX, |left| left.max(TimeDelta::zero()))
    }

    /// Earliest time the next calibration run becomes due, saturating at the
    /// latest representable time.
    #[must_use]
    pub fn next_calibration_at(&self, timings: &CalibrationTimings) -> DateTime<Utc> {
        let (from, delay) = match self.last_calibration_time {
            Some(last) if self.initial_done => (last, timings.recalibration_interval),
            _ => (self.start_time, timings.initial_lookback),
        };
        from.checked_add_signed(delay).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Result of one successful run of the idle-baseline procedure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationOutcome {
    pub calibrated_at: DateTime<Utc>,
    /// Lowest mean among the stable windows (percent).
    pub idle_baseline: f64,
    /// New operating threshold, rounded to a whole percent.
    pub threshold: f64,
    /// Standard-deviation bound the accepted windows satisfied.
    pub stability_bound: f64,
    /// Samples inside the lookback that were analysed.
    pub samples_analyzed: usize,
}
