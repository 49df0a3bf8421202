use chrono::TimeDelta;

/// Timing parameters of the learning / recalibration cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationTimings {
    /// Data collected before the first calibration runs; also its lookback.
    pub initial_lookback: TimeDelta,
    /// Delay between two successful calibrations.
    pub recalibration_interval: TimeDelta,
    /// History analysed by each periodic recalibration.
    pub recalibration_lookback: TimeDelta,
}

impl CalibrationTimings {
    /// Longest history any calibration run can look at.
    #[must_use]
    pub fn longest_lookback(&self) -> TimeDelta {
        self.initial_lookback.max(self.recalibration_lookback)
    }
}

impl Default for CalibrationTimings {
    fn default() -> Self {
        Self {
            initial_lookback: TimeDelta::hours(24),
            recalibration_interval: TimeDelta::days(7),
            recalibration_lookback: TimeDelta::hours(72),
        }
    }
}
