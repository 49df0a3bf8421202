use chrono::TimeDelta;

use super::calibration_timings::CalibrationTimings;
use super::cpu_mode::CpuMode;

/// Session history kept even when the user check window is shorter.
const MIN_SESSION_RETENTION_HOURS: i64 = 2;

/// Configuration snapshot consumed by the decision loop for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectiveConfig {
    /// CPU must stay below the threshold for this many minutes.
    pub cpu_check_minutes: u32,
    /// No session may be active for this many minutes.
    pub user_check_minutes: u32,
    /// Fixed threshold (percent); only used in manual mode.
    pub cpu_threshold: f64,
    pub mode: CpuMode,
    pub calibration: CalibrationTimings,
}

impl EffectiveConfig {
    /// Retention for the CPU buffer: long enough for every calibration lookback
    /// and for the CPU check window.
    #[must_use]
    pub fn cpu_retention(&self) -> TimeDelta {
        self.calibration
            .longest_lookback()
            .max(TimeDelta::minutes(i64::from(self.cpu_check_minutes)))
    }

    /// Retention for the session buffer: only needs to cover the user check window.
    #[must_use]
    pub fn session_retention(&self) -> TimeDelta {
        TimeDelta::hours(MIN_SESSION_RETENTION_HOURS)
            .max(TimeDelta::minutes(i64::from(self.user_check_minutes)))
    }
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            cpu_check_minutes: 60,
            user_check_minutes: 60,
            cpu_threshold: 25.0,
            mode: CpuMode::Auto,
            calibration: CalibrationTimings::default(),
        }
    }
}
