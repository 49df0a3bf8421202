use anyhow::{Context, Result};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::ports::config_source::{ConfigError, ConfigSource};
use crate::domain::value_objects::{CalibrationTimings, CpuMode, EffectiveConfig};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/idlewatch/config.toml";

/// Top-level application configuration loaded from TOML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub daemon: DaemonConfig,
}

/// Idle check windows and, in manual mode, the fixed CPU threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_check_minutes")]
    pub cpu_check_minutes: u32,
    #[serde(default = "default_check_minutes")]
    pub user_check_minutes: u32,
    /// Present: manual mode with this threshold. Absent: auto-calibration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_threshold: Option<f64>,
}

/// Learning and recalibration schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    #[serde(default = "default_initial_tracking_hours")]
    pub initial_tracking_hours: u32,
    #[serde(default = "default_recalibration_interval_days")]
    pub recalibration_interval_days: u32,
    #[serde(default = "default_recalibration_tracking_hours")]
    pub recalibration_tracking_hours: u32,
}

/// Task cadences and on-disk locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_sampling_interval")]
    pub sampling_interval_secs: u64,
    #[serde(default = "default_evaluation_interval")]
    pub evaluation_interval_secs: u64,
    #[serde(default = "default_calibration_check_interval")]
    pub calibration_check_interval_secs: u64,
    #[serde(default = "default_state_path")]
    pub state_path: String,
    /// systemd unit restarted after every successful calibration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_unit: Option<String>,
}

// --- Defaults ---

const DEFAULT_CPU_THRESHOLD: f64 = 25.0;

/// Upper bounds keeping every derived window and lookback within a year.
const MAX_CHECK_MINUTES: u32 = 365 * 24 * 60;
const MAX_TRACKING_HOURS: u32 = 365 * 24;
const MAX_RECALIBRATION_INTERVAL_DAYS: u32 = 365;

const fn default_check_minutes() -> u32 {
    60
}

const fn default_initial_tracking_hours() -> u32 {
    24
}

const fn default_recalibration_interval_days() -> u32 {
    7
}

const fn default_recalibration_tracking_hours() -> u32 {
    72
}

const fn default_sampling_interval() -> u64 {
    30
}

const fn default_evaluation_interval() -> u64 {
    60
}

const fn default_calibration_check_interval() -> u64 {
    3600
}

// NOTE: Stored as raw string with tilde, expanded with shellexpand at point of use.
fn default_state_path() -> String {
    "/var/lib/idlewatch/calibration.json".into()
}

// --- Default impls ---

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            cpu_check_minutes: default_check_minutes(),
            user_check_minutes: default_check_minutes(),
            cpu_threshold: None,
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            initial_tracking_hours: default_initial_tracking_hours(),
            recalibration_interval_days: default_recalibration_interval_days(),
            recalibration_tracking_hours: default_recalibration_tracking_hours(),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            sampling_interval_secs: default_sampling_interval(),
            evaluation_interval_secs: default_evaluation_interval(),
            calibration_check_interval_secs: default_calibration_check_interval(),
            state_path: default_state_path(),
            restart_unit: None,
        }
    }
}

// --- AppConfig methods ---

impl AppConfig {
    /// Load from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the TOML content is invalid.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Load from `path`, falling back to defaults when the file does not exist.
    /// Nothing is ever written back.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from(path)
        } else {
            tracing::info!("Config file not found at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Mode derived from the presence of `cpu_threshold`.
    #[must_use]
    pub const fn mode(&self) -> CpuMode {
        if self.monitoring.cpu_threshold.is_some() {
            CpuMode::Manual
        } else {
            CpuMode::Auto
        }
    }

    /// Validated view used by the core; out-of-range values are clamped
    /// or replaced by their defaults.
    #[must_use]
    pub fn effective(&self) -> EffectiveConfig {
        EffectiveConfig {
            cpu_check_minutes: bounded_or(
                self.monitoring.cpu_check_minutes,
                default_check_minutes(),
                MAX_CHECK_MINUTES,
            ),
            user_check_minutes: bounded_or(
                self.monitoring.user_check_minutes,
                default_check_minutes(),
                MAX_CHECK_MINUTES,
            ),
            cpu_threshold: self
                .monitoring
                .cpu_threshold
                .filter(|t| t.is_finite())
                .map_or(DEFAULT_CPU_THRESHOLD, |t| t.clamp(0.0, 100.0)),
            mode: self.mode(),
            calibration: CalibrationTimings::from(&self.calibration),
        }
    }

    /// Calibration state location, tilde-expanded.
    #[must_use]
    pub fn state_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.daemon.state_path).as_ref())
    }

    #[must_use]
    pub fn sampling_interval(&self) -> Duration {
        Duration::from_secs(self.daemon.sampling_interval_secs.max(1))
    }

    #[must_use]
    pub fn evaluation_interval(&self) -> Duration {
        Duration::from_secs(self.daemon.evaluation_interval_secs.max(1))
    }

    #[must_use]
    pub fn calibration_check_interval(&self) -> Duration {
        Duration::from_secs(self.daemon.calibration_check_interval_secs.max(1))
    }

    /// Unit to restart after calibration, if one is configured.
    #[must_use]
    pub fn restart_unit(&self) -> Option<&str> {
        self.daemon
            .restart_unit
            .as_deref()
            .map(str::trim)
            .filter(|unit| !unit.is_empty())
    }
}

/// Zero falls back to `default`; anything above `max` is capped.
const fn bounded_or(value: u32, default: u32, max: u32) -> u32 {
    if value == 0 {
        default
    } else if value > max {
        max
    } else {
        value
    }
}

impl From<&CalibrationConfig> for CalibrationTimings {
    fn from(config: &CalibrationConfig) -> Self {
        let initial = bounded_or(
            config.initial_tracking_hours,
            default_initial_tracking_hours(),
            MAX_TRACKING_HOURS,
        );
        let interval = bounded_or(
            config.recalibration_interval_days,
            default_recalibration_interval_days(),
            MAX_RECALIBRATION_INTERVAL_DAYS,
        );
        let recalibration = bounded_or(
            config.recalibration_tracking_hours,
            default_recalibration_tracking_hours(),
            MAX_TRACKING_HOURS,
        );
        Self {
            initial_lookback: TimeDelta::hours(i64::from(initial)),
            recalibration_interval: TimeDelta::days(i64::from(interval)),
            recalibration_lookback: TimeDelta::hours(i64::from(recalibration)),
        }
    }
}

/// Re-reads the TOML file on every call.
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for FileConfigSource {
    fn load(&self) -> Result<EffectiveConfig, ConfigError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(AppConfig::default().effective());
            }
            Err(e) => {
                return Err(ConfigError::ReadFailed(format!(
                    "{}: {e}",
                    self.path.display()
                )));
            }
        };
        let config: AppConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::Invalid(format!("{}: {e}", self.path.display())))?;
        Ok(config.effective())
    }
}
