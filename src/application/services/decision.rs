//! One evaluation tick, from threshold resolution to the shutdown request.

use std::sync::{Arc, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};

use super::calibrator::SharedCalibrator;
use super::sampler::{CpuMonitor, SessionMonitor};
use crate::application::format::format_duration;
use crate::domain::ports::clock::Clock;
use crate::domain::ports::config_source::ConfigSource;
use crate::domain::ports::shutdown::ShutdownSink;
use crate::domain::rules::{IdleVerdict, cpu_below_threshold, no_active_sessions};
use crate::domain::value_objects::{CpuMode, EffectiveConfig};

/// What a single evaluation tick concluded.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Auto mode without a calibrated threshold: nothing was evaluated.
    Learning { remaining: TimeDelta },
    /// At least one predicate did not hold.
    NotIdle {
        threshold: f64,
        cpu: IdleVerdict,
        sessions: IdleVerdict,
    },
    /// Both predicates held and the sink was invoked.
    ShutdownRequested { threshold: f64, delivered: bool },
}

impl TickOutcome {
    #[must_use]
    pub const fn shutdown_requested(&self) -> bool {
        matches!(self, Self::ShutdownRequested { .. })
    }
}

/// Threshold the tick runs with, or the learning time left.
enum ResolvedThreshold {
    Fixed(f64),
    Calibrated(f64),
    Learning(TimeDelta),
}

/// Orchestrates one evaluation: config → threshold → predicates → sink.
pub struct DecisionService {
    cpu: Arc<CpuMonitor>,
    sessions: Arc<SessionMonitor>,
    calibrator: SharedCalibrator,
    config_source: Arc<dyn ConfigSource>,
    sink: Arc<dyn ShutdownSink>,
    clock: Arc<dyn Clock>,
    last_config: EffectiveConfig,
}

impl DecisionService {
    /// `initial_config` is the configuration validated at startup; it is the
    /// fallback when a later reload fails.
    #[must_use]
    pub fn new(
        cpu: Arc<CpuMonitor>,
        sessions: Arc<SessionMonitor>,
        calibrator: SharedCalibrator,
        config_source: Arc<dyn ConfigSource>,
        sink: Arc<dyn ShutdownSink>,
        clock: Arc<dyn Clock>,
        initial_config: EffectiveConfig,
    ) -> Self {
        Self {
            cpu,
            sessions,
            calibrator,
            config_source,
            sink,
            clock,
            last_config: initial_config,
        }
    }

    /// Configuration used by the latest tick.
    #[must_use]
    pub const fn config(&self) -> &EffectiveConfig {
        &self.last_config
    }

    fn reload_config(&mut self) -> EffectiveConfig {
        match self.config_source.load() {
            Ok(config) => {
                if config != self.last_config {
                    tracing::info!(
                        "Configuration changed: mode {}, cpu window {} min, user window {} min",
                        config.mode,
                        config.cpu_check_minutes,
                        config.user_check_minutes
                    );
                }
                self.last_config = config;
            }
            Err(e) => {
                tracing::warn!("Config reload failed, keeping last known config: {e}");
            }
        }
        self.last_config
    }

    fn resolve_threshold(&self, config: &EffectiveConfig, now: DateTime<Utc>) -> ResolvedThreshold {
        match config.mode {
            CpuMode::Manual => ResolvedThreshold::Fixed(config.cpu_threshold),
            CpuMode::Auto => {
                let calibrator = self.calibrator.read().unwrap_or_else(PoisonError::into_inner);
                calibrator.current_threshold().map_or_else(
                    || ResolvedThreshold::Learning(calibrator.learning_time_remaining(now)),
                    ResolvedThreshold::Calibrated,
                )
            }
        }
    }

    /// Run one evaluation tick.
    ///
    /// The configuration is read once at the start; the threshold cannot
    /// change until the next tick.
    pub async fn run_once(&mut self) -> TickOutcome {
        let config = self.reload_config();
        let now = self.clock.now();

        let threshold = match self.resolve_threshold(&config, now) {
            ResolvedThreshold::Learning(remaining) => {
                tracing::info!(
                    "Learning phase: {} remaining, skipping shutdown evaluation",
                    format_duration(remaining)
                );
                return TickOutcome::Learning { remaining };
            }
            ResolvedThreshold::Fixed(threshold) | ResolvedThreshold::Calibrated(threshold) => {
                threshold
            }
        };

        tracing::debug!(
            "Evaluating: CPU={:.2}% (threshold={threshold:.0}%), sessions={}",
            self.cpu.current_usage(),
            self.sessions.current_count()
        );

        let cpu = cpu_below_threshold(
            &self.cpu.snapshot(),
            threshold,
            config.cpu_check_minutes,
            now,
        );
        let sessions = no_active_sessions(&self.sessions.snapshot(), config.user_check_minutes, now);
        tracing::debug!("CPU verdict: {cpu}; session verdict: {sessions}");

        if !(cpu.is_idle() && sessions.is_idle()) {
            return TickOutcome::NotIdle {
                threshold,
                cpu,
                sessions,
            };
        }

        tracing::warn!(
            "Shutdown triggered: CPU < {threshold:.0}% for {} min, 0 sessions for {} min",
            config.cpu_check_minutes,
            config.user_check_minutes
        );
        let reason = shutdown_reason(threshold, &config);
        let delivered = match self.sink.shutdown(&reason).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Shutdown request failed: {e}");
                false
            }
        };
        TickOutcome::ShutdownRequested {
            threshold,
            delivered,
        }
    }
}

fn shutdown_reason(threshold: f64, config: &EffectiveConfig) -> String {
    format!(
        "VM idle: CPU below {threshold:.0}% for {} min and no active sessions for {} min",
        config.cpu_check_minutes, config.user_check_minutes
    )
}
