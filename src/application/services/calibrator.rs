//! Learning / calibrated state machine around the persisted calibration record.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, TimeDelta, Utc};

use super::baseline::calibrate;
use super::sampler::CpuMonitor;
use crate::domain::entities::calibration::{CalibrationOutcome, CalibrationPhase, CalibrationState};
use crate::domain::ports::notifier::ThresholdNotifier;
use crate::domain::ports::store::CalibrationStore;
use crate::domain::value_objects::CalibrationTimings;

/// Calibrator shared between the calibration-check task (single writer)
/// and the decision loop (reader).
pub type SharedCalibrator = Arc<RwLock<Calibrator>>;

/// Which transition a calibration run would fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationRun {
    /// First run, ends the learning phase.
    Initial,
    /// Periodic refresh of an already calibrated threshold.
    Recalibration,
}

impl CalibrationRun {
    #[must_use]
    pub const fn lookback(self, timings: &CalibrationTimings) -> TimeDelta {
        match self {
            Self::Initial => timings.initial_lookback,
            Self::Recalibration => timings.recalibration_lookback,
        }
    }
}

impl std::fmt::Display for CalibrationRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initial => write!(f, "initial calibration"),
            Self::Recalibration => write!(f, "recalibration"),
        }
    }
}

pub struct Calibrator {
    store: Arc<dyn CalibrationStore>,
    timings: CalibrationTimings,
    state: CalibrationState,
}

impl Calibrator {
    /// Load the persisted state, or start a learning phase at `now` when
    /// there is none (or it cannot be decoded).
    pub fn open(
        store: Arc<dyn CalibrationStore>,
        timings: CalibrationTimings,
        now: DateTime<Utc>,
    ) -> Self {
        let loaded = store.load().unwrap_or_else(|e| {
            tracing::warn!("Ignoring calibration state, starting a new learning phase: {e}");
            None
        });

        match loaded {
            Some(state) => {
                tracing::info!(
                    "Loaded calibration state ({}, started {})",
                    state.phase(),
                    state.start_time.to_rfc3339()
                );
                Self {
                    store,
                    timings,
                    state,
                }
            }
            None => {
                tracing::info!("No calibration state found, entering learning phase");
                let calibrator = Self {
                    store,
                    timings,
                    state: CalibrationState::fresh(now),
                };
                calibrator.persist();
                calibrator
            }
        }
    }

    #[must_use]
    pub const fn state(&self) -> &CalibrationState {
        &self.state
    }

    #[must_use]
    pub const fn timings(&self) -> &CalibrationTimings {
        &self.timings
    }

    #[must_use]
    pub const fn phase(&self) -> CalibrationPhase {
        self.state.phase()
    }

    #[must_use]
    pub const fn is_learning(&self) -> bool {
        !self.state.initial_done
    }

    /// Time left before the first calibration is attempted, never negative.
    #[must_use]
    pub fn learning_time_remaining(&self, now: DateTime<Utc>) -> TimeDelta {
        self.state.learning_time_remaining(&self.timings, now)
    }

    #[must_use]
    pub fn should_run_initial(&self, now: DateTime<Utc>) -> bool {
        self.is_learning() && now - self.state.start_time >= self.timings.initial_lookback
    }

    #[must_use]
    pub fn should_run_recalibration(&self, now: DateTime<Utc>) -> bool {
        self.state.initial_done
            && self
                .state
                .last_calibration_time
                .is_none_or(|last| now - last >= self.timings.recalibration_interval)
    }

    /// The transition due at `now`, if any. At most one can be due.
    #[must_use]
    pub fn due_run(&self, now: DateTime<Utc>) -> Option<CalibrationRun> {
        if self.should_run_initial(now) {
            Some(CalibrationRun::Initial)
        } else if self.should_run_recalibration(now) {
            Some(CalibrationRun::Recalibration)
        } else {
            None
        }
    }

    /// Threshold in force, `None` while learning.
    #[must_use]
    pub const fn current_threshold(&self) -> Option<f64> {
        if self.state.initial_done {
            Some(self.state.current_threshold)
        } else {
            None
        }
    }

    /// Earliest time the next run becomes due.
    #[must_use]
    pub fn next_calibration_at(&self) -> DateTime<Utc> {
        self.state.next_calibration_at(&self.timings)
    }

    /// Put a successful outcome in force and persist it.
    ///
    /// Returns `false` when the state could not be written; the in-memory
    /// state is updated regardless.
    pub fn apply(&mut self, outcome: &CalibrationOutcome) -> bool {
        let first = self.is_learning();
        let previous = self.state.current_threshold;

        self.state.initial_done = true;
        self.state.last_calibration_time = Some(outcome.calibrated_at);
        self.state.current_threshold = outcome.threshold;
        self.state.idle_baseline = outcome.idle_baseline;

        if first {
            tracing::info!(
                "Learning phase complete: idle baseline {:.2}%, threshold {:.0}%",
                outcome.idle_baseline,
                outcome.threshold
            );
        } else {
            tracing::info!(
                "Recalibrated: idle baseline {:.2}%, threshold {:.0}% (was {:.0}%)",
                outcome.idle_baseline,
                outcome.threshold,
                previous
            );
        }

        self.persist()
    }

    fn persist(&self) -> bool {
        match self.store.save(&self.state) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Calibration state not saved, it will not survive a restart: {e}");
                false
            }
        }
    }
}

/// One tick of the calibration-check task.
///
/// The statistics run on the blocking pool, outside the calibrator lock;
/// the write lock is only held to apply the outcome, and released before
/// the notifier is awaited.
pub async fn run_calibration_check(
    calibrator: &RwLock<Calibrator>,
    cpu: &CpuMonitor,
    notifier: &dyn ThresholdNotifier,
    now: DateTime<Utc>,
) -> Option<CalibrationOutcome> {
    let (due, lookback) = {
        let guard = calibrator.read().unwrap_or_else(PoisonError::into_inner);
        let due = guard.due_run(now)?;
        (due, due.lookback(guard.timings()))
    };

    tracing::info!("Running {due}");
    let samples = cpu.snapshot();
    let outcome =
        match tokio::task::spawn_blocking(move || calibrate(&samples, lookback, now)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                tracing::warn!("{due} deferred to next check: {e}");
                return None;
            }
            Err(e) => {
                tracing::error!("{due} aborted: {e}");
                return None;
            }
        };

    calibrator
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .apply(&outcome);

    if let Err(e) = notifier.threshold_applied(&outcome).await {
        tracing::warn!("Threshold notification failed: {e}");
    }
    Some(outcome)
}
