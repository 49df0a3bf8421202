//! Idle-baseline discovery: find the quietest stable stretch of CPU history
//! and turn it into an operating threshold.

use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;

use crate::domain::entities::calibration::CalibrationOutcome;
use crate::domain::entities::sample::CpuSample;

/// Added to the idle baseline to obtain the threshold (percentage points).
pub const THRESHOLD_BUFFER: f64 = 3.0;
/// Floor for any calibrated threshold (percent).
pub const MIN_THRESHOLD: f64 = 5.0;
/// Standard-deviation bounds tried in order: truly flat, then merely stable.
pub const STABILITY_BOUNDS: [f64; 2] = [1.0, 2.0];
/// Length of each sliding window.
pub const WINDOW_MINUTES: i64 = 30;
/// Windows with fewer samples are too sparse to trust.
pub const MIN_WINDOW_SAMPLES: usize = 5;
/// Fewer samples than this in the lookback and the run is not attempted.
pub const MIN_CALIBRATION_SAMPLES: usize = 10;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("insufficient samples ({found}, need {required})")]
    InsufficientSamples { found: usize, required: usize },
    #[error("no stable idle window found (stddev always >= {max_stddev:.1}%)")]
    NoStableWindow { max_stddev: f64 },
}

/// Statistics of one sliding window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    pub start: DateTime<Utc>,
    pub samples: usize,
    pub mean: f64,
    /// Population standard deviation.
    pub stddev: f64,
}

/// The quietest stable window found, and the bound it was accepted under.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdleBaseline {
    pub mean: f64,
    pub stability_bound: f64,
    pub window_start: DateTime<Utc>,
}

#[allow(clippy::cast_precision_loss)]
fn mean_and_stddev(window: &[CpuSample]) -> (f64, f64) {
    let n = window.len() as f64;
    let mean = window.iter().map(|s| s.usage_percent).sum::<f64>() / n;
    let variance = window
        .iter()
        .map(|s| {
            let d = s.usage_percent - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (mean, variance.sqrt())
}

/// Every window that starts at a sample and spans the following
/// [`WINDOW_MINUTES`], skipping those with fewer than [`MIN_WINDOW_SAMPLES`].
///
/// `samples` must be sorted oldest first.
#[must_use]
pub fn sliding_windows(samples: &[CpuSample]) -> Vec<WindowStats> {
    let span = TimeDelta::minutes(WINDOW_MINUTES);
    let mut windows = Vec::new();
    let mut end = 0;

    for (start, first) in samples.iter().enumerate() {
        let limit = first.timestamp + span;
        end = end.max(start);
        while end < samples.len() && samples[end].timestamp < limit {
            end += 1;
        }

        let window = &samples[start..end];
        if window.len() < MIN_WINDOW_SAMPLES {
            continue;
        }
        let (mean, stddev) = mean_and_stddev(window);
        windows.push(WindowStats {
            start: first.timestamp,
            samples: window.len(),
            mean,
            stddev,
        });
    }
    windows
}

/// Lowest window mean among windows under the tightest stability bound that
/// admits at least one window.
///
/// # Errors
///
/// Returns `CalibrationError::NoStableWindow` if no window passes even the
/// loosest bound.
pub fn find_idle_baseline(samples: &[CpuSample]) -> Result<IdleBaseline, CalibrationError> {
    let windows = sliding_windows(samples);

    for bound in STABILITY_BOUNDS {
        let quietest = windows
            .iter()
            .filter(|w| w.stddev < bound)
            .min_by(|a, b| a.mean.total_cmp(&b.mean));

        if let Some(window) = quietest {
            tracing::debug!(
                "Idle baseline {:.2}% from window at {} (stddev {:.2} < {bound:.1})",
                window.mean,
                window.start.to_rfc3339(),
                window.stddev
            );
            return Ok(IdleBaseline {
                mean: window.mean,
                stability_bound: bound,
                window_start: window.start,
            });
        }
        tracing::debug!("No stable window with stddev < {bound:.1}%, loosening");
    }

    Err(CalibrationError::NoStableWindow {
        max_stddev: STABILITY_BOUNDS[STABILITY_BOUNDS.len() - 1],
    })
}

/// Threshold for a given idle baseline: baseline plus buffer, floored, rounded
/// to a whole percent.
#[must_use]
pub fn threshold_for(idle_baseline: f64) -> f64 {
    (idle_baseline + THRESHOLD_BUFFER).max(MIN_THRESHOLD).round()
}

/// Run the full procedure on the samples newer than `now - lookback`.
///
/// # Errors
///
/// Returns `CalibrationError::InsufficientSamples` when the lookback holds
/// fewer than [`MIN_CALIBRATION_SAMPLES`] samples, or
/// `CalibrationError::NoStableWindow` when no stable window exists.
pub fn calibrate(
    samples: &[CpuSample],
    lookback: TimeDelta,
    now: DateTime<Utc>,
) -> Result<CalibrationOutcome, CalibrationError> {
    let recent = now.checked_sub_signed(lookback).map_or(samples, |cutoff| {
        let start = samples.partition_point(|s| s.timestamp <= cutoff);
        &samples[start..]
    });

    if recent.len() < MIN_CALIBRATION_SAMPLES {
        return Err(CalibrationError::InsufficientSamples {
            found: recent.len(),
            required: MIN_CALIBRATION_SAMPLES,
        });
    }

    tracing::info!(
        "Calibrating on {} samples from the last {}h",
        recent.len(),
        lookback.num_hours()
    );

    let baseline = find_idle_baseline(recent)?;
    let threshold = threshold_for(baseline.mean);

    Ok(CalibrationOutcome {
        calibrated_at: now,
        idle_baseline: baseline.mean,
        threshold,
        stability_bound: baseline.stability_bound,
        samples_analyzed: recent.len(),
    })
}
