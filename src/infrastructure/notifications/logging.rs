use async_trait::async_trait;

use crate::domain::entities::calibration::CalibrationOutcome;
use crate::domain::ports::notifier::{NotificationError, ThresholdNotifier};

/// Records every applied threshold in the log. The decision loop reads the
/// calibrator on each tick, so nothing else is needed for the new value
/// to take effect.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl LogNotifier {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ThresholdNotifier for LogNotifier {
    async fn threshold_applied(
        &self,
        outcome: &CalibrationOutcome,
    ) -> Result<(), NotificationError> {
        tracing::info!(
            "cpu_threshold = {:.0}% in force from {} (baseline {:.2}%, stddev bound {:.1}, {} samples)",
            outcome.threshold,
            outcome.calibrated_at.format("%Y-%m-%d %H:%M UTC"),
            outcome.idle_baseline,
            outcome.stability_bound,
            outcome.samples_analyzed
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn logging_never_fails() {
        let outcome = CalibrationOutcome {
            calibrated_at: Utc::now(),
            idle_baseline: 0.8,
            threshold: 5.0,
            stability_bound: 1.0,
            samples_analyzed: 2880,
        };
        assert!(LogNotifier::new().threshold_applied(&outcome).await.is_ok());
    }
}
