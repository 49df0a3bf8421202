use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::calibration::CalibrationOutcome;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("failed to send notification: {0}")]
    SendFailed(String),
    #[error("notification channel unavailable: {0}")]
    ChannelUnavailable(String),
    #[error("notification timed out: {0}")]
    Timeout(String),
}

/// Told when a freshly calibrated threshold is in force, so the host can
/// react (log it, restart the service, ...).
#[async_trait]
pub trait ThresholdNotifier: Send + Sync {
    /// # Errors
    ///
    /// Returns `NotificationError` if the notification fails to send,
    /// the channel is unavailable, or it does not finish in time.
    async fn threshold_applied(
        &self,
        outcome: &CalibrationOutcome,
    ) -> Result<(), NotificationError>;
}
