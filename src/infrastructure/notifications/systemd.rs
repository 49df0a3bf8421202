use std::time::Duration;

use async_trait::async_trait;

use crate::domain::entities::calibration::CalibrationOutcome;
use crate::domain::ports::notifier::{NotificationError, ThresholdNotifier};

const RESTART_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum output bytes included in error messages.
const MAX_OUTPUT_BYTES: usize = 512;

/// Restarts a systemd unit after every calibration so the whole service
/// starts over with the new threshold.
pub struct SystemdRestartNotifier {
    unit: String,
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl SystemdRestartNotifier {
    #[must_use]
    pub fn new(unit: &str) -> Self {
        Self {
            unit: unit.to_owned(),
            program: "systemctl".to_owned(),
            args: vec!["restart".to_owned(), unit.to_owned()],
            timeout: RESTART_TIMEOUT,
        }
    }

    /// Run another command in place of `systemctl restart <unit>`.
    #[must_use]
    pub fn with_command(mut self, program: &str, args: &[&str]) -> Self {
        self.program = program.to_owned();
        self.args = args.iter().map(|a| (*a).to_owned()).collect();
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn unit(&self) -> &str {
        &self.unit
    }

    fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl ThresholdNotifier for SystemdRestartNotifier {
    async fn threshold_applied(
        &self,
        _outcome: &CalibrationOutcome,
    ) -> Result<(), NotificationError> {
        tracing::info!("Restarting {} to apply new threshold", self.unit);
        let output = match tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new(&self.program)
                .args(&self.args)
                .kill_on_drop(true)
                .output(),
        )
        .await
        {
            Err(_) => {
                return Err(NotificationError::Timeout(format!(
                    "{} after {:?}",
                    self.command_line(),
                    self.timeout
                )));
            }
            Ok(Ok(o)) => o,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(NotificationError::ChannelUnavailable(format!(
                    "{} not found",
                    self.program
                )));
            }
            Ok(Err(e)) => {
                return Err(NotificationError::SendFailed(format!(
                    "failed to run {}: {e}",
                    self.program
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(
                &output.stderr[..output.stderr.len().min(MAX_OUTPUT_BYTES)],
            );
            return Err(NotificationError::SendFailed(format!(
                "{} exited with {}: {}",
                self.command_line(),
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}
