use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::ports::sensor::{CollectionError, SessionSensor};

const WHO_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum stderr bytes included in error messages.
const MAX_STDERR_BYTES: usize = 512;

/// Active sessions as reported by `who`: one distinct entry per user name.
pub struct WhoSessionSensor {
    timeout: Duration,
}

impl WhoSessionSensor {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout: WHO_TIMEOUT,
        }
    }
}

impl Default for WhoSessionSensor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionSensor for WhoSessionSensor {
    async fn active_sessions(&self) -> Result<BTreeSet<String>, CollectionError> {
        let output = tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new("who").kill_on_drop(true).output(),
        )
        .await
        .map_err(|_| CollectionError::Timeout)?
        .map_err(|e| CollectionError::SessionsUnavailable(format!("failed to run who: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(
                &output.stderr[..output.stderr.len().min(MAX_STDERR_BYTES)],
            );
            return Err(CollectionError::SessionsUnavailable(format!(
                "who exited with {}: {stderr}",
                output.status
            )));
        }

        Ok(parse_who_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Distinct user names from the first column of `who` output.
#[must_use]
pub fn parse_who_output(stdout: &str) -> BTreeSet<String> {
    stdout
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_owned)
        .collect()
}
