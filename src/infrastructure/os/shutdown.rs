use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::ports::shutdown::{ShutdownError, ShutdownSink};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum stderr bytes included in error messages.
const MAX_STDERR_BYTES: usize = 512;

fn audit(reason: &str) {
    tracing::warn!("=== SHUTDOWN INITIATED ===");
    tracing::warn!("Time: {}", Utc::now().to_rfc3339());
    tracing::warn!("Reason: {reason}");
}

/// Powers the machine off with `shutdown -h now`.
pub struct SystemShutdown {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl SystemShutdown {
    #[must_use]
    pub fn new() -> Self {
        Self::with_command("shutdown", &["-h", "now"])
    }

    /// Run another command in place of `shutdown -h now`.
    #[must_use]
    pub fn with_command(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_owned(),
            args: args.iter().map(|a| (*a).to_owned()).collect(),
            timeout: SHUTDOWN_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for SystemShutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ShutdownSink for SystemShutdown {
    async fn shutdown(&self, reason: &str) -> Result<(), ShutdownError> {
        audit(reason);

        let output = tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new(&self.program)
                .args(&self.args)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| ShutdownError::Timeout)?
        .map_err(|e| ShutdownError::LaunchFailed(format!("{}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(
                &output.stderr[..output.stderr.len().min(MAX_STDERR_BYTES)],
            );
            return Err(ShutdownError::CommandFailed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Logs the request and reports success without touching the machine.
#[derive(Debug, Default)]
pub struct DryRunShutdown;

impl DryRunShutdown {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ShutdownSink for DryRunShutdown {
    async fn shutdown(&self, reason: &str) -> Result<(), ShutdownError> {
        audit(reason);
        tracing::warn!("[DRY RUN] Would execute: shutdown -h now");
        Ok(())
    }
}
