use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShutdownError {
    #[error("failed to launch power-off command: {0}")]
    LaunchFailed(String),
    #[error("power-off command exited unsuccessfully: {0}")]
    CommandFailed(String),
    #[error("power-off command timed out")]
    Timeout,
}

#[async_trait]
pub trait ShutdownSink: Send + Sync {
    /// Power the machine off, recording `reason`.
    ///
    /// # Errors
    ///
    /// Returns `ShutdownError` if the power-off request could not be issued.
    async fn shutdown(&self, reason: &str) -> Result<(), ShutdownError>;
}
