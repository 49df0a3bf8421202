use std::collections::BTreeSet;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::sample::CpuCounters;

#[derive(Error, Debug)]
pub enum CollectionError {
    #[error("cpu counters unavailable: {0}")]
    CpuUnavailable(String),
    #[error("session list unavailable: {0}")]
    SessionsUnavailable(String),
    #[error("timeout while collecting data")]
    Timeout,
}

pub trait CpuSensor: Send + Sync {
    /// Read the current cumulative busy/idle tick counters.
    ///
    /// # Errors
    ///
    /// Returns `CollectionError` if the counters cannot be read or parsed.
    fn read_counters(&self) -> Result<CpuCounters, CollectionError>;
}

#[async_trait]
pub trait SessionSensor: Send + Sync {
    /// List the distinct identifiers of currently active sessions.
    ///
    /// # Errors
    ///
    /// Returns `CollectionError` if the session list cannot be obtained
    /// or the lookup times out.
    async fn active_sessions(&self) -> Result<BTreeSet<String>, CollectionError>;
}
