use thiserror::Error;

use crate::domain::entities::calibration::CalibrationState;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage read failed: {0}")]
    ReadFailed(String),
    #[error("storage write failed: {0}")]
    WriteFailed(String),
    #[error("stored state is corrupt: {0}")]
    Corrupt(String),
}

pub trait CalibrationStore: Send + Sync {
    /// Load the persisted calibration state, `None` if nothing was ever saved.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the state exists but cannot be read or decoded.
    fn load(&self) -> Result<Option<CalibrationState>, StoreError>;

    /// Persist `state`, replacing any previous record atomically.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the write operation fails.
    fn save(&self, state: &CalibrationState) -> Result<(), StoreError>;
}
