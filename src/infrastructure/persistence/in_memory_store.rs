use std::sync::{Mutex, PoisonError};

use crate::domain::entities::calibration::CalibrationState;
use crate::domain::ports::store::{CalibrationStore, StoreError};

/// In-memory calibration store for testing purposes.
///
/// `failing()` builds a store whose writes always fail, to exercise the
/// degraded "state will not survive a restart" path.
pub struct InMemoryStore {
    state: Mutex<Option<CalibrationState>>,
    fail_writes: bool,
    saves: Mutex<usize>,
}

impl InMemoryStore {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(None),
            fail_writes: false,
            saves: Mutex::new(0),
        }
    }

    #[must_use]
    pub const fn with_state(state: CalibrationState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
            fail_writes: false,
            saves: Mutex::new(0),
        }
    }

    #[must_use]
    pub const fn failing() -> Self {
        Self {
            state: Mutex::new(None),
            fail_writes: true,
            saves: Mutex::new(0),
        }
    }

    /// Number of successful `save` calls.
    #[must_use]
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Currently stored state, bypassing the port.
    #[must_use]
    pub fn stored(&self) -> Option<CalibrationState> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CalibrationStore for InMemoryStore {
    fn load(&self) -> Result<Option<CalibrationState>, StoreError> {
        Ok(self
            .state
            .lock()
            .map_err(|_| StoreError::ReadFailed("lock poisoned".into()))?
            .clone())
    }

    fn save(&self, state: &CalibrationState) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::WriteFailed("store is read-only".into()));
        }
        *self
            .state
            .lock()
            .map_err(|_| StoreError::WriteFailed("lock poisoned".into()))? = Some(state.clone());
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }
}
