use chrono::{DateTime, Utc};

/// Source of "now", injected so time-driven logic can be tested.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
