//! Pure decision rules over sample history. No I/O, no clocks: callers pass `now`.

pub mod idle;

pub use idle::{IdleVerdict, cpu_below_threshold, no_active_sessions, required_samples};
