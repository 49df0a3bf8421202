pub mod calibration;
pub mod sample;
pub mod sample_buffer;

pub use calibration::{CalibrationOutcome, CalibrationPhase, CalibrationState};
pub use sample::{CpuCounters, CpuSample, SessionSample, Timestamped};
pub use sample_buffer::{OutOfOrder, SampleBuffer};
