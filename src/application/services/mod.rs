pub mod baseline;
pub mod calibrator;
pub mod decision;
pub mod sampler;

pub use calibrator::{Calibrator, SharedCalibrator, run_calibration_check};
pub use decision::{DecisionService, TickOutcome};
pub use sampler::{CpuMonitor, SessionMonitor};
