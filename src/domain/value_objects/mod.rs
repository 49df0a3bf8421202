pub mod calibration_timings;
pub mod cpu_mode;
pub mod effective_config;

pub use calibration_timings::CalibrationTimings;
pub use cpu_mode::CpuMode;
pub use effective_config::EffectiveConfig;
