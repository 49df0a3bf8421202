pub mod proc_stat;
pub mod who;

pub use proc_stat::ProcStatCpuSensor;
pub use who::WhoSessionSensor;
