pub mod shutdown;

pub use shutdown::{DryRunShutdown, SystemShutdown};
