pub mod config;
pub mod format;
pub mod services;
