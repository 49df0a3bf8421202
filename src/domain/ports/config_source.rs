use thiserror::Error;

use crate::domain::value_objects::EffectiveConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    ReadFailed(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub trait ConfigSource: Send + Sync {
    /// Fetch the current configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the source cannot be read or does not parse.
    fn load(&self) -> Result<EffectiveConfig, ConfigError>;
}
