pub mod clock;
pub mod config_source;
pub mod notifier;
pub mod sensor;
pub mod shutdown;
pub mod store;

pub use clock::Clock;
pub use config_source::{ConfigError, ConfigSource};
pub use notifier::{NotificationError, ThresholdNotifier};
pub use sensor::{CollectionError, CpuSensor, SessionSensor};
pub use shutdown::{ShutdownError, ShutdownSink};
pub use store::{CalibrationStore, StoreError};
