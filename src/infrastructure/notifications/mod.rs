pub mod composite;
pub mod logging;
pub mod systemd;

pub use composite::CompositeNotifier;
pub use logging::LogNotifier;
pub use systemd::SystemdRestartNotifier;
