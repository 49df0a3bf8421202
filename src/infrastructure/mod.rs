pub mod clock;
pub mod notifications;
pub mod os;
pub mod persistence;
pub mod sensors;
