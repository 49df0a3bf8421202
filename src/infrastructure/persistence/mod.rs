pub mod in_memory_store;
pub mod json_state_store;

pub use in_memory_store::InMemoryStore;
pub use json_state_store::JsonStateStore;
