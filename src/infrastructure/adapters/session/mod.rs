pub mod memory_session_adapter;

pub use memory_session_adapter::SessionCredentials;
