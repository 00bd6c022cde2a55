pub mod notification_port;
pub mod session_port;
