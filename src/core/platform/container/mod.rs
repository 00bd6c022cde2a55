pub mod notification;
pub mod notification_store;
pub mod sync_state;
