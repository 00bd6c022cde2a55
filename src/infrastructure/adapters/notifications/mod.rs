pub mod http_notification_adapter;
pub mod system_notification_adapter;

// Re-export main adapters for convenience
pub use http_notification_adapter::HttpNotificationAdapter;
pub use system_notification_adapter::SystemNotificationAdapter;
