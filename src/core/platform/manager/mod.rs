pub mod notification_service;
pub mod reconciliation;
pub mod scheduler;
