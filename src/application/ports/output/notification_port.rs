/*
Notification Ports

Output port for the remote notification resource. The sync engine talks to the notification API
exclusively through `NotificationGateway`; adapters decide how (HTTP, in-process double).

Every call takes the bearer credential explicitly. The engine checks for a credential before
calling and never reaches an adapter without one.

Gateway calls return plain snapshots and carry no sequence numbers, retries or deadlines. A call
resolves, fails, or stays pending.
*/

use std::fmt;

use async_trait::async_trait;

pub use crate::application::ports::output::session_port::Credential;
pub use crate::core::platform::container::notification::{Notification, NotificationDraft};

/// Result type for notification port operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors that can occur in notification port operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Notification not found: {0}")]
    NotFound(String),

    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// The gateway calls the engine issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOperation {
    List,
    UpdateRead,
    MarkAllRead,
    Create,
    Delete,
}

impl fmt::Display for GatewayOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GatewayOperation::List => "fetch notifications",
            GatewayOperation::UpdateRead => "mark as read",
            GatewayOperation::MarkAllRead => "mark all as read",
            GatewayOperation::Create => "create notification",
            GatewayOperation::Delete => "delete notification",
        };
        f.write_str(name)
    }
}

// ============================================================================
// OUTPUT PORTS (INTERFACES)
// ============================================================================

/// Remote notification resource
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    /// Adapter name used in log lines
    fn name(&self) -> &str;

    /// `GET /api/notifications`
    async fn list_notifications(&self, credential: &Credential) -> GatewayResult<Vec<Notification>>;

    /// `PUT /api/notifications/{id}` with `{"read": read}`. Any response body is ignored.
    async fn update_read(&self, credential: &Credential, id: &str, read: bool) -> GatewayResult<()>;

    /// `PUT /api/notifications/mark-all-read` with `{}`
    async fn mark_all_read(&self, credential: &Credential) -> GatewayResult<()>;

    /// `POST /api/notifications`, returning the record with its server-assigned id
    async fn create_notification(
        &self,
        credential: &Credential,
        draft: &NotificationDraft,
    ) -> GatewayResult<Notification>;

    /// `DELETE /api/notifications/{id}`
    async fn delete_notification(&self, credential: &Credential, id: &str) -> GatewayResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_messages() {
        let error = GatewayError::HttpStatus {
            status: 502,
            message: "bad gateway".to_string(),
        };
        assert_eq!(error.to_string(), "HTTP 502: bad gateway");
        assert_eq!(
            GatewayError::NotFound("n-1".to_string()).to_string(),
            "Notification not found: n-1"
        );
    }

    #[test]
    fn test_operation_display() {
        assert_eq!(GatewayOperation::MarkAllRead.to_string(), "mark all as read");
        assert_eq!(GatewayOperation::List.to_string(), "fetch notifications");
    }
}
