// src/error.rs
use thiserror::Error;

use crate::application::ports::output::notification_port::{GatewayError, GatewayOperation};
use crate::core::platform::container::notification::NotificationDomainError;

pub type SyncResult<T> = Result<T, SyncError>;

/// Errors surfaced by the sync engine.
///
/// A missing credential is not an error; operations report it through their outcome instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Failed to {operation}: {source}")]
    Transport {
        operation: GatewayOperation,
        #[source]
        source: GatewayError,
    },

    #[error("Invalid notification: {0}")]
    InvalidDraft(#[from] NotificationDomainError),
}

impl SyncError {
    pub fn transport(operation: GatewayOperation, source: GatewayError) -> Self {
        SyncError::Transport { operation, source }
    }

    pub fn operation(&self) -> Option<GatewayOperation> {
        match self {
            SyncError::Transport { operation, .. } => Some(*operation),
            SyncError::InvalidDraft(_) => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse settings file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid setting '{key}': {message}")]
    Invalid { key: &'static str, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_message_names_operation() {
        let error = SyncError::transport(
            GatewayOperation::Delete,
            GatewayError::ServiceUnavailable("down".to_string()),
        );

        assert_eq!(
            error.to_string(),
            "Failed to delete notification: Service unavailable: down"
        );
        assert_eq!(error.operation(), Some(GatewayOperation::Delete));
    }

    #[test]
    fn test_invalid_draft_from_domain_error() {
        let error: SyncError = NotificationDomainError::EmptyField("message").into();
        assert!(matches!(error, SyncError::InvalidDraft(_)));
        assert_eq!(error.operation(), None);
    }
}
