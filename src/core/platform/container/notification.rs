/*
Notification Container Module

A Notification is a single compliance alert addressed to a dashboard user. Records are owned by
the remote notification API: the server assigns the `id` and `createdAt`, and the sync engine
only ever changes the `read` flag and `updatedAt` locally.

A NotificationDraft is the create payload, i.e. a Notification without the server-assigned
fields. Drafts are validated before they are sent so that obviously broken requests never reach
the gateway.

Wire format is camelCase JSON with the category carried in a `type` field:

    {"id":"n-1","owner":"u-7","type":"deadline","message":"...","createdAt":"...","read":false}
*/

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Server-assigned notification identifier.
pub type NotificationId = String;

/// Errors raised while building notification values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationDomainError {
    #[error("Notification field '{0}' must not be empty")]
    EmptyField(&'static str),
}

/// A notification as stored by the engine and returned by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub owner: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// The `read` flag together with the timestamp it was last changed at.
///
/// Captured before an optimistic write so a failed write can be undone exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadMark {
    pub read: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Notification {
    /// Builds an unread notification created now. Mostly useful for adapters and tests; real
    /// records come from the server.
    pub fn new(
        id: impl Into<NotificationId>,
        owner: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            owner: owner.into(),
            kind: kind.into(),
            message: message.into(),
            created_at: Utc::now(),
            read: false,
            updated_at: None,
        }
    }

    pub fn with_read(mut self, read: bool) -> Self {
        self.read = read;
        self
    }

    pub fn is_unread(&self) -> bool {
        !self.read
    }

    pub fn read_mark(&self) -> ReadMark {
        ReadMark {
            read: self.read,
            updated_at: self.updated_at,
        }
    }

    /// Sets the read flag and stamps `updated_at`, returning the previous mark
    pub fn mark_read(&mut self, read: bool, at: DateTime<Utc>) -> ReadMark {
        let previous = self.read_mark();
        self.read = read;
        self.updated_at = Some(at);
        previous
    }

    pub fn restore(&mut self, mark: ReadMark) {
        self.read = mark.read;
        self.updated_at = mark.updated_at;
    }
}

/// Create payload: a notification minus `id` and `createdAt`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDraft {
    pub owner: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl NotificationDraft {
    pub fn new(
        owner: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<Self, NotificationDomainError> {
        let draft = Self {
            owner: owner.into(),
            kind: kind.into(),
            message: message.into(),
            read: false,
            updated_at: None,
        };
        draft.validate()?;
        Ok(draft)
    }

    /// Checks the required text fields are present
    pub fn validate(&self) -> Result<(), NotificationDomainError> {
        if self.owner.trim().is_empty() {
            return Err(NotificationDomainError::EmptyField("owner"));
        }
        if self.kind.trim().is_empty() {
            return Err(NotificationDomainError::EmptyField("type"));
        }
        if self.message.trim().is_empty() {
            return Err(NotificationDomainError::EmptyField("message"));
        }
        Ok(())
    }

    /// Materializes the draft the way the server does on create
    pub fn into_notification(self, id: NotificationId, created_at: DateTime<Utc>) -> Notification {
        Notification {
            id,
            owner: self.owner,
            kind: self.kind,
            message: self.message,
            created_at,
            read: self.read,
            updated_at: self.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_deserialize_api_payload() {
        let json = serde_json::json!({
            "id": "n-1",
            "owner": "user-7",
            "type": "deadline",
            "message": "SOC 2 evidence due Friday",
            "createdAt": "2024-03-01T09:30:00Z"
        });

        let notification: Notification = serde_json::from_value(json).unwrap();

        assert_eq!(notification.id, "n-1");
        assert_eq!(notification.kind, "deadline");
        assert!(!notification.read);
        assert!(notification.updated_at.is_none());
        assert_eq!(
            notification.created_at,
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_serialize_uses_wire_field_names() {
        let notification = Notification::new("n-2", "user-1", "policy", "Policy updated");
        let value = serde_json::to_value(&notification).unwrap();

        assert_eq!(value["type"], "policy");
        assert!(value.get("createdAt").is_some());
        assert!(value.get("updatedAt").is_none());
        assert!(value.get("kind").is_none());
    }

    #[test]
    fn test_mark_read_returns_previous_mark() {
        let mut notification = Notification::new("n-3", "user-1", "audit", "Audit scheduled");
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let previous = notification.mark_read(true, at);

        assert_eq!(previous, ReadMark { read: false, updated_at: None });
        assert!(notification.read);
        assert_eq!(notification.updated_at, Some(at));

        notification.restore(previous);
        assert!(notification.is_unread());
        assert!(notification.updated_at.is_none());
    }

    #[test]
    fn test_draft_validation() {
        assert!(NotificationDraft::new("user-1", "deadline", "Upload evidence").is_ok());
        assert_eq!(
            NotificationDraft::new("user-1", "deadline", "   ").unwrap_err(),
            NotificationDomainError::EmptyField("message")
        );
        assert_eq!(
            NotificationDraft::new("", "deadline", "x").unwrap_err(),
            NotificationDomainError::EmptyField("owner")
        );
    }

    #[test]
    fn test_draft_serializes_without_server_fields() {
        let draft = NotificationDraft::new("user-1", "reminder", "Review controls").unwrap();
        let value = serde_json::to_value(&draft).unwrap();

        assert!(value.get("id").is_none());
        assert!(value.get("createdAt").is_none());
        assert_eq!(value["type"], "reminder");
        assert_eq!(value["read"], false);
    }
}
