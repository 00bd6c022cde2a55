/*
System Notification Adapter

An in-process implementation of the NotificationGateway port. It plays the part of the
notification API without a network: records live in memory and behave the way the server
treats them (server-assigned ids, mark-all-read touching every record, delete removing).

Besides backing the CLI's offline mode, the adapter is the engine's test double:

- `fail` / `recover` make a given operation return an error
- `hold` / `release` park calls of a given operation until released, which lets a test observe
  the engine while a request is in flight
- every call is recorded in order and can be inspected with `calls` / `call_count`
- `set_server_read`, `insert` and `remove` change server-side state behind the engine's back,
  as another client would
*/

use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::watch;
use uuid::Uuid;

use crate::application::ports::output::notification_port::{
    Credential, GatewayError, GatewayOperation, GatewayResult, Notification, NotificationDraft,
    NotificationGateway,
};

/// In-memory notification gateway
#[derive(Debug)]
pub struct SystemNotificationAdapter {
    records: RwLock<Vec<Notification>>,
    failing: RwLock<HashSet<GatewayOperation>>,
    calls: RwLock<Vec<GatewayOperation>>,
    held: watch::Sender<HashSet<GatewayOperation>>,
}

impl Default for SystemNotificationAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn unavailable<T>(_: T) -> GatewayError {
    GatewayError::ServiceUnavailable("Notification storage unavailable".to_string())
}

impl SystemNotificationAdapter {
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    /// Creates the adapter with server-side records already present
    pub fn with_records(records: Vec<Notification>) -> Self {
        let (held, _) = watch::channel(HashSet::new());
        Self {
            records: RwLock::new(records),
            failing: RwLock::new(HashSet::new()),
            calls: RwLock::new(Vec::new()),
            held,
        }
    }

    /// Server-side records, in server order
    pub fn records(&self) -> GatewayResult<Vec<Notification>> {
        Ok(self.records.read().map_err(unavailable)?.clone())
    }

    pub fn insert(&self, notification: Notification) -> GatewayResult<()> {
        let mut records = self.records.write().map_err(unavailable)?;
        records.retain(|n| n.id != notification.id);
        records.insert(0, notification);
        Ok(())
    }

    pub fn remove(&self, id: &str) -> GatewayResult<bool> {
        let mut records = self.records.write().map_err(unavailable)?;
        let before = records.len();
        records.retain(|n| n.id != id);
        Ok(records.len() != before)
    }

    /// Changes a record's read flag without going through the engine
    pub fn set_server_read(&self, id: &str, read: bool) -> GatewayResult<()> {
        let mut records = self.records.write().map_err(unavailable)?;
        let record = records
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
        record.mark_read(read, Utc::now());
        Ok(())
    }

    /// Makes every following call of `operation` fail
    pub fn fail(&self, operation: GatewayOperation) {
        if let Ok(mut failing) = self.failing.write() {
            failing.insert(operation);
        }
    }

    pub fn recover(&self, operation: GatewayOperation) {
        if let Ok(mut failing) = self.failing.write() {
            failing.remove(&operation);
        }
    }

    /// Parks calls of `operation` until `release` is called
    pub fn hold(&self, operation: GatewayOperation) {
        self.held.send_modify(|held| {
            held.insert(operation);
        });
    }

    pub fn release(&self, operation: GatewayOperation) {
        self.held.send_modify(|held| {
            held.remove(&operation);
        });
    }

    /// Every call made so far, in the order it arrived
    pub fn calls(&self) -> Vec<GatewayOperation> {
        self.calls.read().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn call_count(&self, operation: GatewayOperation) -> usize {
        self.calls().iter().filter(|call| **call == operation).count()
    }

    /// Records the call, waits out any hold, then applies failure injection and the
    /// credential check
    async fn enter(&self, operation: GatewayOperation, credential: &Credential) -> GatewayResult<()> {
        self.calls.write().map_err(unavailable)?.push(operation);

        let mut held = self.held.subscribe();
        held.wait_for(|held| !held.contains(&operation))
            .await
            .map_err(unavailable)?;

        if self.failing.read().map_err(unavailable)?.contains(&operation) {
            return Err(GatewayError::ServiceUnavailable(format!(
                "{} rejected by the system adapter",
                operation
            )));
        }
        if credential.is_blank() {
            return Err(GatewayError::AuthenticationError("empty bearer token".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// PORT IMPLEMENTATIONS
// ============================================================================

#[async_trait]
impl NotificationGateway for SystemNotificationAdapter {
    fn name(&self) -> &str {
        "system"
    }

    async fn list_notifications(&self, credential: &Credential) -> GatewayResult<Vec<Notification>> {
        self.enter(GatewayOperation::List, credential).await?;
        self.records()
    }

    async fn update_read(&self, credential: &Credential, id: &str, read: bool) -> GatewayResult<()> {
        self.enter(GatewayOperation::UpdateRead, credential).await?;
        self.set_server_read(id, read)
    }

    async fn mark_all_read(&self, credential: &Credential) -> GatewayResult<()> {
        self.enter(GatewayOperation::MarkAllRead, credential).await?;
        let now = Utc::now();
        let mut records = self.records.write().map_err(unavailable)?;
        for record in records.iter_mut().filter(|n| n.is_unread()) {
            record.mark_read(true, now);
        }
        Ok(())
    }

    async fn create_notification(
        &self,
        credential: &Credential,
        draft: &NotificationDraft,
    ) -> GatewayResult<Notification> {
        self.enter(GatewayOperation::Create, credential).await?;
        let created = draft
            .clone()
            .into_notification(Uuid::new_v4().to_string(), Utc::now());
        self.insert(created.clone())?;
        Ok(created)
    }

    async fn delete_notification(&self, credential: &Credential, id: &str) -> GatewayResult<()> {
        self.enter(GatewayOperation::Delete, credential).await?;
        if self.remove(id)? {
            Ok(())
        } else {
            Err(GatewayError::NotFound(id.to_string()))
        }
    }
}
