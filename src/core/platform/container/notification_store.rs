/*
Notification Store Container Module

The ordered, in-memory collection of notifications the dashboard renders. The sequence lives
behind an `Arc` and every mutation goes through `Arc::make_mut`, so a reader that grabbed the
sequence earlier keeps a consistent (older) view while the store moves on. Ids are unique
within the store after every operation.
*/

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::core::platform::container::notification::{Notification, NotificationId, ReadMark};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationStore {
    items: Arc<Vec<Notification>>,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<Notification>) -> Self {
        let mut store = Self::new();
        store.replace(records);
        store
    }

    /// Swaps in a new sequence. When an id repeats, the first occurrence wins.
    pub fn replace(&mut self, records: Vec<Notification>) {
        let mut seen = HashSet::with_capacity(records.len());
        let deduped: Vec<Notification> = records
            .into_iter()
            .filter(|record| seen.insert(record.id.clone()))
            .collect();
        self.items = Arc::new(deduped);
    }

    /// Shared handle to the current sequence
    pub fn records(&self) -> Arc<Vec<Notification>> {
        Arc::clone(&self.items)
    }

    pub fn as_slice(&self) -> &[Notification] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&Notification> {
        self.items.iter().find(|n| n.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn unread_ids(&self) -> Vec<NotificationId> {
        self.items
            .iter()
            .filter(|n| n.is_unread())
            .map(|n| n.id.clone())
            .collect()
    }

    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|n| n.is_unread()).count()
    }

    /// Sets `read` on one record. Returns the mark it replaced, or `None` for an unknown id.
    pub fn set_read(&mut self, id: &str, read: bool, at: DateTime<Utc>) -> Option<ReadMark> {
        let index = self.position(id)?;
        let items = Arc::make_mut(&mut self.items);
        Some(items[index].mark_read(read, at))
    }

    pub fn restore_read(&mut self, id: &str, mark: ReadMark) -> bool {
        match self.position(id) {
            Some(index) => {
                Arc::make_mut(&mut self.items)[index].restore(mark);
                true
            }
            None => false,
        }
    }

    /// Puts a record at the front. An existing record with the same id is replaced in place.
    pub fn prepend(&mut self, notification: Notification) {
        let position = self.position(&notification.id);
        let items = Arc::make_mut(&mut self.items);
        match position {
            Some(index) => items[index] = notification,
            None => items.insert(0, notification),
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Notification> {
        let index = self.position(id)?;
        Some(Arc::make_mut(&mut self.items).remove(index))
    }

    pub fn clear(&mut self) {
        self.items = Arc::new(Vec::new());
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|n| n.id == id)
    }
}

/// Immutable view of the store handed to readers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub notifications: Arc<Vec<Notification>>,
    pub loading: bool,
    pub error: Option<String>,
}

impl StoreSnapshot {
    pub fn get(&self, id: &str) -> Option<&Notification> {
        self.notifications.iter().find(|n| n.id == id)
    }

    pub fn unread_count(&self) -> usize {
        self.notifications.iter().filter(|n| n.is_unread()).count()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.notifications.iter().map(|n| n.id.as_str()).collect()
    }
}
