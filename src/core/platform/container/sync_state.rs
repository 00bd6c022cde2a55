/*
Sync State Container Module

Tracks optimistic writes per notification. Every notification is in exactly one of three sync
states:

- Synced: no local assertion outstanding (no tracker entry)
- PendingWrite: a write is in flight; the asserted `read` value, the value it replaced and any
  confirmed assertion it superseded are remembered so a failure can be rolled back. Fetches that
  run while the write is in flight record what the server reported for the id.
- Confirmed: the server accepted the write but no fetched snapshot has reflected it yet; the
  asserted value keeps winning over stale polls until it does

A PendingWrite id is what the dashboard calls the "pending set"; PendingWrite and Confirmed ids
together form the "local overrides".
*/

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::platform::container::notification::{NotificationId, ReadMark};

/// Decides whether an unforced fetch may run while writes are in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollGate {
    /// Any in-flight write anywhere defers the poll for the whole store.
    #[default]
    Global,
    /// Polls always run; only the ids with a write in flight keep their local value.
    PerId,
}

/// Tracker entry for a notification with an outstanding local assertion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    PendingWrite {
        asserted_read: bool,
        previous: ReadMark,
        /// Confirmed assertion this write replaced
        superseded: Option<bool>,
        /// `read` as last reported by the server while the write was in flight
        server_read: Option<bool>,
    },
    Confirmed { asserted_read: bool },
}

impl MutationState {
    pub fn asserted_read(&self) -> bool {
        match self {
            MutationState::PendingWrite { asserted_read, .. } => *asserted_read,
            MutationState::Confirmed { asserted_read } => *asserted_read,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, MutationState::PendingWrite { .. })
    }
}

/// Public per-notification sync status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncStatus {
    Synced,
    PendingWrite { asserted_read: bool },
    Confirmed { asserted_read: bool },
}

impl From<Option<&MutationState>> for SyncStatus {
    fn from(state: Option<&MutationState>) -> Self {
        match state {
            None => SyncStatus::Synced,
            Some(MutationState::PendingWrite { asserted_read, .. }) => SyncStatus::PendingWrite {
                asserted_read: *asserted_read,
            },
            Some(MutationState::Confirmed { asserted_read }) => SyncStatus::Confirmed {
                asserted_read: *asserted_read,
            },
        }
    }
}

/// Mutation tracker: id -> outstanding assertion
///
/// Ordered by id so iteration, equality and debug output are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationTracker {
    entries: BTreeMap<NotificationId, MutationState>,
}

impl MutationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an in-flight write asserting `asserted_read`.
    ///
    /// `previous` is the value the optimistic update replaced. A Confirmed assertion already
    /// held for `id` is kept aside and reinstated if the write fails.
    pub fn begin_mutation(&mut self, id: impl Into<NotificationId>, asserted_read: bool, previous: ReadMark) {
        let id = id.into();
        let superseded = match self.entries.get(&id) {
            Some(MutationState::Confirmed { asserted_read }) => Some(*asserted_read),
            _ => None,
        };
        self.entries.insert(
            id,
            MutationState::PendingWrite {
                asserted_read,
                previous,
                superseded,
                server_read: None,
            },
        );
    }

    /// Notes what a fetch reported for an id whose write is still in flight
    pub fn observe_server_read(&mut self, id: &str, read: bool) {
        if let Some(MutationState::PendingWrite { server_read, .. }) = self.entries.get_mut(id) {
            *server_read = Some(read);
        }
    }

    /// Moves a pending write to Confirmed. Returns false if `id` had no write in flight.
    pub fn resolve_success(&mut self, id: &str) -> bool {
        match self.entries.get_mut(id) {
            Some(state @ MutationState::PendingWrite { .. }) => {
                *state = MutationState::Confirmed {
                    asserted_read: state.asserted_read(),
                };
                true
            }
            _ => false,
        }
    }

    /// Unwinds a failed write and hands back the mark the store should return to.
    ///
    /// - the server already reported the asserted value meanwhile: the entry is dropped and the
    ///   store keeps its value (`None`)
    /// - the write superseded a Confirmed assertion: that assertion is reinstated
    /// - otherwise the entry is dropped
    ///
    /// Entries that are not pending are left alone and yield `None`.
    pub fn resolve_failure(&mut self, id: &str) -> Option<ReadMark> {
        let Some(MutationState::PendingWrite {
            asserted_read,
            previous,
            superseded,
            server_read,
        }) = self.entries.get(id).copied()
        else {
            return None;
        };

        if server_read == Some(asserted_read) {
            self.entries.remove(id);
            return None;
        }
        match superseded {
            Some(asserted_read) => {
                self.entries
                    .insert(id.to_string(), MutationState::Confirmed { asserted_read });
            }
            None => {
                self.entries.remove(id);
            }
        }
        Some(previous)
    }

    /// Discards a Confirmed override once the server agrees with it
    pub fn confirm(&mut self, id: &str) -> bool {
        match self.entries.get(id) {
            Some(MutationState::Confirmed { .. }) => {
                self.entries.remove(id);
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn state(&self, id: &str) -> Option<&MutationState> {
        self.entries.get(id)
    }

    pub fn status(&self, id: &str) -> SyncStatus {
        SyncStatus::from(self.entries.get(id))
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.entries.get(id).is_some_and(MutationState::is_pending)
    }

    /// True when any write is in flight
    pub fn has_pending(&self) -> bool {
        self.entries.values().any(MutationState::is_pending)
    }

    pub fn pending_ids(&self) -> Vec<NotificationId> {
        self.entries
            .iter()
            .filter(|(_, state)| state.is_pending())
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// The asserted `read` value for `id`, pending or confirmed
    pub fn override_for(&self, id: &str) -> Option<bool> {
        self.entries.get(id).map(MutationState::asserted_read)
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (&NotificationId, &MutationState)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
