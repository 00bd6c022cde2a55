/*
Notification Sync Service

The platform service that keeps the dashboard's notification list in step with the notification
API. It owns the store and the mutation tracker and is their only writer; everything else reads
immutable snapshots.

- Reads and deletes are optimistic: the store changes first, then the gateway is called, and a
  failure rolls the change back (read) or re-fetches authoritative state (delete).
- Creates are not optimistic: the store only changes once the server has returned the record.
- Fetches are merged with outstanding local assertions by the reconciliation rules, and are
  gated by in-flight writes according to the configured PollGate.

All state sits behind one mutex that is never held across an `.await`. Each change publishes a
fresh StoreSnapshot on a watch channel.

Results of calls that were issued before `reset()` (logout) are discarded when they arrive, and
a fetch that completes after a newer fetch has already been applied is dropped.
*/

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use log::{debug, info, warn};
use tokio::sync::watch;

use crate::application::ports::output::notification_port::{
    GatewayOperation, NotificationGateway,
};
use crate::application::ports::output::session_port::{Credential, CredentialProvider};
use crate::core::platform::container::notification::{Notification, NotificationDraft, NotificationId};
use crate::core::platform::container::notification_store::{NotificationStore, StoreSnapshot};
use crate::core::platform::container::sync_state::{MutationTracker, PollGate, SyncStatus};
use crate::core::platform::manager::reconciliation::merge;
use crate::error::{SyncError, SyncResult};

/// What a fetch did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The server snapshot was merged into the store
    Applied { count: usize },
    /// A write is in flight and the fetch was not forced; nothing was requested
    Deferred,
    /// No session credential; nothing was requested
    NoCredential,
    /// The response arrived after newer state had been applied and was dropped
    Stale,
}

/// What a read/delete mutation did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The server accepted the write
    Confirmed,
    /// No session credential; nothing changed
    NoCredential,
    /// Nothing to do: unknown id, write already in flight, or nothing unread
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorOrigin {
    Fetch,
    Mutation,
}

#[derive(Debug, Clone)]
struct RecordedError {
    origin: ErrorOrigin,
    message: String,
}

#[derive(Debug, Default)]
struct EngineState {
    store: NotificationStore,
    tracker: MutationTracker,
    fetches_in_flight: usize,
    error: Option<RecordedError>,
    /// Bumped by `reset`; calls issued under an older generation are ignored on completion.
    generation: u64,
    fetches_issued: u64,
    latest_applied_fetch: u64,
}

impl EngineState {
    fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            notifications: self.store.records(),
            loading: self.fetches_in_flight > 0,
            error: self.error.as_ref().map(|e| e.message.clone()),
        }
    }

    fn record_error(&mut self, origin: ErrorOrigin, error: &SyncError) {
        self.error = Some(RecordedError {
            origin,
            message: error.to_string(),
        });
    }

    fn clear_error_from(&mut self, origin: ErrorOrigin) {
        if self.error.as_ref().is_some_and(|e| e.origin == origin) {
            self.error = None;
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct FetchTicket {
    generation: u64,
    sequence: u64,
}

/// Keeps `loading` honest when a fetch future is dropped before the response arrives
struct InFlightFetch<'a> {
    service: &'a NotificationSyncService,
    armed: bool,
}

impl Drop for InFlightFetch<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.service.with_state(|state| {
                state.fetches_in_flight = state.fetches_in_flight.saturating_sub(1);
            });
        }
    }
}

struct ServiceInner {
    gateway: Arc<dyn NotificationGateway>,
    session: Arc<dyn CredentialProvider>,
    poll_gate: PollGate,
    state: Mutex<EngineState>,
    snapshots: watch::Sender<StoreSnapshot>,
}

/// Handle to the sync engine. Clones share the same store.
#[derive(Clone)]
pub struct NotificationSyncService {
    inner: Arc<ServiceInner>,
}

impl std::fmt::Debug for NotificationSyncService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationSyncService")
            .field("gateway", &self.inner.gateway.name())
            .field("poll_gate", &self.inner.poll_gate)
            .finish()
    }
}

impl NotificationSyncService {
    /// Creates the engine with the global poll gate
    pub fn new(gateway: Arc<dyn NotificationGateway>, session: Arc<dyn CredentialProvider>) -> Self {
        Self::with_poll_gate(gateway, session, PollGate::default())
    }

    pub fn with_poll_gate(
        gateway: Arc<dyn NotificationGateway>,
        session: Arc<dyn CredentialProvider>,
        poll_gate: PollGate,
    ) -> Self {
        let (snapshots, _) = watch::channel(StoreSnapshot::default());
        Self {
            inner: Arc::new(ServiceInner {
                gateway,
                session,
                poll_gate,
                state: Mutex::new(EngineState::default()),
                snapshots,
            }),
        }
    }

    // ------------------------------------------------------------------------
    // Read side
    // ------------------------------------------------------------------------

    pub fn snapshot(&self) -> StoreSnapshot {
        self.inner.snapshots.borrow().clone()
    }

    /// Receiver that wakes on every published change
    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.inner.snapshots.subscribe()
    }

    pub fn notifications(&self) -> Arc<Vec<Notification>> {
        self.snapshot().notifications
    }

    pub fn loading(&self) -> bool {
        self.snapshot().loading
    }

    pub fn error(&self) -> Option<String> {
        self.snapshot().error
    }

    pub fn unread_count(&self) -> usize {
        self.snapshot().unread_count()
    }

    pub fn sync_status(&self, id: &str) -> SyncStatus {
        self.read_state(|state| state.tracker.status(id))
    }

    pub fn pending_ids(&self) -> Vec<NotificationId> {
        self.read_state(|state| state.tracker.pending_ids())
    }

    pub fn has_pending(&self) -> bool {
        self.read_state(|state| state.tracker.has_pending())
    }

    /// Locally asserted `read` value not yet confirmed by a fetch
    pub fn override_for(&self, id: &str) -> Option<bool> {
        self.read_state(|state| state.tracker.override_for(id))
    }

    pub fn has_credential(&self) -> bool {
        self.credential().is_some()
    }

    pub fn poll_gate(&self) -> PollGate {
        self.inner.poll_gate
    }

    // ------------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------------

    /// Fetches the server snapshot and merges it into the store.
    ///
    /// Unless `force` is set, the global gate defers the fetch while any write is in flight.
    pub async fn fetch_notifications(&self, force: bool) -> SyncResult<FetchOutcome> {
        let Some(credential) = self.credential() else {
            debug!("Skipping notification fetch: no session credential");
            return Ok(FetchOutcome::NoCredential);
        };

        let gate = self.inner.poll_gate;
        let ticket = self.with_state(|state| {
            if !force && gate == PollGate::Global && state.tracker.has_pending() {
                return None;
            }
            state.fetches_in_flight += 1;
            state.fetches_issued += 1;
            Some(FetchTicket {
                generation: state.generation,
                sequence: state.fetches_issued,
            })
        });
        let Some(ticket) = ticket else {
            debug!("Deferring notification fetch: a write is in flight");
            return Ok(FetchOutcome::Deferred);
        };

        let mut in_flight = InFlightFetch { service: self, armed: true };
        let result = self.inner.gateway.list_notifications(&credential).await;
        in_flight.armed = false;

        self.with_state(|state| {
            state.fetches_in_flight = state.fetches_in_flight.saturating_sub(1);
            if ticket.generation != state.generation {
                debug!("Dropping fetch issued before the session was reset");
                return Ok(FetchOutcome::Stale);
            }

            match result {
                Ok(server) => {
                    if ticket.sequence < state.latest_applied_fetch {
                        debug!(
                            "Dropping stale fetch #{} (#{} already applied)",
                            ticket.sequence, state.latest_applied_fetch
                        );
                        return Ok(FetchOutcome::Stale);
                    }
                    state.latest_applied_fetch = ticket.sequence;

                    let outcome = merge(&server, state.store.as_slice(), &state.tracker, gate);
                    if !outcome.converged.is_empty() {
                        debug!("Server confirmed local assertions for {:?}", outcome.converged);
                    }
                    let count = outcome.notifications.len();
                    state.store.replace(outcome.notifications);
                    state.tracker = outcome.tracker;
                    state.clear_error_from(ErrorOrigin::Fetch);
                    debug!("Applied notification snapshot with {} records", count);
                    Ok(FetchOutcome::Applied { count })
                }
                Err(source) => {
                    let error = SyncError::transport(GatewayOperation::List, source);
                    warn!("{}", error);
                    state.record_error(ErrorOrigin::Fetch, &error);
                    Err(error)
                }
            }
        })
    }

    /// Optimistically marks one notification read
    pub async fn mark_as_read(&self, id: &str) -> SyncResult<MutationOutcome> {
        let Some(credential) = self.credential() else {
            return Ok(MutationOutcome::NoCredential);
        };

        let generation = self.with_state(|state| {
            if state.tracker.is_pending(id) {
                return None;
            }
            let previous = state.store.set_read(id, true, Utc::now())?;
            state.tracker.begin_mutation(id, true, previous);
            state.error = None;
            Some(state.generation)
        });
        let Some(generation) = generation else {
            debug!("mark_as_read({}) skipped: unknown id or write already in flight", id);
            return Ok(MutationOutcome::Unchanged);
        };

        let result = self.inner.gateway.update_read(&credential, id, true).await;

        self.with_state(|state| {
            let current = state.generation == generation;
            match result {
                Ok(()) => {
                    if current {
                        state.tracker.resolve_success(id);
                    }
                    Ok(MutationOutcome::Confirmed)
                }
                Err(source) => {
                    let error = SyncError::transport(GatewayOperation::UpdateRead, source);
                    if current {
                        if let Some(previous) = state.tracker.resolve_failure(id) {
                            state.store.restore_read(id, previous);
                        }
                        state.record_error(ErrorOrigin::Mutation, &error);
                    }
                    warn!("{} ({})", error, id);
                    Err(error)
                }
            }
        })
    }

    /// Optimistically marks every unread notification read with a single request
    pub async fn mark_all_as_read(&self) -> SyncResult<MutationOutcome> {
        let Some(credential) = self.credential() else {
            return Ok(MutationOutcome::NoCredential);
        };

        let batch = self.with_state(|state| {
            let now = Utc::now();
            let mut batch = Vec::new();
            for id in state.store.unread_ids() {
                if state.tracker.is_pending(&id) {
                    continue;
                }
                if let Some(previous) = state.store.set_read(&id, true, now) {
                    state.tracker.begin_mutation(id.clone(), true, previous);
                    batch.push(id);
                }
            }
            if batch.is_empty() {
                return None;
            }
            state.error = None;
            Some((state.generation, batch))
        });
        let Some((generation, batch)) = batch else {
            debug!("mark_all_as_read skipped: nothing unread");
            return Ok(MutationOutcome::Unchanged);
        };

        let result = self.inner.gateway.mark_all_read(&credential).await;

        self.with_state(|state| {
            let current = state.generation == generation;
            match result {
                Ok(()) => {
                    if current {
                        for id in &batch {
                            state.tracker.resolve_success(id);
                        }
                    }
                    info!("Marked {} notifications read", batch.len());
                    Ok(MutationOutcome::Confirmed)
                }
                Err(source) => {
                    let error = SyncError::transport(GatewayOperation::MarkAllRead, source);
                    if current {
                        for id in &batch {
                            if let Some(previous) = state.tracker.resolve_failure(id) {
                                state.store.restore_read(id, previous);
                            }
                        }
                        state.record_error(ErrorOrigin::Mutation, &error);
                    }
                    warn!("{}", error);
                    Err(error)
                }
            }
        })
    }

    /// Creates a notification. The store only changes once the server has returned the record.
    ///
    /// Returns `None` without a session credential.
    pub async fn add_notification(&self, draft: NotificationDraft) -> SyncResult<Option<Notification>> {
        let Some(credential) = self.credential() else {
            return Ok(None);
        };
        draft.validate()?;

        let generation = self.with_state(|state| {
            state.error = None;
            state.generation
        });

        let result = self.inner.gateway.create_notification(&credential, &draft).await;

        self.with_state(|state| {
            let current = state.generation == generation;
            match result {
                Ok(created) => {
                    if current {
                        state.store.prepend(created.clone());
                    }
                    info!("Created notification {}", created.id);
                    Ok(Some(created))
                }
                Err(source) => {
                    let error = SyncError::transport(GatewayOperation::Create, source);
                    if current {
                        state.record_error(ErrorOrigin::Mutation, &error);
                    }
                    warn!("{}", error);
                    Err(error)
                }
            }
        })
    }

    /// Removes a notification immediately, then asks the server to delete it.
    ///
    /// On failure the error is recorded and a forced fetch restores whatever the server still
    /// holds.
    pub async fn delete_notification(&self, id: &str) -> SyncResult<MutationOutcome> {
        let Some(credential) = self.credential() else {
            return Ok(MutationOutcome::NoCredential);
        };

        let generation = self.with_state(|state| {
            state.store.remove(id)?;
            state.error = None;
            Some(state.generation)
        });
        let Some(generation) = generation else {
            debug!("delete_notification({}) skipped: unknown id", id);
            return Ok(MutationOutcome::Unchanged);
        };

        match self.inner.gateway.delete_notification(&credential, id).await {
            Ok(()) => {
                debug!("Deleted notification {}", id);
                Ok(MutationOutcome::Confirmed)
            }
            Err(source) => {
                let error = SyncError::transport(GatewayOperation::Delete, source);
                warn!("{} ({}); resynchronizing", error, id);
                let current = self.with_state(|state| {
                    let current = state.generation == generation;
                    if current {
                        state.record_error(ErrorOrigin::Mutation, &error);
                    }
                    current
                });
                if current {
                    if let Err(resync) = self.fetch_notifications(true).await {
                        warn!("Resynchronization after failed delete also failed: {}", resync);
                    }
                }
                Err(error)
            }
        }
    }

    /// Clears everything tied to the session (logout)
    pub fn reset(&self) {
        self.with_state(|state| {
            state.store.clear();
            state.tracker.clear();
            state.error = None;
            state.generation += 1;
        });
        info!("Notification store cleared");
    }

    pub fn clear_error(&self) {
        self.with_state(|state| state.error = None);
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn credential(&self) -> Option<Credential> {
        self.inner.session.credential()
    }

    fn read_state<R>(&self, f: impl FnOnce(&EngineState) -> R) -> R {
        let state = self.inner.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Runs `f` under the state lock, then publishes the resulting snapshot if it changed
    fn with_state<R>(&self, f: impl FnOnce(&mut EngineState) -> R) -> R {
        let mut state = self.inner.state.lock().unwrap_or_else(PoisonError::into_inner);
        let result = f(&mut state);
        let next = state.snapshot();
        self.inner.snapshots.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        result
    }
}
