/*
Reconciliation

Combines a freshly fetched server snapshot with the local store and the mutation tracker. The
function is pure: it takes the current values and returns the next ones, leaving the caller to
swap them in.

Rules, in order:

1. Server records come first, in server order. A record whose id carries a local assertion
   (pending or confirmed) takes the asserted `read` value; the rest of the record is the
   server's.
2. Local records the server did not return are appended (creates not yet visible to the
   list endpoint).
3. Ids with a write in flight remember the server's `read` value, so a failed write does not
   roll back past what the server has already reported.
4. Convergence: once the gate allows it, a confirmed assertion that the server now agrees with
   is dropped. Confirmed assertions for ids that no longer exist anywhere are dropped too.

Running the merge twice against the same server snapshot gives the same result as running it
once.
*/

use std::collections::{HashMap, HashSet};

use crate::core::platform::container::notification::{Notification, NotificationId};
use crate::core::platform::container::sync_state::{MutationState, MutationTracker, PollGate};

/// Result of one merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub notifications: Vec<Notification>,
    pub tracker: MutationTracker,
    /// Ids whose confirmed assertion was matched by the server in this merge
    pub converged: Vec<NotificationId>,
}

pub fn merge(
    server: &[Notification],
    local: &[Notification],
    tracker: &MutationTracker,
    gate: PollGate,
) -> MergeOutcome {
    let local_by_id: HashMap<&str, &Notification> =
        local.iter().map(|n| (n.id.as_str(), n)).collect();

    let mut seen: HashSet<&str> = HashSet::with_capacity(server.len() + local.len());
    let mut server_read: HashMap<&str, bool> = HashMap::with_capacity(server.len());
    let mut notifications = Vec::with_capacity(server.len() + local.len());

    for record in server {
        if !seen.insert(record.id.as_str()) {
            continue;
        }
        server_read.insert(record.id.as_str(), record.read);

        let merged = match tracker.override_for(&record.id) {
            Some(asserted_read) => {
                let mut forced = record.clone();
                forced.read = asserted_read;
                forced
            }
            None if tracker.is_pending(&record.id) => local_by_id
                .get(record.id.as_str())
                .map(|n| (*n).clone())
                .unwrap_or_else(|| record.clone()),
            None => record.clone(),
        };
        notifications.push(merged);
    }

    for record in local {
        if seen.insert(record.id.as_str()) {
            notifications.push(record.clone());
        }
    }

    let mut next = tracker.clone();
    let mut converged = Vec::new();

    for id in tracker.pending_ids() {
        if let Some(read) = server_read.get(id.as_str()) {
            next.observe_server_read(&id, *read);
        }
    }

    let may_converge = match gate {
        PollGate::Global => !tracker.has_pending(),
        PollGate::PerId => true,
    };

    if may_converge {
        for (id, state) in tracker.entries() {
            let MutationState::Confirmed { asserted_read } = state else {
                continue;
            };
            match server_read.get(id.as_str()) {
                Some(read) if read == asserted_read => {
                    next.confirm(id);
                    converged.push(id.clone());
                }
                Some(_) => {}
                None if !seen.contains(id.as_str()) => {
                    next.confirm(id);
                }
                None => {}
            }
        }
    }

    MergeOutcome {
        notifications,
        tracker: next,
        converged,
    }
}
