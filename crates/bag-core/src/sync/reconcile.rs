//! Per-entry reconciliation between the local store and one remote page.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::SyncReport;
use crate::api::{EntryGateway, EntryUpdate};
use crate::db::PendingChange;
use crate::models::{Entry, EntryId, RemoteEntry};

/// What to do with one remote item given the local copy, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Not stored locally yet
    Insert,
    /// Same `updated_at` on both sides
    Unchanged,
    /// Remote is newer; overwrite server fields locally
    PullRemote,
    /// Local is newer; send local flags to the server
    PushLocal,
}

/// `updated_at` is the only signal compared.
pub fn decide(local: Option<&Entry>, remote: &RemoteEntry) -> Decision {
    let Some(local) = local else {
        return Decision::Insert;
    };
    match local.updated_at.cmp(&remote.updated_at) {
        std::cmp::Ordering::Equal => Decision::Unchanged,
        std::cmp::Ordering::Less => Decision::PullRemote,
        std::cmp::Ordering::Greater => Decision::PushLocal,
    }
}

/// Working state of one sync session, shared by every page task.
#[derive(Debug, Default)]
pub(super) struct Session {
    /// Local ids not yet seen in any remote page
    pub remaining: HashSet<EntryId>,
    /// Local entries plus everything inserted during this session
    pub local: HashMap<EntryId, Entry>,
    /// `updated_at` of every local entry when the snapshot was taken
    pub baseline: HashMap<EntryId, DateTime<Utc>>,
    /// Changes to hand to the store at commit time, in order
    pub changes: Vec<PendingChange>,
    pub report: SyncReport,
}

impl Session {
    pub fn from_snapshot(entries: Vec<Entry>) -> Self {
        let remaining = entries.iter().map(|entry| entry.id).collect();
        let baseline = entries
            .iter()
            .map(|entry| (entry.id, entry.updated_at))
            .collect();
        let local = entries.into_iter().map(|entry| (entry.id, entry)).collect();
        Self {
            remaining,
            local,
            baseline,
            ..Self::default()
        }
    }

    /// Apply every item whose outcome is decided locally and return the
    /// pushes that still need a server round trip.
    pub fn reconcile(&mut self, items: Vec<RemoteEntry>) -> Vec<(EntryId, EntryUpdate)> {
        let mut pushes = Vec::new();
        for remote in items {
            self.remaining.remove(&remote.id);
            match decide(self.local.get(&remote.id), &remote) {
                Decision::Insert => {
                    tracing::debug!(id = %remote.id, "Inserting new remote entry");
                    let entry = Entry::from_remote(&remote);
                    self.changes.push(PendingChange::Insert(entry.clone()));
                    self.local.insert(remote.id, entry);
                    self.report.inserted += 1;
                }
                Decision::Unchanged => self.report.unchanged += 1,
                Decision::PullRemote => {
                    if let Some(entry) = self.local.get_mut(&remote.id) {
                        tracing::debug!(id = %remote.id, "Remote entry is newer");
                        entry.apply_remote(&remote);
                        self.changes.push(PendingChange::Update(entry.clone()));
                        self.report.updated += 1;
                    }
                }
                Decision::PushLocal => {
                    if let Some(entry) = self.local.get(&remote.id) {
                        tracing::debug!(id = %remote.id, "Local entry is newer");
                        pushes.push((
                            remote.id,
                            EntryUpdate::flags(entry.is_archived, entry.is_starred),
                        ));
                    }
                }
            }
        }
        pushes
    }

    /// Record the timestamp the server assigned after a push.
    pub fn adopt_server_timestamp(&mut self, remote: &RemoteEntry) {
        if let Some(entry) = self.local.get_mut(&remote.id) {
            entry.updated_at = remote.updated_at;
            self.changes.push(PendingChange::Update(entry.clone()));
            self.report.pushed += 1;
        }
    }
}

/// Everything a page task needs; cheap to clone into spawned tasks.
#[derive(Clone)]
pub(super) struct PageWorker {
    pub gateway: Arc<dyn EntryGateway>,
    pub session: Arc<Mutex<Session>>,
}

impl PageWorker {
    /// Reconcile one page under the session lock, then push local winners
    /// without holding it.
    pub async fn apply(&self, items: Vec<RemoteEntry>) {
        let pushes = self.session.lock().await.reconcile(items);

        for (id, fields) in pushes {
            match self.gateway.update(id, &fields).await {
                Ok(remote) => self.session.lock().await.adopt_server_timestamp(&remote),
                Err(error) => {
                    tracing::warn!(%id, "Failed to push local changes: {error}");
                    self.session.lock().await.report.push_failures += 1;
                }
            }
        }
    }
}
