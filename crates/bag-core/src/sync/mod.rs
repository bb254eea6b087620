//! Reconciling sync between the local store and the remote service.
//!
//! A session walks every remote listing page for a [`RetrieveMode`], applies
//! last-writer-wins on `updated_at` per entry, purges local entries the full
//! listing no longer contains, and commits the result in one store
//! transaction. Page 1 is handled first; remaining pages are fetched
//! concurrently and reconciled under a shared session lock.
//!
//! Lock order is always session state, then store. Single-entry mutations in
//! [`mutations`] take only the store lock.

mod mutations;
mod reconcile;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;

use crate::api::{ApiClient, ApiError, EntryGateway};
use crate::config::ServerConfig;
use crate::db::{EntryStore, PendingChange};
use crate::error::Error;
use crate::index::{EntryIndexer, NoopIndexer, SearchableAttributes};
use crate::models::{EntryId, RetrieveMode};
use crate::state::SyncState;

pub use mutations::{MutationError, MutationResult};
pub use reconcile::{decide, Decision};

use reconcile::{PageWorker, Session};

/// Counters describing what one session did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub mode: RetrieveMode,
    /// Listing pages the server reported for `mode`
    pub pages: u32,
    pub inserted: usize,
    /// Local entries overwritten by a newer remote copy
    pub updated: usize,
    /// Local entries whose flags were sent to the server
    pub pushed: usize,
    pub unchanged: usize,
    pub purged: usize,
    pub push_failures: usize,
    pub index_failures: usize,
    /// Changes dropped at commit because the entry changed locally meanwhile
    pub superseded: usize,
}

impl SyncReport {
    /// True when the session changed nothing locally or remotely.
    pub const fn is_noop(&self) -> bool {
        self.inserted == 0 && self.updated == 0 && self.pushed == 0 && self.purged == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed(SyncReport),
    /// Another session was in progress; nothing was done.
    AlreadyRunning,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Sync configuration error: {0}")]
    Config(String),
    /// The first page could not be fetched; local data is untouched.
    #[error("Sync aborted: {0}")]
    Api(#[from] ApiError),
    /// Some pages failed. Changes from the others were committed and no
    /// entry was purged.
    #[error("Sync incomplete: page(s) {failed_pages:?} failed, purge skipped")]
    Incomplete {
        failed_pages: Vec<u32>,
        report: SyncReport,
    },
    /// Reading the snapshot or committing failed; staged changes were discarded.
    #[error("Local store error: {0}")]
    Store(#[from] Error),
}

impl SyncError {
    pub const fn is_authentication(&self) -> bool {
        match self {
            Self::Api(error) => error.is_authentication(),
            _ => false,
        }
    }
}

/// Puts the engine back to `Idle` however a session ends.
struct IdleGuard<'a>(&'a watch::Sender<SyncState>);

impl Drop for IdleGuard<'_> {
    fn drop(&mut self) {
        self.0.send_replace(SyncState::Idle);
    }
}

/// Coordinates sync sessions and single-entry mutations for one store.
pub struct SyncEngine<S> {
    gateway: Arc<dyn EntryGateway>,
    store: Arc<Mutex<S>>,
    indexer: Arc<dyn EntryIndexer>,
    state: watch::Sender<SyncState>,
}

impl<S: EntryStore + 'static> SyncEngine<S> {
    pub fn new(gateway: Arc<dyn EntryGateway>, store: Arc<Mutex<S>>) -> Self {
        Self::with_indexer(gateway, store, Arc::new(NoopIndexer))
    }

    pub fn with_indexer(
        gateway: Arc<dyn EntryGateway>,
        store: Arc<Mutex<S>>,
        indexer: Arc<dyn EntryIndexer>,
    ) -> Self {
        let (state, _) = watch::channel(SyncState::Idle);
        Self {
            gateway,
            store,
            indexer,
            state,
        }
    }

    /// Validate `config` and build an engine talking to that server.
    pub fn from_config(config: &ServerConfig, store: Arc<Mutex<S>>) -> Result<Self, SyncError> {
        let validated = config
            .validate()
            .map_err(|error| SyncError::Config(error.to_string()))?;
        let client = ApiClient::new(&validated)?;
        Ok(Self::new(Arc::new(client), store))
    }

    pub fn store(&self) -> &Arc<Mutex<S>> {
        &self.store
    }

    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    /// Watch state transitions; the value returns to `Idle` when a session ends.
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    /// Run one sync session for `mode`.
    ///
    /// Returns [`SyncOutcome::AlreadyRunning`] immediately if a session is in
    /// progress.
    pub async fn sync(&self, mode: RetrieveMode) -> Result<SyncOutcome, SyncError> {
        let started = self.state.send_if_modified(|state| {
            if state.is_active() {
                false
            } else {
                *state = SyncState::Running;
                true
            }
        });
        if !started {
            tracing::info!("Sync already in progress; ignoring request");
            return Ok(SyncOutcome::AlreadyRunning);
        }
        let _idle = IdleGuard(&self.state);

        tracing::info!(%mode, "Sync started");
        let result = self.run_session(mode).await;
        match &result {
            Ok(report) => tracing::info!(
                inserted = report.inserted,
                updated = report.updated,
                pushed = report.pushed,
                purged = report.purged,
                "Sync finished"
            ),
            Err(error) => tracing::warn!("Sync failed: {error}"),
        }
        result.map(SyncOutcome::Completed)
    }

    async fn run_session(&self, mode: RetrieveMode) -> Result<SyncReport, SyncError> {
        let snapshot = self.store.lock().await.fetch_all()?;

        let first = self.gateway.list_page(1, mode).await?;
        let last_page = first.last_page.max(1);

        self.state.send_replace(SyncState::Reconciling);
        let mut session = Session::from_snapshot(snapshot);
        session.report.mode = mode;
        session.report.pages = last_page;
        let worker = PageWorker {
            gateway: Arc::clone(&self.gateway),
            session: Arc::new(Mutex::new(session)),
        };
        worker.apply(first.items).await;

        let failed_pages = Self::fetch_remaining_pages(&worker, mode, last_page).await;

        let mut session = worker.session.lock().await;
        if failed_pages.is_empty() && mode.is_complete() {
            self.state.send_replace(SyncState::Purging);
            let mut purged = std::mem::take(&mut session.remaining)
                .into_iter()
                .collect::<Vec<_>>();
            purged.sort_unstable();
            for id in purged {
                tracing::debug!(%id, "Purging entry missing remotely");
                session.changes.push(PendingChange::Delete(id));
                session.report.purged += 1;
            }
        } else if !session.remaining.is_empty() {
            tracing::debug!(
                unseen = session.remaining.len(),
                "Skipping purge for partial listing"
            );
        }

        self.state.send_replace(SyncState::Committing);
        let changes = std::mem::take(&mut session.changes);
        let (applied, superseded) = self.commit(changes, &session.baseline).await?;
        session.report.superseded = superseded;
        session.report.index_failures += self.notify_indexer(&applied);

        let report = session.report.clone();
        if failed_pages.is_empty() {
            Ok(report)
        } else {
            Err(SyncError::Incomplete {
                failed_pages,
                report,
            })
        }
    }

    /// Fetch and reconcile pages `2..=last_page` concurrently.
    ///
    /// Returns the pages that did not complete.
    async fn fetch_remaining_pages(
        worker: &PageWorker,
        mode: RetrieveMode,
        last_page: u32,
    ) -> Vec<u32> {
        let mut tasks = JoinSet::new();
        for page in 2..=last_page {
            let worker = worker.clone();
            tasks.spawn(async move {
                let listing = worker.gateway.list_page(page, mode).await?;
                worker.apply(listing.items).await;
                Ok::<u32, ApiError>(page)
            });
        }

        let mut pending = (2..=last_page).collect::<BTreeSet<_>>();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(page)) => {
                    pending.remove(&page);
                }
                Ok(Err(error)) => tracing::warn!("Failed to fetch entry page: {error}"),
                Err(error) => tracing::warn!("Entry page task failed: {error}"),
            }
        }
        pending.into_iter().collect()
    }

    /// Stage the session's changes against the store's current state and save
    /// them. Returns the changes applied and how many were superseded.
    async fn commit(
        &self,
        changes: Vec<PendingChange>,
        baseline: &HashMap<EntryId, DateTime<Utc>>,
    ) -> Result<(Vec<PendingChange>, usize), SyncError> {
        let mut store = self.store.lock().await;
        let mut applied = Vec::with_capacity(changes.len());
        let mut inserted = HashSet::new();
        let mut superseded = 0;

        for change in changes {
            let rebased = match rebase(&*store, change, baseline, &inserted) {
                Ok(rebased) => rebased,
                Err(error) => {
                    store.discard();
                    return Err(SyncError::Store(error));
                }
            };
            let Some(change) = rebased else {
                superseded += 1;
                continue;
            };
            match &change {
                PendingChange::Insert(entry) => {
                    inserted.insert(entry.id);
                    store.insert(entry.clone());
                }
                PendingChange::Update(entry) => store.update(entry.clone()),
                PendingChange::Delete(id) => store.delete(*id),
            }
            applied.push(change);
        }

        if let Err(error) = store.save() {
            store.discard();
            return Err(SyncError::Store(error));
        }
        Ok((applied, superseded))
    }

    /// Returns the number of failed notifications.
    fn notify_indexer(&self, changes: &[PendingChange]) -> usize {
        let mut failures = 0;
        for change in changes {
            let result = match change {
                PendingChange::Insert(entry) | PendingChange::Update(entry) => self
                    .indexer
                    .index(entry.id, &SearchableAttributes::from(entry)),
                PendingChange::Delete(id) => self.indexer.remove(*id),
            };
            if let Err(error) = result {
                tracing::warn!(id = %change.id(), "Failed to update search index: {error}");
                failures += 1;
            }
        }
        failures
    }
}

/// Check one session change against what the store holds now.
///
/// Single-entry mutations may have saved while the session was running. A
/// change whose entry moved on since the snapshot is dropped, and updates
/// always keep the stored `screen_position`.
fn rebase<S: EntryStore>(
    store: &S,
    change: PendingChange,
    baseline: &HashMap<EntryId, DateTime<Utc>>,
    inserted: &HashSet<EntryId>,
) -> Result<Option<PendingChange>, Error> {
    let id = change.id();
    let entry = match change {
        PendingChange::Delete(id) => return Ok(Some(PendingChange::Delete(id))),
        PendingChange::Insert(entry) | PendingChange::Update(entry) => entry,
    };

    let Some(stored) = store.get(id)? else {
        if inserted.contains(&id) || !baseline.contains_key(&id) {
            return Ok(Some(PendingChange::Insert(entry)));
        }
        tracing::debug!(%id, "Entry deleted locally during sync; dropping change");
        return Ok(None);
    };

    // Entries unknown to the snapshot were added meanwhile; keep the newer copy.
    let moved_on = baseline.get(&id).map_or_else(
        || stored.updated_at >= entry.updated_at,
        |snapshot| *snapshot != stored.updated_at,
    );
    if moved_on {
        tracing::debug!(%id, "Entry changed locally during sync; keeping local copy");
        return Ok(None);
    }

    let mut entry = entry;
    entry.screen_position = stored.screen_position;
    Ok(Some(PendingChange::Update(entry)))
}
