//! Single-entry changes pushed straight to the server.
//!
//! Each operation takes the store lock only around local reads and writes,
//! never across a network call.

use chrono::Utc;
use thiserror::Error;
use url::Url;

use super::SyncEngine;
use crate::api::{ApiError, EntryUpdate};
use crate::db::EntryStore;
use crate::error::Error;
use crate::index::SearchableAttributes;
use crate::models::{Entry, EntryId};

#[derive(Debug, Error)]
pub enum MutationError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Local(#[from] Error),
}

pub type MutationResult<T> = Result<T, MutationError>;

impl<S: EntryStore + 'static> SyncEngine<S> {
    /// Save `url` on the server and store the created entry.
    pub async fn add_url(&self, url: &str) -> MutationResult<Entry> {
        let url = validate_url(url)?;
        let remote = self.gateway.create(url.as_str()).await?;

        let entry = Entry::from_remote(&remote);
        {
            let mut store = self.store.lock().await;
            store.insert(entry.clone());
            store.save()?;
        }
        tracing::info!(id = %entry.id, "Added entry");
        self.index_entry(&entry);
        Ok(entry)
    }

    pub async fn set_archived(&self, id: EntryId, archived: bool) -> MutationResult<Entry> {
        self.set_flags(
            id,
            EntryUpdate {
                archive: Some(archived),
                starred: None,
            },
        )
        .await
    }

    pub async fn set_starred(&self, id: EntryId, starred: bool) -> MutationResult<Entry> {
        self.set_flags(
            id,
            EntryUpdate {
                archive: None,
                starred: Some(starred),
            },
        )
        .await
    }

    pub async fn toggle_archived(&self, id: EntryId) -> MutationResult<Entry> {
        let current = self.require(id).await?;
        self.set_archived(id, !current.is_archived).await
    }

    pub async fn toggle_starred(&self, id: EntryId) -> MutationResult<Entry> {
        let current = self.require(id).await?;
        self.set_starred(id, !current.is_starred).await
    }

    /// Apply `fields` locally, then push them.
    ///
    /// If the push fails the local change stays with its newer timestamp, so
    /// the next sync session sends it again.
    async fn set_flags(&self, id: EntryId, fields: EntryUpdate) -> MutationResult<Entry> {
        {
            let mut store = self.store.lock().await;
            let mut entry = store.get(id)?.ok_or(Error::NotFound(id))?;
            if let Some(archived) = fields.archive {
                entry.is_archived = archived;
            }
            if let Some(starred) = fields.starred {
                entry.is_starred = starred;
            }
            entry.updated_at = Utc::now();
            store.update(entry);
            store.save()?;
        }

        let remote = self.gateway.update(id, &fields).await.map_err(|error| {
            tracing::warn!(%id, "Keeping unsent local change: {error}");
            error
        })?;

        let entry = {
            let mut store = self.store.lock().await;
            let mut entry = store.get(id)?.ok_or(Error::NotFound(id))?;
            entry.updated_at = remote.updated_at;
            store.update(entry.clone());
            store.save()?;
            entry
        };
        self.index_entry(&entry);
        Ok(entry)
    }

    /// Delete remotely first; the local copy goes only once the server agrees.
    pub async fn delete_entry(&self, id: EntryId) -> MutationResult<()> {
        self.require(id).await?;
        self.gateway.delete(id).await?;

        {
            let mut store = self.store.lock().await;
            store.delete(id);
            store.save()?;
        }
        tracing::info!(%id, "Deleted entry");
        if let Err(error) = self.indexer.remove(id) {
            tracing::warn!(%id, "Failed to update search index: {error}");
        }
        Ok(())
    }

    /// Remember how far the article was read. Stays local.
    pub async fn set_screen_position(&self, id: EntryId, position: f64) -> MutationResult<()> {
        if !position.is_finite() || position < 0.0 {
            return Err(Error::InvalidInput(format!("invalid screen position: {position}")).into());
        }

        let mut store = self.store.lock().await;
        let mut entry = store.get(id)?.ok_or(Error::NotFound(id))?;
        entry.screen_position = position;
        store.update(entry);
        store.save()?;
        Ok(())
    }

    async fn require(&self, id: EntryId) -> MutationResult<Entry> {
        let entry = self.store.lock().await.get(id)?;
        entry.ok_or_else(|| Error::NotFound(id).into())
    }

    fn index_entry(&self, entry: &Entry) {
        if let Err(error) = self
            .indexer
            .index(entry.id, &SearchableAttributes::from(entry))
        {
            tracing::warn!(id = %entry.id, "Failed to update search index: {error}");
        }
    }
}

fn validate_url(raw: &str) -> Result<Url, Error> {
    let url = Url::parse(raw.trim())
        .map_err(|error| Error::InvalidInput(format!("invalid URL '{}': {error}", raw.trim())))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidInput(format!(
            "URL must use http or https: {url}"
        )));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use tokio::sync::Mutex;

    use super::*;
    use crate::db::SqliteEntryStore;
    use crate::sync::testing::{local, ts, FakeGateway, RecordingIndexer};

    fn engine_with(
        gateway: FakeGateway,
        entries: Vec<Entry>,
    ) -> (SyncEngine<SqliteEntryStore>, Arc<FakeGateway>, Arc<RecordingIndexer>) {
        let mut store = SqliteEntryStore::open_in_memory().unwrap();
        for entry in entries {
            store.insert(entry);
        }
        store.save().unwrap();

        let gateway = Arc::new(gateway);
        let indexer = Arc::new(RecordingIndexer::default());
        let engine = SyncEngine::with_indexer(
            gateway.clone(),
            Arc::new(Mutex::new(store)),
            indexer.clone(),
        );
        (engine, gateway, indexer)
    }

    async fn stored(engine: &SyncEngine<SqliteEntryStore>, id: i64) -> Option<Entry> {
        engine.store().lock().await.get(EntryId::new(id)).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn add_url_stores_and_indexes_created_entry() {
        let (engine, _, indexer) = engine_with(FakeGateway::with_pages(Vec::new()), Vec::new());

        let entry = engine.add_url(" https://example.com/new ").await.unwrap();

        assert_eq!(entry.url, "https://example.com/new");
        assert_eq!(stored(&engine, entry.id.get()).await, Some(entry.clone()));
        assert_eq!(*indexer.indexed.lock().unwrap(), vec![entry.id]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn add_url_rejects_non_http_input() {
        let (engine, _, _) = engine_with(FakeGateway::with_pages(Vec::new()), Vec::new());

        for input in ["not a url", "ftp://example.com/file"] {
            let error = engine.add_url(input).await.unwrap_err();
            assert!(matches!(error, MutationError::Local(Error::InvalidInput(_))));
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn set_archived_pushes_only_that_flag_and_adopts_server_time() {
        let (engine, gateway, _) =
            engine_with(FakeGateway::with_pages(Vec::new()), vec![local(1, 5)]);

        let entry = engine.set_archived(EntryId::new(1), true).await.unwrap();

        assert!(entry.is_archived);
        assert_eq!(entry.updated_at, ts(1_000));
        assert_eq!(
            gateway.updates(),
            vec![(
                EntryId::new(1),
                EntryUpdate {
                    archive: Some(true),
                    starred: None
                }
            )]
        );
        assert_eq!(stored(&engine, 1).await, Some(entry));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn toggle_starred_flips_current_value() {
        let mut starred = local(1, 5);
        starred.is_starred = true;
        let (engine, _, _) = engine_with(FakeGateway::with_pages(Vec::new()), vec![starred]);

        let entry = engine.toggle_starred(EntryId::new(1)).await.unwrap();
        assert!(!entry.is_starred);
        let entry = engine.toggle_archived(EntryId::new(1)).await.unwrap();
        assert!(entry.is_archived);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_push_keeps_local_change_with_newer_timestamp() {
        let mut gateway = FakeGateway::with_pages(Vec::new());
        gateway.fail_updates = true;
        let (engine, _, _) = engine_with(gateway, vec![local(1, 5)]);

        let error = engine.set_starred(EntryId::new(1), true).await.unwrap_err();
        assert!(matches!(error, MutationError::Api(_)));

        let entry = stored(&engine, 1).await.unwrap();
        assert!(entry.is_starred);
        assert!(entry.updated_at > ts(5));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_entry_removes_remote_then_local() {
        let (engine, gateway, indexer) =
            engine_with(FakeGateway::with_pages(Vec::new()), vec![local(1, 5)]);

        engine.delete_entry(EntryId::new(1)).await.unwrap();

        assert_eq!(*gateway.deletes.lock().unwrap(), vec![EntryId::new(1)]);
        assert_eq!(stored(&engine, 1).await, None);
        assert_eq!(*indexer.removed.lock().unwrap(), vec![EntryId::new(1)]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_remote_delete_keeps_local_copy() {
        let mut gateway = FakeGateway::with_pages(Vec::new());
        gateway.fail_deletes = true;
        let (engine, _, _) = engine_with(gateway, vec![local(1, 5)]);

        assert!(engine.delete_entry(EntryId::new(1)).await.is_err());
        assert!(stored(&engine, 1).await.is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn screen_position_is_local_and_keeps_timestamp() {
        let (engine, gateway, _) =
            engine_with(FakeGateway::with_pages(Vec::new()), vec![local(1, 5)]);

        engine
            .set_screen_position(EntryId::new(1), 812.5)
            .await
            .unwrap();

        let entry = stored(&engine, 1).await.unwrap();
        assert!((entry.screen_position - 812.5).abs() < f64::EPSILON);
        assert_eq!(entry.updated_at, ts(5));
        assert!(gateway.updates().is_empty());
        assert!(engine
            .set_screen_position(EntryId::new(1), f64::NAN)
            .await
            .is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_id_is_not_found() {
        let (engine, gateway, _) = engine_with(FakeGateway::with_pages(Vec::new()), Vec::new());

        let error = engine.set_archived(EntryId::new(7), true).await.unwrap_err();
        assert!(matches!(error, MutationError::Local(Error::NotFound(_))));
        let error = engine.delete_entry(EntryId::new(7)).await.unwrap_err();
        assert!(matches!(error, MutationError::Local(Error::NotFound(_))));
        assert!(gateway.deletes.lock().unwrap().is_empty());
    }
}
