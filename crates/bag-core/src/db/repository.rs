//! Entry store implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT and counters

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};

use super::Database;
use crate::error::{Error, Result};
use crate::models::{Entry, EntryId, RetrieveMode};

/// A mutation staged in memory until the next [`EntryStore::save`].
#[derive(Debug, Clone, PartialEq)]
pub enum PendingChange {
    Insert(Entry),
    Update(Entry),
    Delete(EntryId),
}

impl PendingChange {
    pub const fn id(&self) -> EntryId {
        match self {
            Self::Insert(entry) | Self::Update(entry) => entry.id,
            Self::Delete(id) => *id,
        }
    }
}

/// Persistent collection of entries keyed by remote id.
///
/// Reads see committed state only. Writes are staged and become visible
/// together when [`save`](Self::save) commits them in one transaction.
pub trait EntryStore: Send {
    /// Every stored entry, in no particular order
    fn fetch_all(&self) -> Result<Vec<Entry>>;

    fn get(&self, id: EntryId) -> Result<Option<Entry>>;

    /// Entries matching `mode`, newest first
    fn list(&self, mode: RetrieveMode, limit: usize) -> Result<Vec<Entry>>;

    /// Stage an insert; an existing row with the same id is replaced.
    fn insert(&mut self, entry: Entry);

    fn update(&mut self, entry: Entry);

    fn delete(&mut self, id: EntryId);

    /// Commit every staged change atomically and return how many were applied.
    ///
    /// Staged changes are consumed even when the commit fails.
    fn save(&mut self) -> Result<usize>;

    /// Drop staged changes without applying them
    fn discard(&mut self);

    fn has_pending(&self) -> bool;
}

/// `SQLite` implementation of `EntryStore`
#[derive(Debug)]
pub struct SqliteEntryStore {
    db: Database,
    pending: Vec<PendingChange>,
}

const ENTRY_COLUMNS: &str = "id, title, content, url, domain_name, preview_picture, \
     created_at, updated_at, is_starred, is_archived, reading_time, screen_position";

impl SqliteEntryStore {
    pub const fn new(db: Database) -> Self {
        Self {
            db,
            pending: Vec::new(),
        }
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    fn conn(&self) -> &Connection {
        self.db.connection()
    }

    /// Parse an entry from a database row
    fn parse_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<Entry> {
        Ok(Entry {
            id: EntryId::new(row.get(0)?),
            title: row.get(1)?,
            content: row.get(2)?,
            url: row.get(3)?,
            domain_name: row.get(4)?,
            preview_picture: row.get(5)?,
            created_at: millis_to_datetime(6, row.get(6)?)?,
            updated_at: millis_to_datetime(7, row.get(7)?)?,
            is_starred: row.get::<_, i64>(8)? != 0,
            is_archived: row.get::<_, i64>(9)? != 0,
            reading_time: u32::try_from(row.get::<_, i64>(10)?.max(0)).unwrap_or(u32::MAX),
            screen_position: row.get(11)?,
        })
    }

    fn upsert(tx: &Transaction<'_>, entry: &Entry) -> Result<()> {
        tx.execute(
            "INSERT INTO entries (id, title, content, url, domain_name, preview_picture,
                                  created_at, updated_at, is_starred, is_archived,
                                  reading_time, screen_position)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(id) DO UPDATE SET
                 title = excluded.title,
                 content = excluded.content,
                 url = excluded.url,
                 domain_name = excluded.domain_name,
                 preview_picture = excluded.preview_picture,
                 updated_at = excluded.updated_at,
                 is_starred = excluded.is_starred,
                 is_archived = excluded.is_archived,
                 reading_time = excluded.reading_time",
            params![
                entry.id.get(),
                entry.title,
                entry.content,
                entry.url,
                entry.domain_name,
                entry.preview_picture,
                entry.created_at.timestamp_millis(),
                entry.updated_at.timestamp_millis(),
                i64::from(entry.is_starred),
                i64::from(entry.is_archived),
                i64::from(entry.reading_time),
                entry.screen_position,
            ],
        )?;
        Ok(())
    }

    fn apply_update(tx: &Transaction<'_>, entry: &Entry) -> Result<()> {
        let rows = tx.execute(
            "UPDATE entries SET title = ?2, content = ?3, url = ?4, domain_name = ?5,
                    preview_picture = ?6, updated_at = ?7, is_starred = ?8,
                    is_archived = ?9, reading_time = ?10, screen_position = ?11
             WHERE id = ?1",
            params![
                entry.id.get(),
                entry.title,
                entry.content,
                entry.url,
                entry.domain_name,
                entry.preview_picture,
                entry.updated_at.timestamp_millis(),
                i64::from(entry.is_starred),
                i64::from(entry.is_archived),
                i64::from(entry.reading_time),
                entry.screen_position,
            ],
        )?;
        if rows == 0 {
            tracing::debug!(id = %entry.id, "Skipping update of entry removed locally");
        }
        Ok(())
    }

    fn apply(tx: &Transaction<'_>, change: &PendingChange) -> Result<()> {
        match change {
            PendingChange::Insert(entry) => Self::upsert(tx, entry),
            PendingChange::Update(entry) => Self::apply_update(tx, entry),
            PendingChange::Delete(id) => {
                tx.execute("DELETE FROM entries WHERE id = ?", params![id.get()])?;
                Ok(())
            }
        }
    }
}

fn millis_to_datetime(column: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            rusqlite::types::Type::Integer,
            format!("timestamp out of range: {millis}").into(),
        )
    })
}

fn mode_filter(mode: RetrieveMode) -> &'static str {
    match mode {
        RetrieveMode::All => "1 = 1",
        RetrieveMode::Archived => "is_archived = 1",
        RetrieveMode::Unarchived => "is_archived = 0",
        RetrieveMode::Starred => "is_starred = 1",
    }
}

impl EntryStore for SqliteEntryStore {
    fn fetch_all(&self) -> Result<Vec<Entry>> {
        let mut stmt = self
            .conn()
            .prepare(&format!("SELECT {ENTRY_COLUMNS} FROM entries"))?;
        let entries = stmt
            .query_map([], Self::parse_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn get(&self, id: EntryId) -> Result<Option<Entry>> {
        let entry = self
            .conn()
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ?"),
                params![id.get()],
                Self::parse_entry,
            )
            .optional()?;
        Ok(entry)
    }

    fn list(&self, mode: RetrieveMode, limit: usize) -> Result<Vec<Entry>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {ENTRY_COLUMNS}
             FROM entries
             WHERE {}
             ORDER BY created_at DESC, id DESC
             LIMIT ?",
            mode_filter(mode)
        ))?;
        let entries = stmt
            .query_map(params![limit as i64], Self::parse_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn insert(&mut self, entry: Entry) {
        self.pending.push(PendingChange::Insert(entry));
    }

    fn update(&mut self, entry: Entry) {
        self.pending.push(PendingChange::Update(entry));
    }

    fn delete(&mut self, id: EntryId) {
        self.pending.push(PendingChange::Delete(id));
    }

    fn save(&mut self) -> Result<usize> {
        let changes = std::mem::take(&mut self.pending);
        if changes.is_empty() {
            return Ok(0);
        }

        let tx = self.db.connection_mut().transaction()?;
        for change in &changes {
            Self::apply(&tx, change).map_err(|error| {
                Error::Database(format!("failed to apply change to entry {}: {error}", change.id()))
            })?;
        }
        tx.commit()?;

        tracing::debug!("Committed {} entry change(s)", changes.len());
        Ok(changes.len())
    }

    fn discard(&mut self) {
        if !self.pending.is_empty() {
            tracing::debug!("Discarding {} staged entry change(s)", self.pending.len());
        }
        self.pending.clear();
    }

    fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}
