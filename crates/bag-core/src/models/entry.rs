//! Entry model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier assigned by the remote service; stable across sync cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(i64);

impl EntryId {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for EntryId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntryId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// One article as the remote service describes it.
///
/// Parsed from a single API item and only used to create or refresh a local
/// [`Entry`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub id: EntryId,
    pub title: String,
    pub content: String,
    pub url: String,
    pub domain_name: Option<String>,
    pub preview_picture: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_starred: bool,
    pub is_archived: bool,
    pub reading_time: u32,
}

/// An article persisted in the local store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Remote identifier
    pub id: EntryId,
    pub title: String,
    /// Article HTML as returned by the server
    pub content: String,
    pub url: String,
    pub domain_name: Option<String>,
    pub preview_picture: Option<String>,
    /// Set on insert, never changed afterwards
    pub created_at: DateTime<Utc>,
    /// Sole signal used to resolve sync conflicts
    pub updated_at: DateTime<Utc>,
    pub is_starred: bool,
    pub is_archived: bool,
    /// Estimated reading time in minutes
    pub reading_time: u32,
    /// Local scroll offset, never sent to the server
    pub screen_position: f64,
}

impl Entry {
    /// Build a new local entry; the remote copy is authoritative for every field.
    #[must_use]
    pub fn from_remote(remote: &RemoteEntry) -> Self {
        Self {
            id: remote.id,
            title: remote.title.clone(),
            content: remote.content.clone(),
            url: remote.url.clone(),
            domain_name: remote.domain_name.clone(),
            preview_picture: remote.preview_picture.clone(),
            created_at: remote.created_at,
            updated_at: remote.updated_at,
            is_starred: remote.is_starred,
            is_archived: remote.is_archived,
            reading_time: remote.reading_time,
            screen_position: 0.0,
        }
    }

    /// Overwrite every server-authoritative field from `remote`.
    ///
    /// `created_at` and `screen_position` are kept.
    pub fn apply_remote(&mut self, remote: &RemoteEntry) {
        self.title.clone_from(&remote.title);
        self.content.clone_from(&remote.content);
        self.url.clone_from(&remote.url);
        self.domain_name.clone_from(&remote.domain_name);
        self.preview_picture.clone_from(&remote.preview_picture);
        self.updated_at = remote.updated_at;
        self.is_starred = remote.is_starred;
        self.is_archived = remote.is_archived;
        self.reading_time = remote.reading_time;
    }

    /// Title for display, falling back to the URL for untitled articles.
    #[must_use]
    pub fn display_title(&self) -> &str {
        let title = self.title.trim();
        if title.is_empty() {
            &self.url
        } else {
            title
        }
    }
}
