//! Remote entry gateway.
//!
//! [`EntryGateway`] is the seam the sync engine talks through; [`ApiClient`]
//! is the reqwest implementation against a wallabag server.

mod client;
mod payload;

use async_trait::async_trait;
use thiserror::Error;

use crate::auth::AuthError;
use crate::models::{EntryId, RemoteEntry, RetrieveMode};

pub use client::ApiClient;
pub use payload::{parse_entry, parse_entry_page};

#[derive(Debug, Error)]
pub enum ApiError {
    /// No usable token could be obtained; the request was never sent.
    #[error("Authentication failed: {0}")]
    Authentication(#[from] AuthError),
    /// The server rejected the token that was sent.
    #[error("Access token rejected: {0}")]
    Unauthorized(String),
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Server error: {message} ({status})")]
    Http { status: u16, message: String },
    #[error("Unreadable response: {0}")]
    Parse(String),
}

impl ApiError {
    pub const fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_) | Self::Unauthorized(_))
    }

    /// Whether a caller may reasonably try the same request again.
    ///
    /// Parse failures count as transport failures; nothing is retried
    /// automatically.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Http { .. } | Self::Parse(_))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// One page of the remote listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPage {
    pub items: Vec<RemoteEntry>,
    /// Total number of pages for the requested filter; at least 1.
    pub last_page: u32,
}

/// Flags to change on a remote entry. Unset fields are left alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryUpdate {
    pub archive: Option<bool>,
    pub starred: Option<bool>,
}

impl EntryUpdate {
    /// Both flags, as a push of local state.
    pub const fn flags(archive: bool, starred: bool) -> Self {
        Self {
            archive: Some(archive),
            starred: Some(starred),
        }
    }

    /// Form fields in the `0`/`1` encoding the server expects.
    pub fn form_fields(&self) -> Vec<(&'static str, &'static str)> {
        let encode = |value: bool| if value { "1" } else { "0" };
        let mut fields = Vec::with_capacity(2);
        if let Some(archive) = self.archive {
            fields.push(("archive", encode(archive)));
        }
        if let Some(starred) = self.starred {
            fields.push(("starred", encode(starred)));
        }
        fields
    }
}

/// Authenticated operations on remote entries.
#[async_trait]
pub trait EntryGateway: Send + Sync {
    /// Fetch one page (1-based) of the listing for `mode`.
    async fn list_page(&self, page: u32, mode: RetrieveMode) -> ApiResult<EntryPage>;

    /// Save a new URL on the server.
    async fn create(&self, url: &str) -> ApiResult<RemoteEntry>;

    /// Change flags; the server answers with the full updated entry.
    async fn update(&self, id: EntryId, fields: &EntryUpdate) -> ApiResult<RemoteEntry>;

    async fn delete(&self, id: EntryId) -> ApiResult<()>;
}
