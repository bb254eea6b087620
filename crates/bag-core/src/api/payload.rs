//! Defensive parsing of wallabag API bodies.
//!
//! Any missing required field or malformed value becomes
//! [`ApiError::Parse`]; nothing here panics on server input.

use serde::Deserialize;

use super::{ApiError, ApiResult, EntryPage};
use crate::models::{EntryId, RemoteEntry};
use crate::util::parse_timestamp;

/// Older servers send flags as `0`/`1`, newer ones as booleans.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireFlag {
    Bool(bool),
    Int(i64),
}

impl WireFlag {
    const fn as_bool(&self) -> bool {
        match self {
            Self::Bool(value) => *value,
            Self::Int(value) => *value != 0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireNumber {
    Int(i64),
    Float(f64),
}

impl WireNumber {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn as_minutes(&self) -> u32 {
        match self {
            Self::Int(value) => u32::try_from((*value).max(0)).unwrap_or(u32::MAX),
            Self::Float(value) if value.is_finite() => value.max(0.0).round() as u32,
            Self::Float(_) => 0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireEntry {
    id: i64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    url: String,
    #[serde(default)]
    domain_name: Option<String>,
    #[serde(default)]
    preview_picture: Option<String>,
    created_at: String,
    updated_at: String,
    is_starred: WireFlag,
    is_archived: WireFlag,
    #[serde(default)]
    reading_time: Option<WireNumber>,
}

impl TryFrom<WireEntry> for RemoteEntry {
    type Error = ApiError;

    fn try_from(value: WireEntry) -> ApiResult<Self> {
        let created_at = parse_timestamp(&value.created_at).ok_or_else(|| {
            ApiError::Parse(format!(
                "entry {}: invalid created_at '{}'",
                value.id, value.created_at
            ))
        })?;
        let updated_at = parse_timestamp(&value.updated_at).ok_or_else(|| {
            ApiError::Parse(format!(
                "entry {}: invalid updated_at '{}'",
                value.id, value.updated_at
            ))
        })?;

        Ok(Self {
            id: EntryId::new(value.id),
            title: value.title.unwrap_or_default(),
            content: value.content.unwrap_or_default(),
            url: value.url,
            domain_name: non_empty(value.domain_name),
            preview_picture: non_empty(value.preview_picture),
            created_at,
            updated_at,
            is_starred: value.is_starred.as_bool(),
            is_archived: value.is_archived.as_bool(),
            reading_time: value.reading_time.map_or(0, |minutes| minutes.as_minutes()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct WireEmbedded {
    items: Vec<WireEntry>,
}

#[derive(Debug, Deserialize)]
struct WirePage {
    #[serde(rename = "_embedded")]
    embedded: WireEmbedded,
    #[serde(default)]
    last: Option<i64>,
    #[serde(default)]
    pages: Option<i64>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

/// Parse a single entry object (create/update responses).
pub fn parse_entry(body: &str) -> ApiResult<RemoteEntry> {
    let wire = serde_json::from_str::<WireEntry>(body)
        .map_err(|error| ApiError::Parse(format!("entry: {error}")))?;
    wire.try_into()
}

/// Parse a listing page.
pub fn parse_entry_page(body: &str) -> ApiResult<EntryPage> {
    let wire = serde_json::from_str::<WirePage>(body)
        .map_err(|error| ApiError::Parse(format!("entry page: {error}")))?;

    let last_page = wire
        .last
        .or(wire.pages)
        .ok_or_else(|| ApiError::Parse("entry page: missing page count".to_string()))?;
    let last_page = u32::try_from(last_page.max(1)).unwrap_or(u32::MAX);

    let items = wire
        .embedded
        .items
        .into_iter()
        .map(RemoteEntry::try_from)
        .collect::<ApiResult<Vec<_>>>()?;

    Ok(EntryPage { items, last_page })
}
