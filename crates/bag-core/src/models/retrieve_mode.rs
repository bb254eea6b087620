//! Listing filter applied to remote entry pages.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which slice of the remote collection a listing asks for.
///
/// Only [`RetrieveMode::All`] describes the full collection; the other modes
/// are projections and never drive a purge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrieveMode {
    #[default]
    All,
    Archived,
    Unarchived,
    Starred,
}

impl RetrieveMode {
    /// Query constraints sent with `GET /api/entries`.
    pub const fn query_params(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::All => &[],
            Self::Archived => &[("archive", "1")],
            Self::Unarchived => &[("archive", "0")],
            Self::Starred => &[("starred", "1")],
        }
    }

    /// Label shown to people.
    pub const fn human_readable(self) -> &'static str {
        match self {
            Self::All => "All articles",
            Self::Archived => "Read articles",
            Self::Unarchived => "Unread articles",
            Self::Starred => "Starred articles",
        }
    }

    /// Whether a listing in this mode covers every remote entry.
    pub const fn is_complete(self) -> bool {
        matches!(self, Self::All)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Archived => "archived",
            Self::Unarchived => "unarchived",
            Self::Starred => "starred",
        }
    }
}

impl fmt::Display for RetrieveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetrieveMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "archived" | "read" => Ok(Self::Archived),
            "unarchived" | "unread" => Ok(Self::Unarchived),
            "starred" => Ok(Self::Starred),
            other => Err(format!("unknown retrieve mode '{other}'")),
        }
    }
}
