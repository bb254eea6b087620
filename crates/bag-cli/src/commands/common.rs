use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bag_core::config::ServerConfig;
use bag_core::db::{Database, SqliteEntryStore};
use bag_core::sync::{SyncEngine, SyncReport};
use bag_core::{Entry, EntryId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::config_profiles::{normalize_text_option, CliProfilesConfig};
use crate::credentials::PasswordStore;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct EntryListItem {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub domain_name: Option<String>,
    pub reading_time: u32,
    pub is_archived: bool,
    pub is_starred: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub relative_time: String,
}

pub fn entry_to_list_item(entry: &Entry) -> EntryListItem {
    EntryListItem {
        id: entry.id.get(),
        title: entry.display_title().to_string(),
        url: entry.url.clone(),
        domain_name: entry.domain_name.clone(),
        reading_time: entry.reading_time,
        is_archived: entry.is_archived,
        is_starred: entry.is_starred,
        created_at: entry.created_at,
        updated_at: entry.updated_at,
        relative_time: format_relative_time(entry.created_at, Utc::now()),
    }
}

pub fn format_entry_lines(entries: &[Entry]) -> Vec<String> {
    let now = Utc::now();
    entries
        .iter()
        .map(|entry| {
            let id = entry.id.to_string();
            let marker = entry_marker(entry);
            let title = truncate(entry.display_title(), 50);
            let domain = entry.domain_name.as_deref().unwrap_or("");
            let relative_time = format_relative_time(entry.created_at, now);
            format!("{id:>6} {marker} {title:<50}  {domain:<24}  {relative_time}")
        })
        .collect()
}

fn entry_marker(entry: &Entry) -> &'static str {
    match (entry.is_starred, entry.is_archived) {
        (true, true) => "*✓",
        (true, false) => "* ",
        (false, true) => " ✓",
        (false, false) => "  ",
    }
}

pub fn truncate(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_relative_time(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now
        .signed_duration_since(timestamp)
        .num_milliseconds()
        .max(0);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn format_sync_report(report: &SyncReport) -> String {
    let mut summary = format!(
        "Synced {} ({} page(s)): {} new, {} updated, {} pushed, {} removed",
        report.mode.human_readable().to_lowercase(),
        report.pages,
        report.inserted,
        report.updated,
        report.pushed,
        report.purged
    );
    if report.push_failures > 0 {
        summary.push_str(&format!(
            ", {} change(s) not sent, will retry next sync",
            report.push_failures
        ));
    }
    summary
}

pub fn parse_entry_id(raw: &str) -> Result<EntryId, CliError> {
    raw.parse::<EntryId>()
        .map_err(|_| CliError::InvalidEntryId(raw.trim().to_string()))
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os("BAG_DB_PATH").map(PathBuf::from)) {
        return Ok(path);
    }
    default_db_path()
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("bag").join("bag.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

pub fn open_store(path: &Path) -> Result<SqliteEntryStore, CliError> {
    Ok(SqliteEntryStore::new(Database::open(path)?))
}

/// Environment overrides, applied over the stored profile.
pub fn server_config_from_env() -> ServerConfig {
    let var = |name: &str| normalize_text_option(env::var(name).ok());
    ServerConfig {
        host: var("BAG_HOST"),
        client_id: var("BAG_CLIENT_ID"),
        client_secret: var("BAG_CLIENT_SECRET"),
        username: var("BAG_USERNAME"),
        // Passwords may legitimately start or end with spaces.
        password: env::var("BAG_PASSWORD").ok().filter(|value| !value.is_empty()),
        per_page: None,
    }
}

/// Profile settings, then the keychain password, then environment overrides.
pub fn resolve_server_config(
    global_profile: Option<&str>,
) -> Result<(String, ServerConfig), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(global_profile);
    let stored = config
        .profile(&profile_name)
        .map(|profile| profile.server_config())
        .unwrap_or_default();
    let password = ServerConfig {
        password: PasswordStore::new(&profile_name).load()?,
        ..ServerConfig::default()
    };

    Ok((
        profile_name,
        stored
            .merged_with(password)
            .merged_with(server_config_from_env()),
    ))
}

pub fn build_engine(
    db_path: &Path,
    global_profile: Option<&str>,
) -> Result<SyncEngine<SqliteEntryStore>, CliError> {
    let (profile_name, server) = resolve_server_config(global_profile)?;
    let missing = server.missing_fields();
    if !missing.is_empty() {
        return Err(CliError::NotConfigured {
            profile: profile_name,
            missing: missing.join(", "),
        });
    }

    let store = Arc::new(Mutex::new(open_store(db_path)?));
    let engine = SyncEngine::from_config(&server, store)?;
    tracing::debug!("Using profile '{}' against {:?}", profile_name, server.host);
    Ok(engine)
}
