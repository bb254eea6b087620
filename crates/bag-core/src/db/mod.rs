//! Local entry persistence

mod connection;
mod migrations;
mod repository;

pub use connection::Database;
pub use repository::{EntryStore, PendingChange, SqliteEntryStore};
