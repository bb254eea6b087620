//! bag-core - Core library for bag
//!
//! This crate contains the entry model, the local SQLite store, the wallabag
//! API client with its token manager, and the sync engine that reconciles the
//! two. The `bag` CLI is a thin shell around it.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod index;
pub mod models;
pub mod state;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Entry, EntryId, RetrieveMode};
