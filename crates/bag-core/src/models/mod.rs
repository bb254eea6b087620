//! Data models for bag

mod entry;
mod retrieve_mode;

pub use entry::{Entry, EntryId, RemoteEntry};
pub use retrieve_mode::RetrieveMode;
