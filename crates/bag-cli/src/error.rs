use std::io;

use bag_core::api::ApiError;
use bag_core::sync::{MutationError, SyncError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] bag_core::Error),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Mutation(#[from] MutationError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Entry ID must be a number, got '{0}'")]
    InvalidEntryId(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Credential storage error: {0}")]
    Credentials(String),
    #[error(
        "Profile '{profile}' is missing: {missing}. Run `bag config init` and `bag auth login`, or set the BAG_* environment variables."
    )]
    NotConfigured { profile: String, missing: String },
}
