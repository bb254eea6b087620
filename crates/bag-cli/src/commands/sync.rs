use std::path::Path;

use bag_core::sync::{SyncError, SyncOutcome};
use bag_core::RetrieveMode;

use crate::commands::common::{build_engine, format_sync_report};
use crate::error::CliError;

pub async fn run_sync(
    mode: RetrieveMode,
    db_path: &Path,
    global_profile: Option<&str>,
) -> Result<(), CliError> {
    let engine = build_engine(db_path, global_profile)?;

    match engine.sync(mode).await {
        Ok(SyncOutcome::Completed(report)) => {
            println!("{}", format_sync_report(&report));
            Ok(())
        }
        Ok(SyncOutcome::AlreadyRunning) => {
            println!("A sync is already in progress");
            Ok(())
        }
        Err(error) => {
            if let SyncError::Incomplete { report, .. } = &error {
                println!("{}", format_sync_report(report));
            }
            Err(error.into())
        }
    }
}
