use std::path::Path;

use crate::commands::common::{build_engine, parse_entry_id};
use crate::error::CliError;

pub async fn run_delete(
    id: &str,
    db_path: &Path,
    global_profile: Option<&str>,
) -> Result<(), CliError> {
    let id = parse_entry_id(id)?;
    let engine = build_engine(db_path, global_profile)?;

    engine.delete_entry(id).await?;
    println!("{id}");
    Ok(())
}
