use std::path::Path;

use crate::commands::common::build_engine;
use crate::error::CliError;

pub async fn run_add(
    url: &str,
    db_path: &Path,
    global_profile: Option<&str>,
) -> Result<(), CliError> {
    let engine = build_engine(db_path, global_profile)?;
    let entry = engine.add_url(url).await?;

    println!("{}  {}", entry.id, entry.display_title());
    Ok(())
}
