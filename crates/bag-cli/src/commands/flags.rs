use std::path::Path;

use crate::commands::common::{build_engine, parse_entry_id};
use crate::error::CliError;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FlagChange {
    Archive,
    Unarchive,
    Star,
    Unstar,
}

impl FlagChange {
    pub const fn past_tense(self) -> &'static str {
        match self {
            Self::Archive => "Archived",
            Self::Unarchive => "Unarchived",
            Self::Star => "Starred",
            Self::Unstar => "Unstarred",
        }
    }
}

pub async fn run_set_flag(
    change: FlagChange,
    id: &str,
    db_path: &Path,
    global_profile: Option<&str>,
) -> Result<(), CliError> {
    let id = parse_entry_id(id)?;
    let engine = build_engine(db_path, global_profile)?;

    let entry = match change {
        FlagChange::Archive => engine.set_archived(id, true).await?,
        FlagChange::Unarchive => engine.set_archived(id, false).await?,
        FlagChange::Star => engine.set_starred(id, true).await?,
        FlagChange::Unstar => engine.set_starred(id, false).await?,
    };

    println!("{} {}  {}", change.past_tense(), entry.id, entry.display_title());
    Ok(())
}
