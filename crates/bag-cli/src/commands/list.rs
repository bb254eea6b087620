use std::path::Path;

use bag_core::db::EntryStore;
use bag_core::RetrieveMode;

use crate::commands::common::{entry_to_list_item, format_entry_lines, open_store, EntryListItem};
use crate::error::CliError;

pub fn run_list(
    mode: RetrieveMode,
    limit: usize,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let entries = store.list(mode, limit)?;

    if as_json {
        let json_items = entries
            .iter()
            .map(entry_to_list_item)
            .collect::<Vec<EntryListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if entries.is_empty() {
        println!(
            "No {} stored. Run `bag sync` first.",
            mode.human_readable().to_lowercase()
        );
    } else {
        for line in format_entry_lines(&entries) {
            println!("{line}");
        }
    }

    Ok(())
}
