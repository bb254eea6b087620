use bag_core::db::EntryStore;
use bag_core::sync::SyncReport;
use bag_core::{Entry, EntryId, RetrieveMode};
use chrono::{Duration, TimeZone, Utc};
use clap::{CommandFactory, Parser};
use pretty_assertions::assert_eq;

use crate::cli::{Cli, Commands, CompletionShell, ModeArg};
use crate::commands::common::{
    entry_to_list_item, format_entry_lines, format_relative_time, format_sync_report,
    open_store, parse_entry_id, truncate,
};
use crate::commands::completions::write_completions;
use crate::commands::config::{merge_profile, ProfileInput};
use crate::commands::flags::FlagChange;
use crate::commands::list::run_list;
use crate::config_profiles::CliProfile;
use crate::error::CliError;

fn entry(id: i64, title: &str) -> Entry {
    let created = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
    Entry {
        id: EntryId::new(id),
        title: title.to_string(),
        content: "<p>body</p>".to_string(),
        url: format!("https://example.com/{id}"),
        domain_name: Some("example.com".to_string()),
        preview_picture: None,
        created_at: created,
        updated_at: created,
        is_starred: false,
        is_archived: false,
        reading_time: 4,
        screen_position: 0.0,
    }
}

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn list_accepts_mode_aliases() {
    let cli = Cli::try_parse_from(["bag", "list", "--mode", "read", "--json"]).unwrap();
    match cli.command {
        Some(Commands::List { mode, limit, json }) => {
            assert_eq!(mode, ModeArg::Archived);
            assert_eq!(limit, 20);
            assert!(json);
        }
        _ => panic!("expected list command"),
    }
}

#[test]
fn sync_defaults_to_all_mode() {
    let cli = Cli::try_parse_from(["bag", "sync"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Sync { mode: ModeArg::All })
    ));
}

#[test]
fn global_options_follow_subcommands() {
    let cli =
        Cli::try_parse_from(["bag", "star", "42", "--profile", "work", "--db-path", "x.db"])
            .unwrap();
    assert_eq!(cli.profile.as_deref(), Some("work"));
    assert_eq!(cli.db_path.as_deref(), Some(std::path::Path::new("x.db")));
    assert!(matches!(cli.command, Some(Commands::Star { id }) if id == "42"));
}

#[test]
fn save_is_an_alias_for_add() {
    let cli = Cli::try_parse_from(["bag", "save", "https://example.com"]).unwrap();
    assert!(matches!(cli.command, Some(Commands::Add { url }) if url == "https://example.com"));
}

#[test]
fn unknown_mode_is_rejected() {
    assert!(Cli::try_parse_from(["bag", "sync", "--mode", "everything"]).is_err());
}

#[test]
fn mode_arg_maps_to_retrieve_mode() {
    assert_eq!(RetrieveMode::from(ModeArg::All), RetrieveMode::All);
    assert_eq!(RetrieveMode::from(ModeArg::Archived), RetrieveMode::Archived);
    assert_eq!(RetrieveMode::from(ModeArg::Unarchived), RetrieveMode::Unarchived);
    assert_eq!(RetrieveMode::from(ModeArg::Starred), RetrieveMode::Starred);
}

#[test]
fn parse_entry_id_accepts_numbers_only() {
    assert_eq!(parse_entry_id(" 17 ").unwrap(), EntryId::new(17));
    assert!(matches!(
        parse_entry_id("abc"),
        Err(CliError::InvalidEntryId(raw)) if raw == "abc"
    ));
}

#[test]
fn truncate_collapses_whitespace_and_adds_ellipsis() {
    assert_eq!(truncate("a   short\n title", 50), "a short title");
    assert_eq!(truncate("abcdefghij", 8), "abcde...");
}

#[test]
fn format_relative_time_uses_largest_unit() {
    let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
    assert_eq!(format_relative_time(now, now), "just now");
    assert_eq!(format_relative_time(now - Duration::minutes(5), now), "5m ago");
    assert_eq!(format_relative_time(now - Duration::hours(3), now), "3h ago");
    assert_eq!(format_relative_time(now - Duration::days(2), now), "2d ago");
    assert_eq!(format_relative_time(now - Duration::days(14), now), "2w ago");
    assert_eq!(format_relative_time(now - Duration::days(90), now), "3mo ago");
    assert_eq!(format_relative_time(now - Duration::days(800), now), "2y ago");
    assert_eq!(format_relative_time(now + Duration::hours(1), now), "just now");
}

#[test]
fn format_sync_report_mentions_push_failures() {
    let report = SyncReport {
        mode: RetrieveMode::All,
        pages: 2,
        inserted: 3,
        updated: 1,
        pushed: 1,
        purged: 2,
        push_failures: 1,
        ..SyncReport::default()
    };
    assert_eq!(
        format_sync_report(&report),
        "Synced all articles (2 page(s)): 3 new, 1 updated, 1 pushed, 2 removed, \
         1 change(s) not sent, will retry next sync"
    );
}

#[test]
fn format_entry_lines_marks_flags_and_falls_back_to_url() {
    let mut starred = entry(7, "Starred one");
    starred.is_starred = true;
    let mut untitled = entry(8, "  ");
    untitled.is_archived = true;

    let lines = format_entry_lines(&[starred, untitled]);
    assert!(lines[0].starts_with("     7 * "));
    assert!(lines[0].contains("Starred one"));
    assert!(lines[1].contains(" ✓ https://example.com/8"));
    assert!(lines[1].contains("example.com"));
}

#[test]
fn entry_to_list_item_copies_flags() {
    let mut source = entry(3, "Title");
    source.is_archived = true;
    let item = entry_to_list_item(&source);
    assert_eq!(item.id, 3);
    assert_eq!(item.title, "Title");
    assert!(item.is_archived);
    assert!(!item.is_starred);

    let json = serde_json::to_value(&item).unwrap();
    assert_eq!(json["url"], "https://example.com/3");
}

#[test]
fn run_list_reads_local_store() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("bag.db");

    run_list(RetrieveMode::Unarchived, 10, false, &db_path).unwrap();

    let mut store = open_store(&db_path).unwrap();
    store.insert(entry(1, "First"));
    store.save().unwrap();
    drop(store);

    run_list(RetrieveMode::All, 10, true, &db_path).unwrap();
    let store = open_store(&db_path).unwrap();
    assert_eq!(store.list(RetrieveMode::Unarchived, 10).unwrap().len(), 1);
}

#[test]
fn completions_reference_binary_name() {
    for shell in [CompletionShell::Bash, CompletionShell::Zsh, CompletionShell::Fish] {
        let mut buffer = Vec::new();
        write_completions(shell, &mut buffer);
        let script = String::from_utf8(buffer).unwrap();
        assert!(script.contains("bag"), "{shell:?} completions missing name");
    }
}

#[test]
fn flag_change_labels() {
    assert_eq!(FlagChange::Archive.past_tense(), "Archived");
    assert_eq!(FlagChange::Unstar.past_tense(), "Unstarred");
}

#[test]
fn merge_profile_prefers_explicit_values_and_normalizes_host() {
    let existing = CliProfile {
        host: Some("https://old.example.com".to_string()),
        client_id: Some("old-client".to_string()),
        client_secret: Some("old-secret".to_string()),
        username: Some("reader".to_string()),
        per_page: Some(50),
    };
    let input = ProfileInput {
        host: Some(" https://new.example.com/ ".to_string()),
        client_id: Some("new-client".to_string()),
        client_secret: Some("new-secret".to_string()),
        username: Some("writer".to_string()),
        per_page: None,
    };

    let merged = merge_profile(existing, input).unwrap();
    assert_eq!(merged.host.as_deref(), Some("https://new.example.com"));
    assert_eq!(merged.client_id.as_deref(), Some("new-client"));
    assert_eq!(merged.client_secret.as_deref(), Some("new-secret"));
    assert_eq!(merged.username.as_deref(), Some("writer"));
    assert_eq!(merged.per_page, Some(50));
}

#[test]
fn merge_profile_rejects_bad_host_and_page_size() {
    let bad_host = ProfileInput {
        host: Some("bag.example.com".to_string()),
        ..ProfileInput::default()
    };
    assert!(matches!(
        merge_profile(CliProfile::default(), bad_host),
        Err(CliError::Config(_))
    ));

    let bad_page = ProfileInput {
        host: Some("https://bag.example.com".to_string()),
        per_page: Some(0),
        ..ProfileInput::default()
    };
    assert!(matches!(
        merge_profile(CliProfile::default(), bad_page),
        Err(CliError::Config(_))
    ));
}
