//! bag - read-it-later from the terminal, backed by a wallabag server
//!
//! Articles are mirrored into a local SQLite store by `bag sync`; listing is
//! served from that store without touching the network.

mod cli;
mod commands;
mod config_profiles;
mod credentials;
mod error;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::auth_cmd::run_auth;
use crate::commands::common::resolve_db_path;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::delete::run_delete;
use crate::commands::flags::{run_set_flag, FlagChange};
use crate::commands::list::run_list;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "bag=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let profile = cli.profile.as_deref();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    match command {
        Commands::Sync { mode } => {
            let db_path = resolve_db_path(cli.db_path)?;
            run_sync(mode.into(), &db_path, profile).await
        }
        Commands::List { mode, limit, json } => {
            let db_path = resolve_db_path(cli.db_path)?;
            run_list(mode.into(), limit, json, &db_path)
        }
        Commands::Add { url } => {
            let db_path = resolve_db_path(cli.db_path)?;
            run_add(&url, &db_path, profile).await
        }
        Commands::Archive { id } => flag(FlagChange::Archive, &id, cli.db_path, profile).await,
        Commands::Unarchive { id } => {
            flag(FlagChange::Unarchive, &id, cli.db_path, profile).await
        }
        Commands::Star { id } => flag(FlagChange::Star, &id, cli.db_path, profile).await,
        Commands::Unstar { id } => flag(FlagChange::Unstar, &id, cli.db_path, profile).await,
        Commands::Delete { id } => {
            let db_path = resolve_db_path(cli.db_path)?;
            run_delete(&id, &db_path, profile).await
        }
        Commands::Config { command } => run_config(command, profile),
        Commands::Auth { command } => run_auth(command, profile).await,
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref()),
    }
}

async fn flag(
    change: FlagChange,
    id: &str,
    db_path: Option<std::path::PathBuf>,
    profile: Option<&str>,
) -> Result<(), CliError> {
    let db_path = resolve_db_path(db_path)?;
    run_set_flag(change, id, &db_path, profile).await
}

#[cfg(test)]
mod tests;
