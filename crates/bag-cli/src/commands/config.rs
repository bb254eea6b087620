use std::env;

use bag_core::config::normalize_host;

use crate::cli::ConfigCommands;
use crate::config_profiles::{normalize_text_option, CliProfile, CliProfilesConfig};
use crate::credentials::PasswordStore;
use crate::error::CliError;

const MAX_PER_PAGE: u32 = 500;

/// Values passed to `bag config init`; unset ones keep the stored profile's.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileInput {
    pub host: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub username: Option<String>,
    pub per_page: Option<u32>,
}

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            host,
            client_id,
            client_secret,
            username,
            per_page,
            no_activate,
        } => run_config_init(
            global_profile,
            ProfileInput {
                host,
                client_id,
                client_secret,
                username,
                per_page,
            },
            no_activate,
        ),
    }
}

pub fn run_config_init(
    profile_name: Option<&str>,
    input: ProfileInput,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let existing = config.profile(&profile_name).cloned().unwrap_or_default();

    let merged = merge_profile(existing, input)?;
    *config.profile_mut_or_default(&profile_name) = merged;

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        path.display()
    );

    let profile = config
        .profile(&profile_name)
        .ok_or_else(|| CliError::Config("Failed to persist profile".to_string()))?;
    let mut missing_fields = profile.server_config().missing_fields();
    missing_fields.retain(|field| *field != "password");
    let has_password = PasswordStore::new(&profile_name).load()?.is_some();

    if !missing_fields.is_empty() {
        println!(
            "Profile '{}' is missing: {}",
            profile_name,
            missing_fields.join(", ")
        );
    } else if has_password {
        println!("Profile '{profile_name}' is ready. Run `bag sync`.");
    } else {
        println!(
            "Profile '{profile_name}' is ready. Run `bag auth login --password <password>`."
        );
    }

    Ok(())
}

/// Explicit values win, then `BAG_*` environment variables, then what is stored.
pub fn merge_profile(existing: CliProfile, input: ProfileInput) -> Result<CliProfile, CliError> {
    let from_env = |name: &str| normalize_text_option(env::var(name).ok());

    let host = normalize_text_option(input.host)
        .or_else(|| from_env("BAG_HOST"))
        .or(existing.host);
    let host = match host {
        Some(host) => {
            Some(normalize_host(Some(host)).map_err(|error| CliError::Config(error.to_string()))?)
        }
        None => None,
    };

    let per_page = input.per_page.or(existing.per_page);
    if let Some(value) = per_page.filter(|value| !(1..=MAX_PER_PAGE).contains(value)) {
        return Err(CliError::Config(format!(
            "per_page must be between 1 and {MAX_PER_PAGE}, got {value}"
        )));
    }

    Ok(CliProfile {
        host,
        client_id: normalize_text_option(input.client_id)
            .or_else(|| from_env("BAG_CLIENT_ID"))
            .or(existing.client_id),
        client_secret: normalize_text_option(input.client_secret)
            .or_else(|| from_env("BAG_CLIENT_SECRET"))
            .or(existing.client_secret),
        username: normalize_text_option(input.username)
            .or_else(|| from_env("BAG_USERNAME"))
            .or(existing.username),
        per_page,
    })
}
