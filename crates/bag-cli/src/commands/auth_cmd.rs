use bag_core::api::ApiClient;
use bag_core::config::ServerConfig;

use crate::cli::AuthCommands;
use crate::commands::common::server_config_from_env;
use crate::config_profiles::{normalize_text_option, CliProfilesConfig};
use crate::credentials::PasswordStore;
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        AuthCommands::Login { username, password } => {
            run_login(global_profile, username, password).await
        }
        AuthCommands::Status => run_status(global_profile),
        AuthCommands::Logout => {
            let config = CliProfilesConfig::load().map_err(CliError::Config)?;
            let profile_name = config.resolve_profile_name(global_profile);
            PasswordStore::new(&profile_name).clear()?;
            println!("Removed stored password for profile '{profile_name}'");
            Ok(())
        }
    }
}

/// Request a token with the given password before storing it, so a typo
/// never lands in the keychain.
async fn run_login(
    global_profile: Option<&str>,
    username: Option<String>,
    password: String,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(global_profile);
    let stored = config
        .profile(&profile_name)
        .map(|profile| profile.server_config())
        .unwrap_or_default();

    let username = normalize_text_option(username);
    let server = stored
        .merged_with(server_config_from_env())
        .merged_with(ServerConfig {
            username: username.clone(),
            password: Some(password.clone()),
            ..ServerConfig::default()
        });
    let validated = server.validate().map_err(|error| {
        CliError::Config(format!(
            "Profile '{profile_name}' cannot log in: {error}. Run `bag config init` first."
        ))
    })?;

    let client = ApiClient::new(&validated)?;
    client.verify_credentials().await?;

    PasswordStore::new(&profile_name).save(&password)?;
    if let Some(username) = username {
        config.profile_mut_or_default(&profile_name).username = Some(username);
        config.save().map_err(CliError::Config)?;
    }

    println!(
        "Signed in profile '{}' as {} on {}",
        profile_name, validated.username, validated.host
    );
    Ok(())
}

fn run_status(global_profile: Option<&str>) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(global_profile);
    let Some(profile) = config.profile(&profile_name) else {
        println!("Profile '{profile_name}' is not configured.");
        return Ok(());
    };

    let host = profile.host.as_deref().unwrap_or("(no host)");
    let username = profile.username.as_deref().unwrap_or("(no username)");
    if PasswordStore::new(&profile_name).load()?.is_some() {
        println!("Profile '{profile_name}' has a stored password for {username} on {host}");
    } else {
        println!("Profile '{profile_name}' ({username} on {host}) has no stored password.");
    }
    Ok(())
}
