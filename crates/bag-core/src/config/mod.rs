//! Server configuration for the wallabag API client.
//!
//! A [`ServerConfig`] is assembled by the caller (CLI profile, environment,
//! tests) and validated once before a client is built. A session cannot start
//! without every credential field present.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

/// Entries requested per listing page when the config does not say otherwise.
pub const DEFAULT_PER_PAGE: u32 = 30;

const MAX_PER_PAGE: u32 = 500;

/// Connection settings and credentials for one wallabag instance.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub per_page: Option<u32>,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("per_page", &self.per_page)
            .finish()
    }
}

/// A [`ServerConfig`] with every required field present and normalized.
#[derive(Clone, PartialEq, Eq)]
pub struct ValidatedConfig {
    pub host: String,
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub per_page: u32,
}

impl fmt::Debug for ValidatedConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ValidatedConfig")
            .field("host", &self.host)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("per_page", &self.per_page)
            .finish()
    }
}

impl ServerConfig {
    /// Layer `other` on top of `self`: fields set in `other` win.
    #[must_use]
    pub fn merged_with(self, other: Self) -> Self {
        Self {
            host: normalize_text_option(other.host).or(self.host),
            client_id: normalize_text_option(other.client_id).or(self.client_id),
            client_secret: normalize_text_option(other.client_secret).or(self.client_secret),
            username: normalize_text_option(other.username).or(self.username),
            password: other
                .password
                .filter(|password| !password.trim().is_empty())
                .or(self.password),
            per_page: other.per_page.or(self.per_page),
        }
    }

    /// Names of required fields that are missing or blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("host", &self.host),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("username", &self.username),
            ("password", &self.password),
        ]
        .into_iter()
        .filter(|(_, value)| normalize_text_option((*value).clone()).is_none())
        .map(|(name, _)| name)
        .collect()
    }

    pub fn validate(&self) -> Result<ValidatedConfig> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "missing required field(s): {}",
                missing.join(", ")
            )));
        }

        let host = normalize_host(self.host.clone())?;
        let per_page = match self.per_page {
            None => DEFAULT_PER_PAGE,
            Some(value) if (1..=MAX_PER_PAGE).contains(&value) => value,
            Some(value) => {
                return Err(Error::Config(format!(
                    "per_page must be between 1 and {MAX_PER_PAGE}, got {value}"
                )))
            }
        };

        Ok(ValidatedConfig {
            host,
            client_id: required(self.client_id.clone()),
            client_secret: required(self.client_secret.clone()),
            username: required(self.username.clone()),
            // Passwords are taken verbatim; surrounding spaces may be significant.
            password: self.password.clone().unwrap_or_default(),
            per_page,
        })
    }
}

fn required(value: Option<String>) -> String {
    normalize_text_option(value).unwrap_or_default()
}

/// Trim the host, require an http(s) scheme and drop trailing slashes.
pub fn normalize_host(raw: Option<String>) -> Result<String> {
    let host = normalize_text_option(raw)
        .ok_or_else(|| Error::Config("host must not be empty".to_string()))?;
    if !is_http_url(&host) {
        return Err(Error::Config(
            "host must include http:// or https://".to_string(),
        ));
    }
    Ok(host.trim_end_matches('/').to_string())
}
