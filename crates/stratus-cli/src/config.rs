//! Runtime configuration.
//!
//! Values come from CLI flags first, then environment overrides, then
//! defaults. Environment access goes through a lookup function so tests never
//! touch the process environment.

use std::path::{Path, PathBuf};

use tracing::debug;
use url::Url;

use crate::error::CliError;

/// Production service host.
pub const DEFAULT_HOST: &str = "stratusapp.com";

/// Selects an alternate service host.
pub const HOST_ENV: &str = "STRATUS_HOST";

/// Overrides the API base URL derived from the host.
pub const API_URL_ENV: &str = "STRATUS_API_URL";

/// Set to `disable` to skip TLS peer verification for rendezvous.
pub const SSL_VERIFY_ENV: &str = "STRATUS_SSL_VERIFY";

/// API key used instead of stored credentials.
pub const API_KEY_ENV: &str = "STRATUS_API_KEY";

const CREDENTIALS_DIR: &str = ".stratus";
const CREDENTIALS_FILE: &str = "credentials";

/// Resolved configuration for one invocation.
#[derive(Debug, Clone)]
pub struct Config {
    /// Service host, used for git remotes and the default API URL.
    pub host: String,
    /// API base URL.
    pub api_url: Url,
    /// Location of the credentials file.
    pub credentials_path: PathBuf,
    /// `STRATUS_SSL_VERIFY=disable` was set.
    pub ssl_verify_disabled: bool,
    /// `STRATUS_API_KEY`, when set and non-empty.
    pub api_key: Option<String>,
}

impl Config {
    /// Build configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory is unknown or the API URL is
    /// malformed.
    pub fn from_env(host: Option<&str>) -> Result<Self, CliError> {
        Self::from_lookup(host, |key| std::env::var(key).ok(), dirs::home_dir())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if `home` is `None` or the API URL is malformed.
    pub fn from_lookup<F>(host: Option<&str>, lookup: F, home: Option<PathBuf>) -> Result<Self, CliError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = host
            .map(str::to_string)
            .or_else(|| non_empty(HOST_ENV))
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let api_url = non_empty(API_URL_ENV).unwrap_or_else(|| format!("https://api.{host}"));
        let api_url = Url::parse(&api_url)
            .map_err(|e| CliError::Config(format!("invalid API URL {api_url}: {e}")))?;

        let home = home.ok_or_else(|| CliError::Config("cannot determine home directory".into()))?;
        let credentials_path = home.join(CREDENTIALS_DIR).join(CREDENTIALS_FILE);

        let ssl_verify_disabled = lookup(SSL_VERIFY_ENV).is_some_and(|v| v == "disable");
        let api_key = non_empty(API_KEY_ENV);

        debug!(%host, %api_url, ssl_verify_disabled, "configuration resolved");

        Ok(Self {
            host,
            api_url,
            credentials_path,
            ssl_verify_disabled,
            api_key,
        })
    }

    /// Path of the credentials file.
    #[must_use]
    pub fn credentials_path(&self) -> &Path {
        &self.credentials_path
    }

    /// Whether a rendezvous TLS peer at `peer_host` should be verified.
    ///
    /// Only production hosts are verified, and only while verification has
    /// not been disabled through the environment.
    #[must_use]
    pub fn verify_rendezvous_tls(&self, peer_host: &str) -> bool {
        is_production_host(peer_host) && !self.ssl_verify_disabled
    }
}

/// Whether `host` belongs to the production domain.
#[must_use]
pub fn is_production_host(host: &str) -> bool {
    host == DEFAULT_HOST || host.ends_with(&format!(".{DEFAULT_HOST}"))
}
