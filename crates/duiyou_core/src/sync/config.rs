//! Remote sync configuration.
//!
//! # Responsibility
//! - Resolve `{ remoteBaseUrl, remoteFileName }` from environment defaults
//!   overlaid with user-saved values.
//! - Build the remote object URL, failing fast when unconfigured.
//!
//! # Invariants
//! - No endpoint is compiled in; an unset base URL means sync is disabled.
//! - Trailing slashes on the base URL never produce `//` in object URLs.

use crate::repo::kv_repo::{KeyValueStore, RepoResult};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Key holding user-saved sync configuration.
pub const CONFIG_KEY: &str = "duiyou-config";
/// Object name used when none is configured.
pub const DEFAULT_REMOTE_FILE_NAME: &str = "duiyou-backup.json";
/// Environment variable providing the default base URL.
pub const ENV_REMOTE_BASE_URL: &str = "DUIYOU_REMOTE_BASE_URL";
/// Environment variable providing the default object name.
pub const ENV_REMOTE_FILE_NAME: &str = "DUIYOU_REMOTE_FILE_NAME";

/// Missing or invalid remote endpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    MissingBaseUrl,
    InvalidBaseUrl(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingBaseUrl => write!(
                f,
                "remote base URL is not configured; set it in sync settings or {ENV_REMOTE_BASE_URL}"
            ),
            Self::InvalidBaseUrl(value) => {
                write!(f, "remote base URL must start with http:// or https://, got `{value}`")
            }
        }
    }
}

impl Error for ConfigError {}

/// Effective remote sync configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    /// Bucket base URL, without the object name.
    pub remote_base_url: String,
    /// Object name inside the bucket.
    pub remote_file_name: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_base_url: String::new(),
            remote_file_name: DEFAULT_REMOTE_FILE_NAME.to_string(),
        }
    }
}

impl SyncConfig {
    /// Defaults taken from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults taken from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            remote_base_url: lookup(ENV_REMOTE_BASE_URL).unwrap_or(defaults.remote_base_url),
            remote_file_name: lookup(ENV_REMOTE_FILE_NAME)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or(defaults.remote_file_name),
        }
    }

    /// Whether a non-blank base URL is set.
    pub fn is_remote_configured(&self) -> bool {
        !self.remote_base_url.trim().is_empty()
    }

    /// Full object URL: normalized base URL + `/` + object name.
    ///
    /// # Errors
    /// - `MissingBaseUrl` when the base URL is blank.
    /// - `InvalidBaseUrl` when the scheme is not http(s).
    pub fn object_url(&self) -> Result<String, ConfigError> {
        let base = self.remote_base_url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(ConfigError::MissingBaseUrl);
        }
        let lowered = base.to_ascii_lowercase();
        if !(lowered.starts_with("http://") || lowered.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(base.to_string()));
        }

        let file_name = self.remote_file_name.trim().trim_start_matches('/');
        let file_name = if file_name.is_empty() {
            DEFAULT_REMOTE_FILE_NAME
        } else {
            file_name
        };
        Ok(format!("{base}/{file_name}"))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredConfig {
    #[serde(default)]
    remote_base_url: Option<String>,
    #[serde(default)]
    remote_file_name: Option<String>,
}

/// Loads the saved config over environment defaults.
pub fn load_config<K: KeyValueStore + ?Sized>(kv: &K) -> SyncConfig {
    load_config_with_defaults(kv, SyncConfig::from_env())
}

/// Loads the saved config over explicit defaults.
///
/// Saved fields override defaults one by one. Unreadable or corrupt saved
/// values are logged and ignored.
pub fn load_config_with_defaults<K: KeyValueStore + ?Sized>(
    kv: &K,
    defaults: SyncConfig,
) -> SyncConfig {
    let saved = match kv.get(CONFIG_KEY) {
        Ok(Some(saved)) => saved,
        Ok(None) => return defaults,
        Err(err) => {
            warn!("event=config_load module=sync status=error error_code=read_failed error={err}");
            return defaults;
        }
    };

    match serde_json::from_str::<StoredConfig>(&saved) {
        Ok(stored) => SyncConfig {
            remote_base_url: stored.remote_base_url.unwrap_or(defaults.remote_base_url),
            remote_file_name: stored.remote_file_name.unwrap_or(defaults.remote_file_name),
        },
        Err(err) => {
            warn!("event=config_load module=sync status=recovered error_code=parse_failed error={err}");
            defaults
        }
    }
}

/// Saves a user config, replacing any previous one.
pub fn save_config<K: KeyValueStore + ?Sized>(kv: &K, config: &SyncConfig) -> RepoResult<()> {
    let payload = json!({
        "remoteBaseUrl": config.remote_base_url,
        "remoteFileName": config.remote_file_name,
    });
    kv.put(CONFIG_KEY, &payload.to_string())
}

/// Drops the saved config so defaults apply again.
pub fn reset_config<K: KeyValueStore + ?Sized>(kv: &K) -> RepoResult<()> {
    kv.remove(CONFIG_KEY)
}
