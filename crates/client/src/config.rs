//! Client configuration (endpoints, sync retry policy, flag store location).

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::retry::RetryPolicy;

/// Configuration for the session client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the application backend (no trailing slash).
    pub api_url: String,
    /// Base URL of the identity provider.
    pub provider_url: String,
    pub realm: String,
    pub client_id: String,
    /// Where the provider sends the browser after logout.
    pub logout_redirect_uri: String,
    /// Attempts made by the sync guard before giving up (at least 1).
    pub sync_max_attempts: u32,
    /// Linear backoff unit: attempt `n` waits `n * sync_backoff_base`.
    pub sync_backoff_base: Duration,
    /// Location of the persisted flag store. `None` uses the OS data dir.
    pub flag_store_path: Option<PathBuf>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: '{value}'")]
    Invalid { var: &'static str, value: String },

    #[error("missing required variable {0}")]
    Missing(&'static str),
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080".to_string(),
            provider_url: "http://localhost:9090".to_string(),
            realm: "presta-realm".to_string(),
            client_id: "presta-client".to_string(),
            logout_redirect_uri: "http://localhost:4200".to_string(),
            sync_max_attempts: 3,
            sync_backoff_base: Duration::from_millis(1000),
            flag_store_path: None,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `IDBRIDGE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`ClientConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("IDBRIDGE_API_URL") {
            config = config.with_api_url(v);
        }
        if let Some(v) = lookup("IDBRIDGE_PROVIDER_URL") {
            config.provider_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("IDBRIDGE_REALM") {
            config.realm = v;
        }
        if let Some(v) = lookup("IDBRIDGE_CLIENT_ID") {
            config.client_id = v;
        }
        if let Some(v) = lookup("IDBRIDGE_LOGOUT_REDIRECT") {
            config.logout_redirect_uri = v;
        }
        if let Some(v) = lookup("IDBRIDGE_SYNC_MAX_ATTEMPTS") {
            let attempts = parse_number("IDBRIDGE_SYNC_MAX_ATTEMPTS", &v)?;
            config.sync_max_attempts = match u32::try_from(attempts) {
                Ok(n) if n >= 1 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "IDBRIDGE_SYNC_MAX_ATTEMPTS",
                        value: v,
                    });
                }
            };
        }
        if let Some(v) = lookup("IDBRIDGE_SYNC_BACKOFF_MS") {
            config.sync_backoff_base =
                Duration::from_millis(parse_number("IDBRIDGE_SYNC_BACKOFF_MS", &v)?);
        }
        if let Some(v) = lookup("IDBRIDGE_FLAG_STORE") {
            config.flag_store_path = Some(PathBuf::from(v));
        }

        Ok(config)
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_sync_policy(mut self, max_attempts: u32, backoff_base: Duration) -> Self {
        self.sync_max_attempts = max_attempts.max(1);
        self.sync_backoff_base = backoff_base;
        self
    }

    pub fn with_flag_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.flag_store_path = Some(path.into());
        self
    }

    /// Retry policy used for backend synchronization.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::linear(self.sync_max_attempts, self.sync_backoff_base)
    }
}

fn parse_number(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| ConfigError::Invalid {
        var,
        value: value.to_string(),
    })
}
