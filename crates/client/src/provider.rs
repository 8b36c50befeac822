//! Identity-provider contract.
//!
//! The provider owns the authentication protocol (redirects, token refresh,
//! signature checks). The session layer only consumes the operations below.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::config::ConfigError;
use crate::error::ProviderError;
use crate::models::ProviderProfile;

/// Tokens remembered from a previous run, handed back for silent re-authentication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitOptions {
    pub token: Option<String>,
    pub refresh_token: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Check for an existing provider session. Returns whether the principal is authenticated.
    async fn init(&self, options: InitOptions) -> Result<bool, ProviderError>;

    /// Run the interactive login; completes once the provider hands control back.
    async fn login(&self) -> Result<(), ProviderError>;

    /// End the provider session, sending the user agent to `redirect_uri`.
    async fn logout(&self, redirect_uri: &str) -> Result<(), ProviderError>;

    /// Current access token, if any.
    fn token(&self) -> Option<String>;

    fn refresh_token(&self) -> Option<String>;

    /// Expiry of the current access token.
    fn token_expires_at(&self) -> Option<DateTime<Utc>>;

    fn is_token_expired(&self) -> bool;

    /// Raw realm roles from the decoded token.
    fn realm_roles(&self) -> Vec<String>;

    /// The provider's own profile record for the principal.
    async fn load_profile(&self) -> Result<ProviderProfile, ProviderError>;
}

/// Provider over a pre-issued bearer token whose claims come from configuration.
///
/// Meant for service accounts and command-line use where the token was
/// obtained out of band. Login and logout only flip local state.
#[derive(Debug)]
pub struct StaticTokenProvider {
    token: String,
    roles: Vec<String>,
    expires_at: DateTime<Utc>,
    profile: ProviderProfile,
    authenticated: RwLock<bool>,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>, roles: Vec<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            roles,
            expires_at,
            profile: ProviderProfile::default(),
            authenticated: RwLock::new(false),
        }
    }

    pub fn with_profile(mut self, profile: ProviderProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Build from `IDBRIDGE_TOKEN`, `IDBRIDGE_ROLES` and `IDBRIDGE_TOKEN_TTL_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("IDBRIDGE_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::Missing("IDBRIDGE_TOKEN"))?;

        let roles = lookup("IDBRIDGE_ROLES")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let ttl_secs = match lookup("IDBRIDGE_TOKEN_TTL_SECS") {
            Some(raw) => raw.trim().parse::<i64>().map_err(|_| ConfigError::Invalid {
                var: "IDBRIDGE_TOKEN_TTL_SECS",
                value: raw.clone(),
            })?,
            None => 300,
        };

        let profile = ProviderProfile {
            username: lookup("IDBRIDGE_USERNAME"),
            email: lookup("IDBRIDGE_EMAIL"),
            ..ProviderProfile::default()
        };

        Ok(Self::new(token, roles, Utc::now() + Duration::seconds(ttl_secs)).with_profile(profile))
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated.read().map(|a| *a).unwrap_or(false)
    }

    fn set_authenticated(&self, value: bool) -> Result<(), ProviderError> {
        let mut guard = self
            .authenticated
            .write()
            .map_err(|_| ProviderError::Unavailable("provider state poisoned".to_string()))?;
        *guard = value;
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for StaticTokenProvider {
    async fn init(&self, _options: InitOptions) -> Result<bool, ProviderError> {
        let valid = Utc::now() < self.expires_at;
        self.set_authenticated(valid)?;
        Ok(valid)
    }

    async fn login(&self) -> Result<(), ProviderError> {
        if Utc::now() >= self.expires_at {
            return Err(ProviderError::Login("configured token has expired".to_string()));
        }
        self.set_authenticated(true)
    }

    async fn logout(&self, _redirect_uri: &str) -> Result<(), ProviderError> {
        self.set_authenticated(false)
    }

    fn token(&self) -> Option<String> {
        self.is_authenticated().then(|| self.token.clone())
    }

    fn refresh_token(&self) -> Option<String> {
        None
    }

    fn token_expires_at(&self) -> Option<DateTime<Utc>> {
        self.is_authenticated().then_some(self.expires_at)
    }

    fn is_token_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    fn realm_roles(&self) -> Vec<String> {
        if self.is_authenticated() {
            self.roles.clone()
        } else {
            Vec::new()
        }
    }

    async fn load_profile(&self) -> Result<ProviderProfile, ProviderError> {
        if !self.is_authenticated() {
            return Err(ProviderError::Profile("not authenticated".to_string()));
        }
        Ok(self.profile.clone())
    }
}
