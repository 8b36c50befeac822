//! The client's view of its authenticated session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use idbridge_core::PrincipalId;

use crate::{Role, RoleSet, TokenClaims};

/// Session state derived from the provider's token.
///
/// `authenticated` is never stored: it is computed as
/// `token_present && now < token_expiry`, so the value cannot drift from the
/// token it describes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    token_present: bool,
    token_expiry: Option<DateTime<Utc>>,
    subject: Option<PrincipalId>,
    roles: RoleSet,
}

impl Session {
    /// The unauthenticated session.
    pub fn logged_out() -> Self {
        Self::default()
    }

    /// A session backed by a token carrying `claims`.
    pub fn from_claims(claims: TokenClaims) -> Self {
        Self {
            token_present: true,
            token_expiry: Some(claims.expires_at),
            subject: claims.subject,
            roles: claims.roles,
        }
    }

    pub fn token_present(&self) -> bool {
        self.token_present
    }

    pub fn token_expiry(&self) -> Option<DateTime<Utc>> {
        self.token_expiry
    }

    pub fn subject(&self) -> Option<PrincipalId> {
        self.subject
    }

    pub fn is_token_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.token_expiry {
            Some(expiry) => now >= expiry,
            None => true,
        }
    }

    pub fn is_authenticated_at(&self, now: DateTime<Utc>) -> bool {
        self.token_present && !self.is_token_expired_at(now)
    }

    /// Roles of the principal, empty once the session is no longer authenticated.
    pub fn roles_at(&self, now: DateTime<Utc>) -> RoleSet {
        if self.is_authenticated_at(now) {
            self.roles.clone()
        } else {
            RoleSet::new()
        }
    }

    pub fn has_role_at(&self, role: Role, now: DateTime<Utc>) -> bool {
        self.is_authenticated_at(now) && self.roles.contains(role)
    }
}
