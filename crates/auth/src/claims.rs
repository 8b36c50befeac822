use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use idbridge_core::PrincipalId;

use crate::RoleSet;

/// What the session layer needs from a token the identity provider has
/// already decoded and verified.
///
/// Signature checks and token-format parsing stay with the provider; this is
/// only the projection the client acts on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject / principal identifier, when the provider exposes it.
    pub subject: Option<PrincipalId>,

    /// Realm roles recognised by the application.
    pub roles: RoleSet,

    /// Issued-at timestamp, when known.
    pub issued_at: Option<DateTime<Utc>>,

    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate token claims against `now`.
pub fn validate_claims(claims: &TokenClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if let Some(issued_at) = claims.issued_at {
        if claims.expires_at <= issued_at {
            return Err(TokenValidationError::InvalidTimeWindow);
        }
        if now < issued_at {
            return Err(TokenValidationError::NotYetValid);
        }
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}
