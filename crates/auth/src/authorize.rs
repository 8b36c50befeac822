use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{Role, Session};

/// Outcome of checking a route's role requirements against the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AccessDecision {
    Granted,
    /// No authenticated session; the caller should start a login.
    LoginRequired,
    /// Authenticated, but `missing` is not held.
    Forbidden { missing: Role },
}

impl AccessDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessDecision::Granted)
    }
}

/// Decide whether the session may enter a route that requires every role in
/// `required`.
///
/// - No IO
/// - No panics
/// - Reports the first missing role in `required` order
pub fn authorize(session: &Session, required: &[Role], now: DateTime<Utc>) -> AccessDecision {
    if !session.is_authenticated_at(now) {
        return AccessDecision::LoginRequired;
    }

    match required.iter().find(|r| !session.has_role_at(**r, now)) {
        Some(missing) => AccessDecision::Forbidden { missing: *missing },
        None => AccessDecision::Granted,
    }
}
