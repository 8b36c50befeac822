//! Error taxonomy of the session client.

use serde::Deserialize;
use thiserror::Error;

/// Failure reported by the identity provider (init, login, logout, profile).
///
/// Never retried by this crate; surfaced to the caller as-is.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("identity provider init failed: {0}")]
    Init(String),
    #[error("login failed: {0}")]
    Login(String),
    #[error("logout failed: {0}")]
    Logout(String),
    #[error("failed to load provider profile: {0}")]
    Profile(String),
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Failure of a backend HTTP call.
///
/// `status` is the HTTP status, or `0` when no response was received.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("backend error ({status}): {message}")]
pub struct BackendError {
    pub status: u16,
    pub message: String,
}

/// Structured error document returned by the backend on domain failures.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiErrorBody {
    #[allow(dead_code)]
    code: String,
    message: String,
}

impl BackendError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// No response was received (connection refused, DNS, TLS, ...).
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(0, message)
    }

    /// A response arrived but its body could not be decoded.
    pub fn decode(status: u16, message: impl Into<String>) -> Self {
        Self::new(status, format!("invalid response body: {}", message.into()))
    }

    /// Build from a non-success response. Uses the backend's own message
    /// when the body is a structured error document.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = match serde_json::from_str::<ApiErrorBody>(body) {
            Ok(doc) => doc.message,
            Err(_) if body.trim().is_empty() => generic_message(status).to_string(),
            Err(_) => body.trim().to_string(),
        };
        Self::new(status, message)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    /// Short message suitable for showing to an end user.
    pub fn user_message(&self) -> &'static str {
        generic_message(self.status)
    }

    /// Classification used when logging a failed sync.
    pub fn sync_diagnosis(&self) -> &'static str {
        match self.status {
            401 => "token invalid or expired",
            500 => "server error",
            0 => "backend unreachable",
            _ => "unknown error",
        }
    }
}

fn generic_message(status: u16) -> &'static str {
    match status {
        0 => "backend unreachable",
        400 => "invalid request",
        401 => "not authenticated",
        403 => "access denied",
        404 => "resource not found",
        500 => "server error",
        503 => "service unavailable",
        _ => "an unexpected error occurred",
    }
}

/// Failure of a persisted flag store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("flag store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("flag store is corrupt: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("flag store lock poisoned")]
    Poisoned,
    #[error("no data directory available for the flag store")]
    NoDataDir,
}

/// Failure of an identity resolution, shared by every caller awaiting it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("no authenticated session")]
    NotAuthenticated,
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// The session ended or the cache was invalidated while the request was in flight.
    #[error("resolution superseded by logout or invalidation")]
    Superseded,
}

/// Failure of a session lifecycle operation (init, login, logout, hints).
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
