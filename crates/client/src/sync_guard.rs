//! At-most-once registration of the principal with the backend.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use idbridge_auth::SyncRole;

use crate::backend::Backend;
use crate::cancel::CancelSignal;
use crate::error::BackendError;
use crate::retry::{RetryError, RetryPolicy, run_with_retry};
use crate::store::{FlagStore, ROLE_HINT_KEY, SYNCED_KEY};

/// Result of [`SessionSyncGuard::sync_once`]. Only `Failed` is an error, and
/// even that leaves the session usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The backend confirmed the sync during this call.
    Synced,
    /// A previous call already synced; no request was made.
    AlreadySynced,
    /// No session token; nothing to sync.
    SkippedNoToken,
    /// The session ended while the sync was in flight; nothing was written.
    Cancelled,
    /// Every attempt failed; carries the error of the last one.
    Failed(BackendError),
}

impl SyncOutcome {
    pub fn is_synced(&self) -> bool {
        matches!(self, SyncOutcome::Synced | SyncOutcome::AlreadySynced)
    }
}

/// Owns the persisted `synced` flag and runs the backend sync at most once per
/// session, retrying transient failures.
pub struct SessionSyncGuard {
    backend: Arc<dyn Backend>,
    store: Arc<dyn FlagStore>,
    policy: RetryPolicy,
    // Serializes check-then-act on the synced flag.
    in_progress: Mutex<()>,
}

impl SessionSyncGuard {
    pub fn new(backend: Arc<dyn Backend>, store: Arc<dyn FlagStore>, policy: RetryPolicy) -> Self {
        Self {
            backend,
            store,
            policy,
            in_progress: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Whether a previous sync succeeded. A failing store reads as "not synced".
    pub fn is_synced(&self) -> bool {
        match self.store.get(SYNCED_KEY) {
            Ok(value) => value.as_deref() == Some("true"),
            Err(e) => {
                warn!(error = %e, "failed to read sync flag");
                false
            }
        }
    }

    /// Role hint waiting to be consumed by the next successful sync.
    pub fn pending_role_hint(&self) -> Option<SyncRole> {
        match self.store.get(ROLE_HINT_KEY) {
            Ok(Some(raw)) => match raw.parse::<SyncRole>() {
                Ok(role) => Some(role),
                Err(e) => {
                    warn!(error = %e, "ignoring malformed role hint");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "failed to read role hint");
                None
            }
        }
    }

    /// Forget the synced flag and any pending role hint.
    ///
    /// Waits for an in-flight `sync_once` to finish first, so the caller must
    /// have cancelled that sync's signal beforehand.
    pub async fn reset(&self) {
        let _guard = self.in_progress.lock().await;
        for key in [SYNCED_KEY, ROLE_HINT_KEY] {
            if let Err(e) = self.store.remove(key) {
                warn!(key, error = %e, "failed to clear sync state");
            }
        }
    }

    /// Sync the principal unless already synced.
    ///
    /// Concurrent callers queue behind one another; the second one observes
    /// the flag written by the first and returns `AlreadySynced`.
    pub async fn sync_once(
        &self,
        session_token: Option<&str>,
        role_hint: Option<SyncRole>,
        cancel: &CancelSignal,
    ) -> SyncOutcome {
        if session_token.is_none_or(str::is_empty) {
            debug!("sync skipped: no session token");
            return SyncOutcome::SkippedNoToken;
        }

        let _guard = self.in_progress.lock().await;

        if self.is_synced() {
            return SyncOutcome::AlreadySynced;
        }

        let backend = &self.backend;
        let result = run_with_retry(&self.policy, cancel, move |attempt| {
            debug!(attempt, role_hint = ?role_hint, "syncing user with backend");
            backend.sync_current_user(role_hint)
        })
        .await;

        match result {
            Ok(response) => {
                // A logout may have landed between the response and here.
                if cancel.is_cancelled() {
                    return SyncOutcome::Cancelled;
                }
                if let Err(e) = self.store.set(SYNCED_KEY, "true") {
                    warn!(error = %e, "sync succeeded but the flag could not be persisted");
                }
                if role_hint.is_some() {
                    if let Err(e) = self.store.remove(ROLE_HINT_KEY) {
                        warn!(error = %e, "failed to clear consumed role hint");
                    }
                }
                info!(response = %response, "user synced with backend");
                SyncOutcome::Synced
            }
            Err(RetryError::Cancelled) => {
                debug!("sync cancelled");
                SyncOutcome::Cancelled
            }
            Err(RetryError::Exhausted { attempts, last }) => {
                error!(
                    attempts,
                    status = last.status,
                    diagnosis = last.sync_diagnosis(),
                    error = %last,
                    "user sync failed"
                );
                SyncOutcome::Failed(last)
            }
        }
    }
}
