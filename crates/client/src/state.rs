//! Session state shared between the manager, the resolver and callers.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use serde::Serialize;

use idbridge_auth::{Role, RoleSet, Session};

use crate::models::ProviderProfile;

/// Lifecycle phase of [`crate::IdentitySessionManager`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    LoggedOut,
    Authenticating,
    AuthenticatedUnsynced,
    AuthenticatedSynced,
}

impl SessionPhase {
    pub fn is_authenticated(&self) -> bool {
        matches!(
            self,
            SessionPhase::AuthenticatedUnsynced | SessionPhase::AuthenticatedSynced
        )
    }
}

#[derive(Debug, Default)]
struct Inner {
    session: Session,
    phase: SessionPhase,
    profile: Option<ProviderProfile>,
}

/// Lock-protected session snapshot.
///
/// Writers are crate-internal: only the session manager moves the session
/// between phases. The lock is never held across an `.await`.
#[derive(Debug, Default)]
pub struct SessionState {
    inner: RwLock<Inner>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn session(&self) -> Session {
        self.read().session.clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.read().phase
    }

    pub fn profile(&self) -> Option<ProviderProfile> {
        self.read().profile.clone()
    }

    /// Token present and not expired. Pure; never touches the network.
    pub fn is_logged_in(&self) -> bool {
        self.read().session.is_authenticated_at(Utc::now())
    }

    pub fn roles(&self) -> RoleSet {
        self.read().session.roles_at(Utc::now())
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.read().session.has_role_at(role, Utc::now())
    }

    pub(crate) fn set_phase(&self, phase: SessionPhase) {
        self.write().phase = phase;
    }

    pub(crate) fn establish(&self, session: Session, phase: SessionPhase) {
        let mut inner = self.write();
        inner.session = session;
        inner.phase = phase;
    }

    pub(crate) fn set_profile(&self, profile: Option<ProviderProfile>) {
        self.write().profile = profile;
    }

    pub(crate) fn reset(&self) {
        *self.write() = Inner::default();
    }
}
