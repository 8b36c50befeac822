//! Authentication lifecycle: login, logout, token expiry and the one-time
//! backend sync that follows a successful login.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, info, warn};

use idbridge_auth::{AccessDecision, Role, RoleSet, Session, SyncRole, TokenClaims, validate_claims};
use idbridge_core::PrincipalId;

use crate::backend::Backend;
use crate::cancel::CancelSignal;
use crate::config::ClientConfig;
use crate::error::{ResolutionError, SessionError};
use crate::identity::Identity;
use crate::models::ProviderProfile;
use crate::provider::{IdentityProvider, InitOptions};
use crate::resolver::IdentityResolver;
use crate::state::{SessionPhase, SessionState};
use crate::store::{FlagStore, REFRESH_TOKEN_KEY, ROLE_HINT_KEY, TOKEN_KEY};
use crate::sync_guard::{SessionSyncGuard, SyncOutcome};

/// Owns the session state machine
/// `LoggedOut -> Authenticating -> AuthenticatedUnsynced -> AuthenticatedSynced`
/// and the collaborators hanging off it.
///
/// Provider failures are surfaced as-is; retrying is left to the sync guard.
pub struct IdentitySessionManager {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn FlagStore>,
    state: Arc<SessionState>,
    sync_guard: SessionSyncGuard,
    resolver: IdentityResolver,
    // Cancelled on logout and replaced with a fresh one.
    cancel: Mutex<CancelSignal>,
    logout_redirect_uri: String,
}

impl IdentitySessionManager {
    pub fn new(
        config: &ClientConfig,
        provider: Arc<dyn IdentityProvider>,
        backend: Arc<dyn Backend>,
        store: Arc<dyn FlagStore>,
    ) -> Self {
        let state = Arc::new(SessionState::new());
        let sync_guard = SessionSyncGuard::new(Arc::clone(&backend), Arc::clone(&store), config.retry_policy());
        let resolver = IdentityResolver::new(backend, Arc::clone(&provider), Arc::clone(&state));

        Self {
            provider,
            store,
            state,
            sync_guard,
            resolver,
            cancel: Mutex::new(CancelSignal::new()),
            logout_redirect_uri: config.logout_redirect_uri.clone(),
        }
    }

    fn cancel_guard(&self) -> MutexGuard<'_, CancelSignal> {
        self.cancel.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_cancel(&self) -> CancelSignal {
        self.cancel_guard().clone()
    }

    /// Run `commit` unless `cancel` has fired.
    ///
    /// The check and `commit` both happen under the cancel lock, which
    /// `end_session` also holds, so a teardown cannot land in between.
    fn commit_unless_cancelled<T>(&self, cancel: &CancelSignal, commit: impl FnOnce() -> T) -> Option<T> {
        let _current = self.cancel_guard();
        if cancel.is_cancelled() {
            return None;
        }
        Some(commit())
    }

    /// Check for an existing provider session, handing back the tokens
    /// persisted by a previous run. Returns whether a session was established.
    pub async fn init(&self) -> Result<bool, SessionError> {
        let options = InitOptions {
            token: self.store.get(TOKEN_KEY)?,
            refresh_token: self.store.get(REFRESH_TOKEN_KEY)?,
        };
        let cancel = self.current_cancel();
        let previous = self.state.phase();
        self.state.set_phase(SessionPhase::Authenticating);

        match self.provider.init(options).await {
            Ok(true) => {
                let phase = self.establish(&cancel).await;
                Ok(phase.is_authenticated())
            }
            Ok(false) => {
                debug!("no existing provider session");
                self.end_session_unless_cancelled(&cancel);
                Ok(false)
            }
            Err(e) => {
                warn!(error = %e, "identity provider init failed");
                self.restore_phase(&cancel, previous);
                Err(e.into())
            }
        }
    }

    /// Run the provider's interactive login, then establish the session and
    /// sync the principal if needed. Returns the phase reached.
    pub async fn login(&self) -> Result<SessionPhase, SessionError> {
        let cancel = self.current_cancel();
        let previous = self.state.phase();
        self.state.set_phase(SessionPhase::Authenticating);
        info!("login started");

        if let Err(e) = self.provider.login().await {
            warn!(error = %e, "login failed");
            self.restore_phase(&cancel, previous);
            return Err(e.into());
        }

        Ok(self.establish(&cancel).await)
    }

    /// End the provider session and tear down all local session state.
    ///
    /// In-flight syncs and identity resolutions are cancelled; their late
    /// results are discarded. If the provider refuses, nothing local changes.
    pub async fn logout(&self) -> Result<(), SessionError> {
        self.provider.logout(&self.logout_redirect_uri).await?;

        self.end_session();
        self.sync_guard.reset().await;
        for key in [TOKEN_KEY, REFRESH_TOKEN_KEY] {
            if let Err(e) = self.store.remove(key) {
                warn!(key, error = %e, "failed to clear persisted token");
            }
        }

        info!("logged out");
        Ok(())
    }

    /// Re-read token state from the provider.
    ///
    /// An expired or vanished token resets the session to logged out; a
    /// renewed token updates expiry and roles in place.
    pub fn refresh_session(&self) -> SessionPhase {
        let phase = self.state.phase();
        if !phase.is_authenticated() {
            return phase;
        }

        if self.provider.is_token_expired() {
            info!("session token expired");
            self.end_session();
            return SessionPhase::LoggedOut;
        }

        match self.current_claims() {
            Some(claims) if validate_claims(&claims, Utc::now()).is_ok() => {
                let subject = self.state.session().subject();
                let renewed = Session::from_claims(TokenClaims { subject, ..claims });
                let cancel = self.current_cancel();
                self.commit_unless_cancelled(&cancel, || self.state.establish(renewed, phase))
                    .map_or_else(|| self.state.phase(), |()| phase)
            }
            _ => {
                info!("session token no longer usable");
                self.end_session();
                SessionPhase::LoggedOut
            }
        }
    }

    /// Sync the principal with the backend unless already done.
    pub async fn sync(&self) -> SyncOutcome {
        let cancel = self.current_cancel();
        self.run_sync(&cancel).await
    }

    /// Persist the role the next sync asks the backend to assign.
    pub fn set_role_hint(&self, role: SyncRole) -> Result<(), SessionError> {
        self.store.set(ROLE_HINT_KEY, role.as_str())?;
        Ok(())
    }

    /// Token present and not expired. Never performs I/O.
    pub fn is_logged_in(&self) -> bool {
        self.state.is_logged_in() && !self.provider.is_token_expired()
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.is_logged_in() && self.state.has_role(role)
    }

    /// Roles of the current session; empty when logged out.
    pub fn roles(&self) -> RoleSet {
        if self.is_logged_in() {
            self.state.roles()
        } else {
            RoleSet::new()
        }
    }

    /// Route guard decision for a page requiring every role in `required`.
    pub fn authorize(&self, required: &[Role]) -> AccessDecision {
        if !self.is_logged_in() {
            return AccessDecision::LoginRequired;
        }
        idbridge_auth::authorize(&self.state.session(), required, Utc::now())
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    pub fn session(&self) -> Session {
        self.state.session()
    }

    /// Provider profile loaded at login, if it could be loaded.
    pub fn profile(&self) -> Option<ProviderProfile> {
        self.state.profile()
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    pub async fn resolve(&self) -> Result<Identity, ResolutionError> {
        self.resolver.resolve().await
    }

    pub fn cached_identity(&self) -> Option<Identity> {
        self.resolver.cached_identity()
    }

    pub fn invalidate(&self) {
        self.resolver.invalidate();
    }

    fn current_claims(&self) -> Option<TokenClaims> {
        self.provider.token().filter(|t| !t.is_empty())?;
        let expires_at = self.provider.token_expires_at()?;

        Some(TokenClaims {
            subject: None,
            roles: RoleSet::from_claims(self.provider.realm_roles()),
            issued_at: None,
            expires_at,
        })
    }

    /// Turn a successful provider authentication into a session.
    async fn establish(&self, cancel: &CancelSignal) -> SessionPhase {
        let Some(claims) = self.current_claims() else {
            warn!("provider reported success without a usable token");
            self.end_session_unless_cancelled(cancel);
            return self.state.phase();
        };
        if let Err(e) = validate_claims(&claims, Utc::now()) {
            warn!(error = %e, "provider token rejected");
            self.end_session_unless_cancelled(cancel);
            return self.state.phase();
        }

        let profile = match self.provider.load_profile().await {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!(error = %e, "failed to load provider profile");
                None
            }
        };

        let subject = profile
            .as_ref()
            .and_then(|p| p.id.as_deref())
            .and_then(|id| id.parse::<PrincipalId>().ok());
        let needs_sync = !self.sync_guard.is_synced() && !claims.roles.has_domain_role();
        let phase = if needs_sync {
            SessionPhase::AuthenticatedUnsynced
        } else {
            SessionPhase::AuthenticatedSynced
        };
        let roles = claims.roles.iter().map(|r| r.as_str()).collect::<Vec<_>>().join(",");

        let session = Session::from_claims(TokenClaims { subject, ..claims });
        let committed = self.commit_unless_cancelled(cancel, || {
            self.persist_tokens();
            self.state.establish(session, phase);
            self.state.set_profile(profile);
            // A different principal may have logged in since the last resolution.
            self.resolver.invalidate();
        });
        if committed.is_none() {
            debug!("session ended while it was being established");
            return self.state.phase();
        }
        info!(?phase, roles = %roles, "session established");

        if needs_sync {
            self.run_sync(cancel).await;
        }
        self.state.phase()
    }

    async fn run_sync(&self, cancel: &CancelSignal) -> SyncOutcome {
        let token = self.provider.token();
        let role_hint = self.sync_guard.pending_role_hint();
        let outcome = self.sync_guard.sync_once(token.as_deref(), role_hint, cancel).await;

        if outcome.is_synced() {
            self.commit_unless_cancelled(cancel, || {
                if self.state.phase().is_authenticated() {
                    self.state.set_phase(SessionPhase::AuthenticatedSynced);
                }
            });
        }
        outcome
    }

    fn persist_tokens(&self) {
        let writes = [
            (TOKEN_KEY, self.provider.token()),
            (REFRESH_TOKEN_KEY, self.provider.refresh_token()),
        ];
        for (key, value) in writes {
            let result = match value {
                Some(value) => self.store.set(key, &value),
                None => self.store.remove(key),
            };
            if let Err(e) = result {
                warn!(key, error = %e, "failed to persist provider token");
            }
        }
    }

    /// Put the phase back after a failed provider call, unless a logout
    /// already took over.
    fn restore_phase(&self, cancel: &CancelSignal, previous: SessionPhase) {
        self.commit_unless_cancelled(cancel, || self.state.set_phase(previous));
    }

    /// Cancel in-flight work and drop the local session.
    fn end_session(&self) {
        let mut current = self.cancel_guard();
        self.end_session_locked(&mut current);
    }

    /// Tear down the session `cancel` belongs to, unless a logout already did.
    fn end_session_unless_cancelled(&self, cancel: &CancelSignal) {
        let mut current = self.cancel_guard();
        if !cancel.is_cancelled() {
            self.end_session_locked(&mut current);
        }
    }

    fn end_session_locked(&self, current: &mut CancelSignal) {
        current.cancel();
        *current = CancelSignal::new();
        self.state.reset();
        self.resolver.invalidate();
    }
}
