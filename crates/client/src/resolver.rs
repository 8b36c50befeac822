//! Single-flight, cached resolution of the current principal's [`Identity`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tracing::{debug, warn};

use idbridge_auth::{Role, RoleSet};

use crate::backend::Backend;
use crate::cancel::CancelSignal;
use crate::error::ResolutionError;
use crate::identity::Identity;
use crate::provider::IdentityProvider;
use crate::state::SessionState;

type SharedResolution = Shared<BoxFuture<'static, Result<Identity, ResolutionError>>>;

/// The resolver's single cache slot. Replaced or cleared, never patched.
enum Slot {
    Empty,
    Pending(SharedResolution),
    Resolved(Identity),
}

struct Cache {
    slot: Slot,
    /// Bumped by every invalidation; a resolution started under an older
    /// generation never writes the slot.
    generation: u64,
    /// Cancels the in-flight resolution of the current generation.
    cancel: CancelSignal,
}

/// Resolves "who is the current principal" into a role-shaped profile.
///
/// Concurrent callers share one underlying request. A successful result is
/// cached until [`IdentityResolver::invalidate`]; failures are not cached.
pub struct IdentityResolver {
    backend: Arc<dyn Backend>,
    provider: Arc<dyn IdentityProvider>,
    state: Arc<SessionState>,
    cache: Arc<Mutex<Cache>>,
}

impl IdentityResolver {
    pub fn new(
        backend: Arc<dyn Backend>,
        provider: Arc<dyn IdentityProvider>,
        state: Arc<SessionState>,
    ) -> Self {
        Self {
            backend,
            provider,
            state,
            cache: Arc::new(Mutex::new(Cache {
                slot: Slot::Empty,
                generation: 0,
                cancel: CancelSignal::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Cache> {
        lock_cache(&self.cache)
    }

    /// Resolve the current identity, joining an in-flight resolution if any.
    ///
    /// Without a live session nothing is served, not even a cached identity.
    pub async fn resolve(&self) -> Result<Identity, ResolutionError> {
        if !self.state.is_logged_in() {
            return Err(ResolutionError::NotAuthenticated);
        }

        let pending = {
            let mut cache = self.lock();
            let in_flight = match &cache.slot {
                Slot::Resolved(identity) => return Ok(identity.clone()),
                Slot::Pending(shared) => Some(shared.clone()),
                Slot::Empty => None,
            };

            match in_flight {
                Some(shared) => shared,
                None => {
                    let shared = self.start(self.state.roles(), cache.generation, cache.cancel.clone());
                    cache.slot = Slot::Pending(shared.clone());
                    shared
                }
            }
        };

        pending.await
    }

    fn start(&self, roles: RoleSet, generation: u64, cancel: CancelSignal) -> SharedResolution {
        let backend = Arc::clone(&self.backend);
        let provider = Arc::clone(&self.provider);
        let cache: Weak<Mutex<Cache>> = Arc::downgrade(&self.cache);

        async move {
            debug!(generation, role = %roles.profile_role(), "resolving identity");

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(ResolutionError::Superseded),
                result = fetch_identity(backend.as_ref(), provider.as_ref(), &roles) => result,
            };

            let Some(cache) = cache.upgrade() else {
                return result;
            };
            let mut cache = lock_cache(&cache);

            if cache.generation != generation {
                debug!(generation, current = cache.generation, "discarding stale identity resolution");
                return Err(ResolutionError::Superseded);
            }

            cache.slot = match &result {
                Ok(identity) => Slot::Resolved(identity.clone()),
                Err(e) => {
                    warn!(error = %e, "identity resolution failed");
                    Slot::Empty
                }
            };
            result
        }
        .boxed()
        .shared()
    }

    /// Last resolved identity. Never blocks and never triggers I/O.
    pub fn cached_identity(&self) -> Option<Identity> {
        match &self.lock().slot {
            Slot::Resolved(identity) => Some(identity.clone()),
            Slot::Empty | Slot::Pending(_) => None,
        }
    }

    /// Drop the cached or in-flight resolution.
    ///
    /// Waiters of an in-flight resolution receive
    /// [`ResolutionError::Superseded`]; the next `resolve` starts afresh.
    pub fn invalidate(&self) {
        let mut cache = self.lock();
        cache.cancel.cancel();
        cache.cancel = CancelSignal::new();
        cache.generation += 1;
        cache.slot = Slot::Empty;
        debug!(generation = cache.generation, "identity cache invalidated");
    }
}

fn lock_cache(cache: &Mutex<Cache>) -> MutexGuard<'_, Cache> {
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fetch the profile matching the principal's highest-priority role.
async fn fetch_identity(
    backend: &dyn Backend,
    provider: &dyn IdentityProvider,
    roles: &RoleSet,
) -> Result<Identity, ResolutionError> {
    match roles.profile_role() {
        Role::Contractor => Ok(Identity::Contractor(backend.fetch_contractor_profile().await?)),
        Role::Client => Ok(Identity::Client(backend.fetch_client_profile().await?)),
        Role::Admin => Ok(Identity::Admin(provider.load_profile().await?)),
    }
}
