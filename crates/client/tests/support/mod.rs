#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::Semaphore;

use idbridge_auth::SyncRole;
use idbridge_client::{
    Backend, BackendError, ClientConfig, ClientProfile, ContractorProfile, FlagStore,
    IdentityProvider, IdentitySessionManager, InitOptions, MemoryFlagStore, ProviderError,
    ProviderProfile, UserSummary,
};
use idbridge_core::{ClientId, ContractorId, PrincipalId, UserId};

pub fn user(first: &str, last: &str) -> UserSummary {
    UserSummary {
        id: UserId::new(),
        keycloak_id: PrincipalId::new(),
        first_name: Some(first.to_string()),
        last_name: Some(last.to_string()),
        email: Some(format!("{}@example.test", first.to_lowercase())),
        is_active: Some(true),
    }
}

pub fn contractor(first: &str, last: &str) -> ContractorProfile {
    ContractorProfile {
        id: ContractorId::new(),
        full_name: Some(format!("{first} {last}")),
        address: Some("12 Rue des Lilas".to_string()),
        assignment: None,
        speciality: Some("plumbing".to_string()),
        user: user(first, last),
    }
}

pub fn client(first: &str, last: &str) -> ClientProfile {
    ClientProfile {
        id: ClientId::new(),
        user: user(first, last),
    }
}

/// Backend fake with call counters, scripted sync results and an optional
/// gate that holds profile fetches in flight until released.
pub struct ScriptedBackend {
    sync_script: Mutex<VecDeque<Result<String, BackendError>>>,
    contractor: Mutex<Result<ContractorProfile, BackendError>>,
    client: Mutex<Result<ClientProfile, BackendError>>,
    sync_hints: Mutex<Vec<Option<SyncRole>>>,
    pub sync_calls: AtomicUsize,
    pub contractor_calls: AtomicUsize,
    pub client_calls: AtomicUsize,
    gated: AtomicBool,
    gate: Semaphore,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            sync_script: Mutex::new(VecDeque::new()),
            contractor: Mutex::new(Ok(contractor("Ada", "Lovelace"))),
            client: Mutex::new(Ok(client("Alan", "Turing"))),
            sync_hints: Mutex::new(Vec::new()),
            sync_calls: AtomicUsize::new(0),
            contractor_calls: AtomicUsize::new(0),
            client_calls: AtomicUsize::new(0),
            gated: AtomicBool::new(false),
            gate: Semaphore::new(0),
        }
    }

    /// Queue sync results; once the script runs out every sync succeeds.
    pub fn script_sync(&self, results: Vec<Result<String, BackendError>>) {
        self.sync_script.lock().unwrap().extend(results);
    }

    pub fn set_contractor(&self, result: Result<ContractorProfile, BackendError>) {
        *self.contractor.lock().unwrap() = result;
    }

    pub fn set_client(&self, result: Result<ClientProfile, BackendError>) {
        *self.client.lock().unwrap() = result;
    }

    pub fn sync_hints(&self) -> Vec<Option<SyncRole>> {
        self.sync_hints.lock().unwrap().clone()
    }

    /// Hold every subsequent profile fetch until [`Self::release`].
    pub fn close_gate(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    pub fn release(&self, fetches: usize) {
        self.gate.add_permits(fetches);
    }

    pub fn profile_calls(&self) -> usize {
        self.contractor_calls.load(Ordering::SeqCst) + self.client_calls.load(Ordering::SeqCst)
    }

    async fn pass_gate(&self) {
        if self.gated.load(Ordering::SeqCst) {
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
        }
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn sync_current_user(&self, role_hint: Option<SyncRole>) -> Result<String, BackendError> {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        self.sync_hints.lock().unwrap().push(role_hint);
        let next = self.sync_script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok("user synced".to_string()))
    }

    async fn fetch_contractor_profile(&self) -> Result<ContractorProfile, BackendError> {
        self.contractor_calls.fetch_add(1, Ordering::SeqCst);
        self.pass_gate().await;
        self.contractor.lock().unwrap().clone()
    }

    async fn fetch_client_profile(&self) -> Result<ClientProfile, BackendError> {
        self.client_calls.fetch_add(1, Ordering::SeqCst);
        self.pass_gate().await;
        self.client.lock().unwrap().clone()
    }
}

struct ProviderState {
    authenticated: bool,
    roles: Vec<String>,
    expires_at: DateTime<Utc>,
    fail_login: Option<ProviderError>,
    fail_logout: Option<ProviderError>,
    init_options: Option<InitOptions>,
}

/// Identity provider fake; login and logout flip a local flag. Profile
/// loads can be held in flight like the backend's fetches.
pub struct FakeProvider {
    state: Mutex<ProviderState>,
    profile: ProviderProfile,
    pub load_profile_calls: AtomicUsize,
    profile_gated: AtomicBool,
    profile_gate: Semaphore,
}

impl FakeProvider {
    pub fn new(roles: &[&str]) -> Self {
        Self {
            state: Mutex::new(ProviderState {
                authenticated: false,
                roles: roles.iter().map(|r| r.to_string()).collect(),
                expires_at: Utc::now() + ChronoDuration::hours(1),
                fail_login: None,
                fail_logout: None,
                init_options: None,
            }),
            profile: ProviderProfile {
                id: Some(PrincipalId::new().to_string()),
                username: Some("root".to_string()),
                email: Some("root@example.test".to_string()),
                first_name: Some("Grace".to_string()),
                last_name: Some("Hopper".to_string()),
            },
            load_profile_calls: AtomicUsize::new(0),
            profile_gated: AtomicBool::new(false),
            profile_gate: Semaphore::new(0),
        }
    }

    /// Provider that already holds a session, as after a redirect back.
    pub fn signed_in(roles: &[&str]) -> Self {
        let provider = Self::new(roles);
        provider.state.lock().unwrap().authenticated = true;
        provider
    }

    pub fn expire_in(&self, duration: ChronoDuration) {
        self.state.lock().unwrap().expires_at = Utc::now() + duration;
    }

    pub fn set_roles(&self, roles: &[&str]) {
        self.state.lock().unwrap().roles = roles.iter().map(|r| r.to_string()).collect();
    }

    pub fn fail_next_login(&self, error: ProviderError) {
        self.state.lock().unwrap().fail_login = Some(error);
    }

    pub fn fail_next_logout(&self, error: ProviderError) {
        self.state.lock().unwrap().fail_logout = Some(error);
    }

    /// The provider session ends without going through the manager,
    /// e.g. it was revoked server-side.
    pub fn sign_out_externally(&self) {
        self.state.lock().unwrap().authenticated = false;
    }

    pub fn close_profile_gate(&self) {
        self.profile_gated.store(true, Ordering::SeqCst);
    }

    pub fn release_profile(&self) {
        self.profile_gate.add_permits(1);
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.lock().unwrap().authenticated
    }

    pub fn last_init_options(&self) -> Option<InitOptions> {
        self.state.lock().unwrap().init_options.clone()
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    async fn init(&self, options: InitOptions) -> Result<bool, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.init_options = Some(options);
        Ok(state.authenticated)
    }

    async fn login(&self) -> Result<(), ProviderError> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.fail_login.take() {
            return Err(error);
        }
        state.authenticated = true;
        Ok(())
    }

    async fn logout(&self, _redirect_uri: &str) -> Result<(), ProviderError> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.fail_logout.take() {
            return Err(error);
        }
        state.authenticated = false;
        Ok(())
    }

    fn token(&self) -> Option<String> {
        self.is_authenticated().then(|| "access-token".to_string())
    }

    fn refresh_token(&self) -> Option<String> {
        self.is_authenticated().then(|| "refresh-token".to_string())
    }

    fn token_expires_at(&self) -> Option<DateTime<Utc>> {
        let state = self.state.lock().unwrap();
        state.authenticated.then_some(state.expires_at)
    }

    fn is_token_expired(&self) -> bool {
        let state = self.state.lock().unwrap();
        !state.authenticated || Utc::now() >= state.expires_at
    }

    fn realm_roles(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        if state.authenticated {
            state.roles.clone()
        } else {
            Vec::new()
        }
    }

    async fn load_profile(&self) -> Result<ProviderProfile, ProviderError> {
        self.load_profile_calls.fetch_add(1, Ordering::SeqCst);
        if self.profile_gated.load(Ordering::SeqCst) {
            if let Ok(permit) = self.profile_gate.acquire().await {
                permit.forget();
            }
        }
        Ok(self.profile.clone())
    }
}

pub struct Harness {
    pub provider: Arc<FakeProvider>,
    pub backend: Arc<ScriptedBackend>,
    pub store: Arc<MemoryFlagStore>,
    pub manager: Arc<IdentitySessionManager>,
}

impl Harness {
    pub fn new(provider: FakeProvider) -> Self {
        Self::with_store(provider, Arc::new(MemoryFlagStore::new()))
    }

    pub fn with_store(provider: FakeProvider, store: Arc<MemoryFlagStore>) -> Self {
        let provider = Arc::new(provider);
        let backend = Arc::new(ScriptedBackend::new());
        let config = ClientConfig::default().with_sync_policy(3, Duration::from_millis(1000));

        let manager = IdentitySessionManager::new(
            &config,
            provider.clone() as Arc<dyn IdentityProvider>,
            backend.clone() as Arc<dyn Backend>,
            store.clone() as Arc<dyn FlagStore>,
        );

        Self {
            provider,
            backend,
            store,
            manager: Arc::new(manager),
        }
    }
}

/// Yield until `condition` holds, failing the test after a bounded number of polls.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
