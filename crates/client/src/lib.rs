//! Client-side identity session bootstrap and cached identity resolution.
//!
//! [`IdentitySessionManager`] drives authentication against an external
//! identity provider and registers new principals with the application
//! backend exactly once. [`IdentityResolver`] turns the session's roles into
//! a role-shaped [`Identity`], collapsing concurrent requests into one.

pub mod backend;
pub mod cancel;
pub mod config;
pub mod error;
pub mod identity;
pub mod models;
pub mod provider;
pub mod resolver;
pub mod retry;
pub mod session_manager;
pub mod state;
pub mod store;
pub mod sync_guard;

pub use backend::{Backend, HttpBackend, TokenSource};
pub use cancel::CancelSignal;
pub use config::{ClientConfig, ConfigError};
pub use error::{BackendError, ProviderError, ResolutionError, SessionError, StoreError};
pub use identity::Identity;
pub use models::{Assignment, ClientProfile, ContractorProfile, ProviderProfile, UserSummary};
pub use provider::{IdentityProvider, InitOptions, StaticTokenProvider};
pub use resolver::IdentityResolver;
pub use retry::{RetryError, RetryPolicy, run_with_retry};
pub use session_manager::IdentitySessionManager;
pub use state::{SessionPhase, SessionState};
pub use store::{FileFlagStore, FlagStore, MemoryFlagStore};
pub use sync_guard::{SessionSyncGuard, SyncOutcome};
