//! `idbridge-auth`: pure authentication boundary for the client session.
//!
//! This crate is intentionally decoupled from HTTP, storage and async runtimes:
//! it only models what a decoded identity-provider token says about the
//! principal and what the application may do with that.

pub mod authorize;
pub mod claims;
pub mod roles;
pub mod session;

pub use authorize::{AccessDecision, authorize};
pub use claims::{TokenClaims, TokenValidationError, validate_claims};
pub use roles::{Role, RoleSet, SyncRole, UnknownRole};
pub use session::Session;
