//! `idbridge-core`: identifier building blocks shared by the session crates.
//!
//! This crate contains **pure** primitives (no I/O, no async).

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{AssignmentId, ClientId, ContractorId, PrincipalId, UserId};
