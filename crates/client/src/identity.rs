//! The resolved "who am I" of the current principal.

use serde::{Deserialize, Serialize};

use idbridge_auth::Role;

use crate::models::{ClientProfile, ContractorProfile, ProviderProfile};

/// Role-shaped profile of the current principal.
///
/// Serialized with a `kind` discriminant (`ADMIN`, `CONTRACTOR`, `CLIENT`).
/// Immutable once built; a new resolution produces a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Identity {
    Admin(ProviderProfile),
    Contractor(ContractorProfile),
    Client(ClientProfile),
}

impl Identity {
    pub fn kind(&self) -> Role {
        match self {
            Identity::Admin(_) => Role::Admin,
            Identity::Contractor(_) => Role::Contractor,
            Identity::Client(_) => Role::Client,
        }
    }

    /// Name to greet the principal with.
    pub fn display_name(&self) -> String {
        match self {
            Identity::Admin(p) => {
                let full = match (non_blank(&p.first_name), non_blank(&p.last_name)) {
                    (Some(first), Some(last)) => Some(format!("{first} {last}")),
                    _ => None,
                };
                full.or_else(|| non_blank(&p.username).map(str::to_string))
                    .or_else(|| non_blank(&p.email).map(str::to_string))
                    .unwrap_or_else(|| "Admin".to_string())
            }
            Identity::Contractor(c) => non_blank(&c.full_name)
                .map(str::to_string)
                .unwrap_or_else(|| "Contractor".to_string()),
            Identity::Client(c) => c.user.full_name().unwrap_or_else(|| "Client".to_string()),
        }
    }

    /// Avatar initials: first letters of the first and last words, or `?`.
    pub fn initials(&self) -> String {
        let name = self.display_name();
        let words: Vec<&str> = name.split_whitespace().collect();
        let first_char = |w: &str| w.chars().next().map(|c| c.to_uppercase().to_string());

        match words.as_slice() {
            [] => "?".to_string(),
            [only] => first_char(*only).unwrap_or_else(|| "?".to_string()),
            [first, .., last] => format!(
                "{}{}",
                first_char(*first).unwrap_or_default(),
                first_char(*last).unwrap_or_default()
            ),
        }
    }

    pub fn email(&self) -> Option<&str> {
        match self {
            Identity::Admin(p) => p.email.as_deref(),
            Identity::Contractor(c) => c.user.email.as_deref(),
            Identity::Client(c) => c.user.email.as_deref(),
        }
    }

    /// Admins are always active; others follow their backend user record.
    pub fn is_active(&self) -> bool {
        match self {
            Identity::Admin(_) => true,
            Identity::Contractor(c) => c.user.is_active.unwrap_or(false),
            Identity::Client(c) => c.user.is_active.unwrap_or(false),
        }
    }

    /// Landing route of the principal's own profile page.
    pub fn home_route(&self) -> &'static str {
        match self {
            Identity::Admin(_) => "/admin/",
            Identity::Contractor(_) => "/contractor/profile",
            Identity::Client(_) => "/client/profile",
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
