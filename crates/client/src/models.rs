//! Profile shapes returned by the backend and the identity provider.

use serde::{Deserialize, Serialize};

use idbridge_core::{AssignmentId, ClientId, ContractorId, PrincipalId, UserId};

/// Backend user record embedded in contractor and client profiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: UserId,
    pub keycloak_id: PrincipalId,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl UserSummary {
    /// "First Last", skipping missing parts. `None` when both are absent.
    pub fn full_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

/// Service a contractor is assigned to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// `GET /api/contractors/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractorProfile {
    pub id: ContractorId,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub assignment: Option<Assignment>,
    #[serde(default)]
    pub speciality: Option<String>,
    pub user: UserSummary,
}

impl ContractorProfile {
    /// Contractors must provide an address and an assignment before using the app.
    pub fn needs_completion(&self) -> bool {
        let missing_address = self
            .address
            .as_deref()
            .is_none_or(|a| a.trim().is_empty());
        missing_address || self.assignment.is_none()
    }
}

/// `GET /api/clients/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientProfile {
    pub id: ClientId,
    pub user: UserSummary,
}

/// Profile the identity provider keeps for the principal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderProfile {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}
