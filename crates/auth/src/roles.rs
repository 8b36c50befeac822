use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse authorization label carried in the provider token's realm roles.
///
/// The set is closed: every consumer branches on it with an exhaustive
/// `match`. Realm roles outside this set (`offline_access`,
/// `default-roles-*`, ...) are ignored when building a [`RoleSet`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Contractor,
    Client,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Contractor, Role::Client];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Contractor => "CONTRACTOR",
            Role::Client => "CLIENT",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Role::Admin),
            "CONTRACTOR" => Ok(Role::Contractor),
            "CLIENT" => Ok(Role::Client),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Role a freshly authenticated principal asks the backend to assign when it
/// is registered (the sync "role hint").
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncRole {
    Client,
    Contractor,
}

impl SyncRole {
    pub fn as_role(&self) -> Role {
        match self {
            SyncRole::Client => Role::Client,
            SyncRole::Contractor => Role::Contractor,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.as_role().as_str()
    }
}

impl core::fmt::Display for SyncRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for SyncRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<Role>()? {
            Role::Client => Ok(SyncRole::Client),
            Role::Contractor => Ok(SyncRole::Contractor),
            Role::Admin => Err(UnknownRole(s.to_string())),
        }
    }
}

/// Roles held by the current principal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the raw realm-role strings of a token. Unknown labels are dropped.
    pub fn from_claims<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            raw.into_iter()
                .filter_map(|r| r.as_ref().parse::<Role>().ok())
                .collect(),
        )
    }

    pub fn insert(&mut self, role: Role) -> bool {
        self.0.insert(role)
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        self.0.iter().copied()
    }

    /// True once the backend has assigned the principal a domain role.
    pub fn has_domain_role(&self) -> bool {
        self.contains(Role::Contractor) || self.contains(Role::Client)
    }

    /// Role that decides which profile shape the principal resolves to.
    ///
    /// Checked in fixed priority order: `CONTRACTOR`, then `CLIENT`, falling
    /// back to `ADMIN` when no domain role is present.
    pub fn profile_role(&self) -> Role {
        if self.contains(Role::Contractor) {
            Role::Contractor
        } else if self.contains(Role::Client) {
            Role::Client
        } else {
            Role::Admin
        }
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<T: IntoIterator<Item = Role>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
