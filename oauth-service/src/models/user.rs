//! User model - tenant-scoped accounts and their linked OAuth identities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role codes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Visitor,
    Collaborator,
    Administrator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Visitor => "visitor",
            Role::Collaborator => "collaborator",
            Role::Administrator => "administrator",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "visitor" => Ok(Role::Visitor),
            "collaborator" => Ok(Role::Collaborator),
            "administrator" => Ok(Role::Administrator),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// An external identity linked to a user. `(tenant, name, uid)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProvider {
    /// Provider name, e.g. `facebook` or a custom provider code.
    pub name: String,
    /// The provider's own identifier for the account.
    pub uid: String,
}

impl UserProvider {
    pub fn new(name: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uid: uid.into(),
        }
    }
}

/// User entity (tenant-scoped).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    /// Accounts created through providers that share no email have none.
    pub email: Option<String>,
    pub role: Role,
    pub providers: Vec<UserProvider>,
    pub created_utc: DateTime<Utc>,
}

impl User {
    /// Create a new user.
    pub fn new(tenant_id: Uuid, name: String, email: Option<String>, role: Role) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            tenant_id,
            name,
            email,
            role,
            providers: Vec::new(),
            created_utc: Utc::now(),
        }
    }

    pub fn with_provider(mut self, provider: UserProvider) -> Self {
        self.providers.push(provider);
        self
    }

    /// Whether the given external identity is linked to this user.
    pub fn has_provider(&self, name: &str, uid: &str) -> bool {
        self.providers.iter().any(|p| p.name == name && p.uid == uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("Visitor".parse::<Role>(), Ok(Role::Visitor));
        assert_eq!("administrator".parse::<Role>(), Ok(Role::Administrator));
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_has_provider_matches_name_and_uid() {
        let user = User::new(Uuid::new_v4(), "Jon Snow".into(), None, Role::Visitor)
            .with_provider(UserProvider::new("facebook", "FB123"));

        assert!(user.has_provider("facebook", "FB123"));
        assert!(!user.has_provider("google", "FB123"));
        assert!(!user.has_provider("facebook", "FB124"));
    }
}
