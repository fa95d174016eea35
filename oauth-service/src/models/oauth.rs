//! OAuth domain types shared by providers, the resolver and the flow.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::user::Role;

/// Normalized profile returned by any provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OAuthProfile {
    /// Never empty.
    pub id: String,
    pub name: String,
    /// Empty when the provider did not share an address.
    pub email: String,
}

impl OAuthProfile {
    pub fn email(&self) -> Option<&str> {
        Some(self.email.as_str()).filter(|e| !e.is_empty())
    }
}

/// Tenant-facing settings of a custom (non built-in) provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthConfig {
    pub provider: String,
    pub display_name: String,
    /// New users from a trusted provider skip invite gating.
    pub is_trusted: bool,
    /// Role given to users registered through a trusted provider.
    #[serde(default)]
    pub role: Role,
}

/// A provider as listed to the sign-in page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ProviderOption {
    pub provider: String,
    pub display_name: String,
    /// Relative URL that starts the flow.
    pub url: String,
    pub callback_url: String,
}
