//! Tenant model - an isolated site identified by its host.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tenant entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub tenant_id: Uuid,
    /// Canonical host, optionally with port (e.g. `avengers.test.fider.io`).
    pub host: String,
    /// Invite-only sites reject sign-ups through untrusted providers.
    pub is_private: bool,
    pub created_utc: DateTime<Utc>,
}

impl Tenant {
    /// Create a new tenant.
    pub fn new(host: impl Into<String>, is_private: bool) -> Self {
        Self {
            tenant_id: Uuid::new_v4(),
            host: host.into().to_ascii_lowercase(),
            is_private,
            created_utc: Utc::now(),
        }
    }

    /// Root URL of the tenant, e.g. `http://avengers.test.fider.io`.
    pub fn base_url(&self, scheme: &str) -> String {
        format!("{}://{}", scheme, self.host)
    }
}
