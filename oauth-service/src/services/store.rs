//! Persistence boundaries of the sign-in flow, plus an in-memory backend.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use super::error::ServiceError;
use crate::config::{ProviderSettings, TenantSeedConfig};
use crate::models::{OAuthConfig, Tenant, User, UserProvider};

#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn find_by_host(&self, host: &str) -> Result<Option<Tenant>, ServiceError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_provider(
        &self,
        tenant_id: Uuid,
        provider: &str,
        uid: &str,
    ) -> Result<Option<User>, ServiceError>;

    async fn find_by_email(&self, tenant_id: Uuid, email: &str)
        -> Result<Option<User>, ServiceError>;

    /// Persists a new user with its initial provider links. Fails with
    /// `Conflict` when one of the links already belongs to another user.
    async fn register_user(&self, user: User) -> Result<User, ServiceError>;

    async fn register_user_provider(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        provider: UserProvider,
    ) -> Result<(), ServiceError>;
}

#[async_trait]
pub trait OAuthConfigStore: Send + Sync {
    async fn find_custom_oauth_config(
        &self,
        provider: &str,
    ) -> Result<Option<OAuthConfig>, ServiceError>;
}

#[derive(Default)]
struct State {
    tenants: HashMap<String, Tenant>,
    users: Vec<User>,
    oauth_configs: HashMap<String, OAuthConfig>,
}

/// Single-lock store; link uniqueness is checked and written under the same
/// write guard.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preloaded with the configured tenants and custom provider
    /// settings.
    pub fn seeded(
        tenants: &TenantSeedConfig,
        providers: &[ProviderSettings],
    ) -> Result<Self, ServiceError> {
        let store = Self::new();

        for host in &tenants.hosts {
            store.add_tenant(Tenant::new(host.as_str(), false))?;
        }
        for host in &tenants.private_hosts {
            store.add_tenant(Tenant::new(host.as_str(), true))?;
        }
        for config in providers.iter().filter_map(ProviderSettings::custom_config) {
            store.add_oauth_config(config)?;
        }

        Ok(store)
    }

    pub fn add_tenant(&self, tenant: Tenant) -> Result<(), ServiceError> {
        self.write()?.tenants.insert(tenant.host.clone(), tenant);
        Ok(())
    }

    pub fn add_oauth_config(&self, config: OAuthConfig) -> Result<(), ServiceError> {
        self.write()?
            .oauth_configs
            .insert(config.provider.clone(), config);
        Ok(())
    }

    pub fn users(&self, tenant_id: Uuid) -> Result<Vec<User>, ServiceError> {
        Ok(self
            .read()?
            .users
            .iter()
            .filter(|u| u.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, ServiceError> {
        self.state
            .read()
            .map_err(|_| ServiceError::Store(anyhow::anyhow!("Store lock poisoned")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, ServiceError> {
        self.state
            .write()
            .map_err(|_| ServiceError::Store(anyhow::anyhow!("Store lock poisoned")))
    }
}

fn link_owner<'a>(
    users: &'a [User],
    tenant_id: Uuid,
    provider: &UserProvider,
) -> Option<&'a User> {
    users
        .iter()
        .find(|u| u.tenant_id == tenant_id && u.has_provider(&provider.name, &provider.uid))
}

#[async_trait]
impl TenantStore for InMemoryStore {
    async fn find_by_host(&self, host: &str) -> Result<Option<Tenant>, ServiceError> {
        Ok(self.read()?.tenants.get(&host.to_ascii_lowercase()).cloned())
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn find_by_provider(
        &self,
        tenant_id: Uuid,
        provider: &str,
        uid: &str,
    ) -> Result<Option<User>, ServiceError> {
        let state = self.read()?;
        Ok(link_owner(&state.users, tenant_id, &UserProvider::new(provider, uid)).cloned())
    }

    async fn find_by_email(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> Result<Option<User>, ServiceError> {
        let state = self.read()?;
        Ok(state
            .users
            .iter()
            .find(|u| {
                u.tenant_id == tenant_id
                    && u.email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(email))
            })
            .cloned())
    }

    async fn register_user(&self, user: User) -> Result<User, ServiceError> {
        let mut state = self.write()?;

        for provider in &user.providers {
            if link_owner(&state.users, user.tenant_id, provider).is_some() {
                return Err(ServiceError::Conflict(format!(
                    "{} identity is already linked to another user",
                    provider.name
                )));
            }
        }

        state.users.push(user.clone());
        Ok(user)
    }

    async fn register_user_provider(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        provider: UserProvider,
    ) -> Result<(), ServiceError> {
        let mut state = self.write()?;

        if let Some(owner) = link_owner(&state.users, tenant_id, &provider) {
            if owner.user_id == user_id {
                return Ok(());
            }
            return Err(ServiceError::Conflict(format!(
                "{} identity is already linked to another user",
                provider.name
            )));
        }

        let user = state
            .users
            .iter_mut()
            .find(|u| u.tenant_id == tenant_id && u.user_id == user_id)
            .ok_or(ServiceError::NotFound)?;
        user.providers.push(provider);
        Ok(())
    }
}

#[async_trait]
impl OAuthConfigStore for InMemoryStore {
    async fn find_custom_oauth_config(
        &self,
        provider: &str,
    ) -> Result<Option<OAuthConfig>, ServiceError> {
        Ok(self.read()?.oauth_configs.get(provider).cloned())
    }
}
