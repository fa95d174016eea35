use std::sync::Arc;

use super::error::ServiceError;
use super::store::{OAuthConfigStore, UserStore};
use crate::models::{OAuthProfile, Role, Tenant, User, UserProvider};

/// How a profile was matched to an account.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Identity was already linked.
    Existing(User),
    /// Identity was attached to the account with the same email.
    Linked(User),
    Registered(User),
}

impl Resolution {
    pub fn user(&self) -> &User {
        match self {
            Resolution::Existing(u) | Resolution::Linked(u) | Resolution::Registered(u) => u,
        }
    }

    pub fn into_user(self) -> User {
        match self {
            Resolution::Existing(u) | Resolution::Linked(u) | Resolution::Registered(u) => u,
        }
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            Resolution::Existing(_) => "signed_in",
            Resolution::Linked(_) => "linked",
            Resolution::Registered(_) => "registered",
        }
    }
}

/// Maps a provider profile to a tenant user: sign in, link by email or
/// register, in that order.
pub struct UserResolver {
    users: Arc<dyn UserStore>,
    oauth_configs: Arc<dyn OAuthConfigStore>,
}

impl UserResolver {
    pub fn new(users: Arc<dyn UserStore>, oauth_configs: Arc<dyn OAuthConfigStore>) -> Self {
        Self {
            users,
            oauth_configs,
        }
    }

    pub async fn resolve(
        &self,
        tenant: &Tenant,
        provider: &str,
        profile: &OAuthProfile,
    ) -> Result<Resolution, ServiceError> {
        if let Some(user) = self
            .users
            .find_by_provider(tenant.tenant_id, provider, &profile.id)
            .await?
        {
            return Ok(Resolution::Existing(user));
        }
        tracing::debug!(provider, "No user linked to this identity");

        if let Some(email) = profile.email() {
            if let Some(mut user) = self.users.find_by_email(tenant.tenant_id, email).await? {
                let link = UserProvider::new(provider, profile.id.clone());
                self.users
                    .register_user_provider(tenant.tenant_id, user.user_id, link.clone())
                    .await?;
                user.providers.push(link);

                tracing::info!(user_id = %user.user_id, provider, "Linked provider to existing user");
                return Ok(Resolution::Linked(user));
            }
            tracing::debug!(provider, "No user with this email");
        }

        let custom = self.oauth_configs.find_custom_oauth_config(provider).await?;
        let trusted = custom.as_ref().filter(|c| c.is_trusted);

        if tenant.is_private && trusted.is_none() {
            tracing::info!(tenant_id = %tenant.tenant_id, provider, "Sign-up rejected on private tenant");
            return Err(ServiceError::NotInvited);
        }

        let role = trusted.map(|c| c.role).unwrap_or(Role::Visitor);
        let user = User::new(
            tenant.tenant_id,
            profile.name.clone(),
            profile.email().map(String::from),
            role,
        )
        .with_provider(UserProvider::new(provider, profile.id.clone()));

        match self.users.register_user(user).await {
            Ok(user) => {
                tracing::info!(user_id = %user.user_id, provider, role = role.as_str(), "Registered new user");
                Ok(Resolution::Registered(user))
            }
            // A concurrent callback for the same identity won the insert.
            Err(ServiceError::Conflict(_)) => self
                .users
                .find_by_provider(tenant.tenant_id, provider, &profile.id)
                .await?
                .map(Resolution::Existing)
                .ok_or_else(|| ServiceError::Conflict("identity already linked".to_string())),
            Err(e) => Err(e),
        }
    }
}
