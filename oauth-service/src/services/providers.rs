//! OAuth providers and the registry that resolves them by name.
//!
//! Every provider, built-in or custom, runs the same authorization-code
//! exchange; they differ only in endpoints, scope and where the profile
//! fields live in the provider's JSON.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

use super::error::ServiceError;
use crate::config::ProviderSettings;
use crate::models::{OAuthProfile, ProviderOption};

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = concat!("oauth-service/", env!("CARGO_PKG_VERSION"));

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    fn name(&self) -> &str;

    fn display_name(&self) -> &str;

    /// Provider consent page for the given callback and state token.
    fn authorization_url(&self, callback_url: &str, state: &str) -> Result<String, ServiceError>;

    /// Trades an authorization code for the provider's raw profile document.
    async fn exchange_code(&self, code: &str, callback_url: &str) -> Result<Value, ServiceError>;

    fn parse_profile(&self, raw: &Value) -> Result<OAuthProfile, ServiceError>;
}

/// Turns a provider code into a normalized profile.
#[async_trait]
pub trait ProfileFetcher: Send + Sync {
    async fn fetch_profile(&self, provider: &str, code: &str)
        -> Result<OAuthProfile, ServiceError>;

    async fn fetch_raw_profile(&self, provider: &str, code: &str) -> Result<Value, ServiceError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Provider driven entirely by [`ProviderSettings`].
pub struct GenericOAuthProvider {
    settings: ProviderSettings,
    client: reqwest::Client,
}

impl GenericOAuthProvider {
    pub fn new(settings: ProviderSettings, client: reqwest::Client) -> Self {
        Self { settings, client }
    }
}

#[async_trait]
impl OAuthProvider for GenericOAuthProvider {
    fn name(&self) -> &str {
        &self.settings.name
    }

    fn display_name(&self) -> &str {
        &self.settings.display_name
    }

    fn authorization_url(&self, callback_url: &str, state: &str) -> Result<String, ServiceError> {
        let mut url = Url::parse(&self.settings.authorize_url).map_err(|e| {
            ServiceError::Internal(anyhow::anyhow!(
                "Invalid authorize URL for {}: {}",
                self.settings.name,
                e
            ))
        })?;

        url.query_pairs_mut()
            .append_pair("client_id", &self.settings.client_id)
            .append_pair("redirect_uri", callback_url)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.settings.scope)
            .append_pair("state", state);

        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str, callback_url: &str) -> Result<Value, ServiceError> {
        if code.is_empty() {
            return Err(ServiceError::ProfileFetchFailed("empty code".to_string()));
        }

        let token_res = self
            .client
            .post(&self.settings.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("client_id", self.settings.client_id.as_str()),
                ("client_secret", self.settings.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", callback_url),
            ])
            .send()
            .await
            .map_err(|e| {
                tracing::error!(provider = %self.settings.name, error = %e, "Failed to exchange OAuth code");
                ServiceError::ProfileFetchFailed(e.to_string())
            })?;

        if !token_res.status().is_success() {
            let status = token_res.status();
            tracing::warn!(provider = %self.settings.name, status = %status, "OAuth token exchange rejected");
            return Err(ServiceError::ProfileFetchFailed(format!(
                "token endpoint returned {}",
                status
            )));
        }

        let token: TokenResponse = token_res
            .json()
            .await
            .map_err(|e| ServiceError::ProfileFetchFailed(e.to_string()))?;

        let profile_res = self
            .client
            .get(&self.settings.profile_url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/json")
            .bearer_auth(token.access_token)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(provider = %self.settings.name, error = %e, "Failed to fetch OAuth profile");
                ServiceError::ProfileFetchFailed(e.to_string())
            })?;

        if !profile_res.status().is_success() {
            return Err(ServiceError::ProfileFetchFailed(format!(
                "profile endpoint returned {}",
                profile_res.status()
            )));
        }

        profile_res
            .json::<Value>()
            .await
            .map_err(|e| ServiceError::ProfileFetchFailed(e.to_string()))
    }

    fn parse_profile(&self, raw: &Value) -> Result<OAuthProfile, ServiceError> {
        normalize_profile(
            json_path(raw, &self.settings.json_id_path),
            json_path(raw, &self.settings.json_name_path),
            json_path(raw, &self.settings.json_email_path),
        )
    }
}

/// Looks up `path` in `value`. Segments are dotted (`user.mail`) and a comma
/// separates fallbacks tried in order (`name, login`). Numbers are returned
/// in their decimal form.
pub fn json_path(value: &Value, path: &str) -> Option<String> {
    path.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .find_map(|candidate| {
            let found = candidate
                .split('.')
                .try_fold(value, |current, segment| current.get(segment))?;

            match found {
                Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }
        })
}

pub fn normalize_profile(
    id: Option<String>,
    name: Option<String>,
    email: Option<String>,
) -> Result<OAuthProfile, ServiceError> {
    let id = id.map(|s| s.trim().to_string()).unwrap_or_default();
    if id.is_empty() {
        return Err(ServiceError::ProfileFetchFailed(
            "profile has no identifier".to_string(),
        ));
    }

    let name = name
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Anonymous".to_string());

    let email = email
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_default();

    Ok(OAuthProfile { id, name, email })
}

/// Name to provider map, built once at startup.
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn OAuthProvider>>,
    login_base_url: String,
}

impl ProviderRegistry {
    pub fn new(login_base_url: impl Into<String>) -> Self {
        Self {
            providers: BTreeMap::new(),
            login_base_url: login_base_url.into(),
        }
    }

    pub fn from_settings(
        settings: &[ProviderSettings],
        login_base_url: impl Into<String>,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to build HTTP client: {}", e)))?;

        let mut registry = Self::new(login_base_url);
        for provider in settings {
            registry.register(Arc::new(GenericOAuthProvider::new(
                provider.clone(),
                client.clone(),
            )))?;
        }

        tracing::info!(providers = ?registry.names(), "OAuth providers registered");
        Ok(registry)
    }

    pub fn register(&mut self, provider: Arc<dyn OAuthProvider>) -> Result<(), ServiceError> {
        let name = provider.name().to_string();
        if self.providers.contains_key(&name) {
            return Err(ServiceError::Conflict(format!(
                "OAuth provider '{}' registered twice",
                name
            )));
        }
        self.providers.insert(name, provider);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn OAuthProvider>, ServiceError> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| ServiceError::UnknownProvider(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    /// Callback URL registered with the provider, always on the login host.
    pub fn callback_url(&self, name: &str) -> String {
        format!("{}/oauth/{}/callback", self.login_base_url, name)
    }

    pub fn list(&self) -> Vec<ProviderOption> {
        self.providers
            .values()
            .map(|p| ProviderOption {
                provider: p.name().to_string(),
                display_name: p.display_name().to_string(),
                url: format!("/oauth/{}", p.name()),
                callback_url: self.callback_url(p.name()),
            })
            .collect()
    }
}

#[async_trait]
impl ProfileFetcher for ProviderRegistry {
    async fn fetch_profile(
        &self,
        provider: &str,
        code: &str,
    ) -> Result<OAuthProfile, ServiceError> {
        let oauth = self.get(provider)?;
        let raw = oauth.exchange_code(code, &self.callback_url(provider)).await?;
        oauth.parse_profile(&raw)
    }

    async fn fetch_raw_profile(&self, provider: &str, code: &str) -> Result<Value, ServiceError> {
        let oauth = self.get(provider)?;
        oauth.exchange_code(code, &self.callback_url(provider)).await
    }
}

/// In-process fetcher keyed by authorization code, for tests and local
/// development without real providers.
#[derive(Default)]
pub struct MockProfileFetcher {
    profiles: Mutex<BTreeMap<String, OAuthProfile>>,
    calls: AtomicUsize,
}

impl MockProfileFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(self, code: &str, profile: OAuthProfile) -> Self {
        if let Ok(mut profiles) = self.profiles.lock() {
            profiles.insert(code.to_string(), profile);
        }
        self
    }

    /// Number of fetches attempted so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileFetcher for MockProfileFetcher {
    async fn fetch_profile(
        &self,
        _provider: &str,
        code: &str,
    ) -> Result<OAuthProfile, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let profiles = self
            .profiles
            .lock()
            .map_err(|_| ServiceError::Internal(anyhow::anyhow!("Mock lock poisoned")))?;

        profiles
            .get(code)
            .cloned()
            .ok_or_else(|| ServiceError::ProfileFetchFailed(format!("unknown code '{}'", code)))
    }

    async fn fetch_raw_profile(&self, provider: &str, code: &str) -> Result<Value, ServiceError> {
        let profile = self.fetch_profile(provider, code).await?;
        serde_json::to_value(profile).map_err(|e| ServiceError::Internal(e.into()))
    }
}
