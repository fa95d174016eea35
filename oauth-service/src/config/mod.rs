use service_core::config as core_config;
use service_core::error::AppError;
use std::collections::{HashMap, HashSet};
use std::env;
use url::Url;

use crate::models::{OAuthConfig, Role};

/// Used only when `ENVIRONMENT=dev` and `JWT_SECRET` is unset.
const DEV_JWT_SECRET: &str = "dev-only-secret-change-me-0123456789abcdef";
const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct OAuthServiceConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub public: PublicConfig,
    pub jwt: JwtConfig,
    pub cookies: CookieConfig,
    pub tenants: TenantSeedConfig,
    pub providers: Vec<ProviderSettings>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

/// How the service is reached from browsers.
#[derive(Debug, Clone)]
pub struct PublicConfig {
    /// `http` or `https`.
    pub scheme: String,
    /// Shared host that receives provider callbacks.
    pub login_host: String,
}

impl PublicConfig {
    pub fn login_base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.login_host)
    }
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub state_token_expiry_minutes: i64,
    pub signup_token_expiry_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub auth_cookie_name: String,
    pub session_cookie_name: String,
    pub auth_cookie_expiry_days: i64,
    pub secure: bool,
}

/// Hosts used to seed the tenant store.
#[derive(Debug, Clone, Default)]
pub struct TenantSeedConfig {
    pub hosts: Vec<String>,
    pub private_hosts: Vec<String>,
}

/// Endpoints and profile mapping of one OAuth provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub name: String,
    pub display_name: String,
    pub client_id: String,
    pub client_secret: String,
    pub authorize_url: String,
    pub token_url: String,
    pub profile_url: String,
    pub scope: String,
    /// Dotted JSON paths; a comma separates fallbacks (`name, login`).
    pub json_id_path: String,
    pub json_name_path: String,
    pub json_email_path: String,
    pub builtin: bool,
    pub is_trusted: bool,
    pub role: Role,
}

impl ProviderSettings {
    pub const BUILTIN: [&'static str; 3] = ["facebook", "google", "github"];

    /// Settings of a built-in provider, `None` for any other name.
    pub fn builtin(name: &str, client_id: &str, client_secret: &str) -> Option<Self> {
        let (display_name, authorize_url, token_url, profile_url, scope, id, name_path) =
            match name {
                "facebook" => (
                    "Facebook",
                    "https://www.facebook.com/v3.2/dialog/oauth",
                    "https://graph.facebook.com/v3.2/oauth/access_token",
                    "https://graph.facebook.com/v3.2/me?fields=name,email",
                    "public_profile email",
                    "id",
                    "name",
                ),
                "google" => (
                    "Google",
                    "https://accounts.google.com/o/oauth2/v2/auth",
                    "https://oauth2.googleapis.com/token",
                    "https://www.googleapis.com/oauth2/v2/userinfo",
                    "profile email",
                    "id",
                    "name",
                ),
                "github" => (
                    "GitHub",
                    "https://github.com/login/oauth/authorize",
                    "https://github.com/login/oauth/access_token",
                    "https://api.github.com/user",
                    "user:email",
                    "id",
                    "name, login",
                ),
                _ => return None,
            };

        Some(Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            authorize_url: authorize_url.to_string(),
            token_url: token_url.to_string(),
            profile_url: profile_url.to_string(),
            scope: scope.to_string(),
            json_id_path: id.to_string(),
            json_name_path: name_path.to_string(),
            json_email_path: "email".to_string(),
            builtin: true,
            is_trusted: false,
            role: Role::Visitor,
        })
    }

    /// Trust settings exposed to the user resolver; built-ins have none.
    pub fn custom_config(&self) -> Option<OAuthConfig> {
        if self.builtin {
            return None;
        }
        Some(OAuthConfig {
            provider: self.name.clone(),
            display_name: self.display_name.clone(),
            is_trusted: self.is_trusted,
            role: self.role,
        })
    }
}

impl OAuthServiceConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        Self::from_source(&|key| env::var(key).ok(), common_config)
    }

    /// Builds the configuration from any key lookup (the process
    /// environment in production).
    pub fn from_source(
        lookup: &dyn Fn(&str) -> Option<String>,
        common: core_config::Config,
    ) -> Result<Self, AppError> {
        let env_str = lookup("ENVIRONMENT").unwrap_or_else(|| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;
        let get = |key: &str, default: Option<&str>| get_env(lookup, key, default);

        let scheme = get("PUBLIC_SCHEME", Some("http"))?.to_lowercase();
        let providers = parse_providers(lookup, &get("OAUTH_PROVIDERS", Some(""))?)?;

        let config = OAuthServiceConfig {
            common,
            environment: environment.clone(),
            service_name: get("SERVICE_NAME", Some("oauth-service"))?,
            service_version: get("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")))?,
            log_level: get("LOG_LEVEL", Some("info"))?,
            otlp_endpoint: lookup("OTLP_ENDPOINT").filter(|v| !v.trim().is_empty()),
            public: PublicConfig {
                login_host: get("LOGIN_HOST", None)?.to_ascii_lowercase(),
                scheme: scheme.clone(),
            },
            jwt: JwtConfig {
                secret: get(
                    "JWT_SECRET",
                    if is_prod { None } else { Some(DEV_JWT_SECRET) },
                )?,
                state_token_expiry_minutes: parse_number(
                    "STATE_TOKEN_EXPIRY_MINUTES",
                    &get("STATE_TOKEN_EXPIRY_MINUTES", Some("10"))?,
                )?,
                signup_token_expiry_minutes: parse_number(
                    "SIGNUP_TOKEN_EXPIRY_MINUTES",
                    &get("SIGNUP_TOKEN_EXPIRY_MINUTES", Some("10"))?,
                )?,
            },
            cookies: CookieConfig {
                auth_cookie_name: get("AUTH_COOKIE_NAME", Some("auth"))?,
                session_cookie_name: get("SESSION_COOKIE_NAME", Some("__session"))?,
                auth_cookie_expiry_days: parse_number(
                    "AUTH_COOKIE_EXPIRY_DAYS",
                    &get("AUTH_COOKIE_EXPIRY_DAYS", Some("365"))?,
                )?,
                secure: scheme == "https",
            },
            tenants: TenantSeedConfig {
                hosts: parse_hosts(&get("TENANT_HOSTS", Some(""))?),
                private_hosts: parse_hosts(&get("PRIVATE_TENANT_HOSTS", Some(""))?),
            },
            providers,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.public.scheme != "http" && self.public.scheme != "https" {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PUBLIC_SCHEME must be http or https"
            )));
        }

        if self.public.login_host.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "LOGIN_HOST must not be empty"
            )));
        }

        if self.jwt.state_token_expiry_minutes <= 0 || self.jwt.signup_token_expiry_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Token expiry windows must be positive"
            )));
        }

        if self.cookies.auth_cookie_expiry_days <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "AUTH_COOKIE_EXPIRY_DAYS must be positive"
            )));
        }

        if self.cookies.auth_cookie_name == self.cookies.session_cookie_name {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Auth and session cookies must have different names"
            )));
        }

        let mut seen = HashSet::new();
        let mut env_keys = HashMap::new();
        for provider in &self.providers {
            if !seen.insert(provider.name.as_str()) {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "OAuth provider '{}' is configured twice",
                    provider.name
                )));
            }
            // `_x` and `x` would both read OAUTH_X_*.
            let key = provider_env_key(&provider.name);
            if let Some(other) = env_keys.insert(key.clone(), provider.name.as_str()) {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "OAuth providers '{}' and '{}' share the OAUTH_{}_* variables",
                    other,
                    provider.name,
                    key
                )));
            }
        }

        if self.environment == Environment::Prod {
            if self.jwt.secret.len() < MIN_SECRET_LEN {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "JWT_SECRET must be at least {} bytes in production",
                    MIN_SECRET_LEN
                )));
            }

            if self.public.scheme != "https" {
                tracing::warn!("PUBLIC_SCHEME is http in production; cookies will not be Secure");
            }
        }

        Ok(())
    }
}

/// Reads every provider named in `OAUTH_PROVIDERS`. A name that is neither
/// built-in nor fully described fails here, before the server starts.
fn parse_providers(
    lookup: &dyn Fn(&str) -> Option<String>,
    names: &str,
) -> Result<Vec<ProviderSettings>, AppError> {
    let mut providers = Vec::new();

    for name in parse_names(names) {
        let key = provider_env_key(&name);
        let var = |suffix: &str| format!("OAUTH_{}_{}", key, suffix);

        let client_id = get_env(lookup, &var("CLIENT_ID"), None)?;
        let client_secret = get_env(lookup, &var("CLIENT_SECRET"), None)?;

        if let Some(settings) = ProviderSettings::builtin(&name, &client_id, &client_secret) {
            providers.push(settings);
            continue;
        }

        let authorize_url = get_url(lookup, &var("AUTHORIZE_URL"))?;
        let token_url = get_url(lookup, &var("TOKEN_URL"))?;
        let profile_url = get_url(lookup, &var("PROFILE_URL"))?;
        let role = get_env(lookup, &var("ROLE"), Some("visitor"))?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        providers.push(ProviderSettings {
            display_name: get_env(lookup, &var("DISPLAY_NAME"), Some(&name))?,
            name,
            client_id,
            client_secret,
            authorize_url,
            token_url,
            profile_url,
            scope: get_env(lookup, &var("SCOPE"), Some("openid profile email"))?,
            json_id_path: get_env(lookup, &var("JSON_ID_PATH"), Some("id"))?,
            json_name_path: get_env(lookup, &var("JSON_NAME_PATH"), Some("name"))?,
            json_email_path: get_env(lookup, &var("JSON_EMAIL_PATH"), Some("email"))?,
            builtin: false,
            is_trusted: parse_flag(
                &var("TRUSTED"),
                &get_env(lookup, &var("TRUSTED"), Some("false"))?,
            )?,
            role,
        });
    }

    Ok(providers)
}

/// `_jd72hfjv` -> `JD72HFJV`, `my-idp` -> `MY_IDP`.
fn provider_env_key(name: &str) -> String {
    name.trim_start_matches('_')
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Provider names are kept as configured; they appear in routes and links.
fn parse_names(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_hosts(value: &str) -> Vec<String> {
    parse_names(value)
        .into_iter()
        .map(|h| h.to_ascii_lowercase())
        .collect()
}

fn parse_flag(key: &str, value: &str) -> Result<bool, AppError> {
    value.trim().parse().map_err(|_| {
        AppError::ConfigError(anyhow::anyhow!("{} must be true or false, got '{}'", key, value))
    })
}

fn parse_number<T>(key: &str, value: &str) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!("{} is not a valid number: {}", key, e))
    })
}

fn get_url(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Result<String, AppError> {
    let value = get_env(lookup, key, None)?;
    Url::parse(&value)
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("{} is not a valid URL: {}", key, e)))?;
    Ok(value)
}

fn get_env(
    lookup: &dyn Fn(&str) -> Option<String>,
    key: &str,
    default: Option<&str>,
) -> Result<String, AppError> {
    match lookup(key) {
        Some(val) => Ok(val),
        None => match default {
            Some(def) => Ok(def.to_string()),
            None => Err(AppError::ConfigError(anyhow::anyhow!(format!(
                "{} is required but not set",
                key
            )))),
        },
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
