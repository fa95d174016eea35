//! Shared setup for oauth-service integration tests.
//!
//! Builds the real router over the in-memory store and a mock profile
//! fetcher, with tenants and providers loaded through the regular
//! configuration path.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use oauth_service::{
    build_router,
    config::OAuthServiceConfig,
    models::{OAuthProfile, Role, Tenant, User, UserProvider},
    services::{
        InMemoryStore, JwtService, MockProfileFetcher, ProviderRegistry, StateClaims,
        TenantStore, UserStore,
    },
    AppState, Stores,
};
use std::collections::HashMap;
use std::sync::Arc;
use tower::util::ServiceExt;

pub const LOGIN_HOST: &str = "login.test.fider.io";
pub const TENANT_HOST: &str = "avengers.test.fider.io";
pub const DEMO_HOST: &str = "demo.test.fider.io";
pub const PRIVATE_HOST: &str = "feedback.theavengers.com";
pub const TRUSTED_PROVIDER: &str = "_jd72hfjv";
pub const UNTRUSTED_PROVIDER: &str = "_untrusted";
pub const SESSION_COOKIE: &str = "__session";
pub const AUTH_COOKIE: &str = "auth";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
    pub fetcher: Arc<MockProfileFetcher>,
    pub jwt: JwtService,
}

pub fn test_config() -> OAuthServiceConfig {
    let vars: HashMap<&str, &str> = [
        ("ENVIRONMENT", "dev"),
        ("LOG_LEVEL", "error"),
        ("LOGIN_HOST", LOGIN_HOST),
        ("JWT_SECRET", "integration-test-secret-0123456789abcdef"),
        ("TENANT_HOSTS", "avengers.test.fider.io,demo.test.fider.io"),
        ("PRIVATE_TENANT_HOSTS", PRIVATE_HOST),
        ("OAUTH_PROVIDERS", "facebook,google,_jd72hfjv,_untrusted"),
        ("OAUTH_FACEBOOK_CLIENT_ID", "FB_CL_ID"),
        ("OAUTH_FACEBOOK_CLIENT_SECRET", "FB_CL_SECRET"),
        ("OAUTH_GOOGLE_CLIENT_ID", "GO_CL_ID"),
        ("OAUTH_GOOGLE_CLIENT_SECRET", "GO_CL_SECRET"),
        ("OAUTH_JD72HFJV_CLIENT_ID", "AD_CL_ID"),
        ("OAUTH_JD72HFJV_CLIENT_SECRET", "AD_CL_SECRET"),
        ("OAUTH_JD72HFJV_AUTHORIZE_URL", "https://ad.example.com/authorize"),
        ("OAUTH_JD72HFJV_TOKEN_URL", "https://ad.example.com/token"),
        ("OAUTH_JD72HFJV_PROFILE_URL", "https://ad.example.com/me"),
        ("OAUTH_JD72HFJV_DISPLAY_NAME", "Microsoft AD"),
        ("OAUTH_JD72HFJV_TRUSTED", "true"),
        ("OAUTH_JD72HFJV_ROLE", "collaborator"),
        ("OAUTH_UNTRUSTED_CLIENT_ID", "UN_CL_ID"),
        ("OAUTH_UNTRUSTED_CLIENT_SECRET", "UN_CL_SECRET"),
        ("OAUTH_UNTRUSTED_AUTHORIZE_URL", "https://idp.example.com/authorize"),
        ("OAUTH_UNTRUSTED_TOKEN_URL", "https://idp.example.com/token"),
        ("OAUTH_UNTRUSTED_PROFILE_URL", "https://idp.example.com/me"),
    ]
    .into_iter()
    .collect();

    OAuthServiceConfig::from_source(
        &|key| vars.get(key).map(|v| v.to_string()),
        service_core::config::Config::default(),
    )
    .expect("Failed to build test configuration")
}

pub fn profile(id: &str, name: &str, email: &str) -> OAuthProfile {
    OAuthProfile {
        id: id.to_string(),
        name: name.to_string(),
        email: email.to_string(),
    }
}

pub async fn spawn_app() -> TestApp {
    let config = test_config();
    let jwt = JwtService::new(&config.jwt);

    let store = Arc::new(
        InMemoryStore::seeded(&config.tenants, &config.providers)
            .expect("Failed to seed store"),
    );
    let providers = Arc::new(
        ProviderRegistry::from_settings(&config.providers, config.public.login_base_url())
            .expect("Failed to build provider registry"),
    );
    let fetcher = Arc::new(
        MockProfileFetcher::new()
            .with_profile("123", profile("FB1234", "Jon Snow", "jon.snow@got.com"))
            .with_profile("P1", profile("P1", "Tony Stark", "e@x.com"))
            .with_profile("456", profile("AR1", "Arya Stark", ""))
            .with_profile("AD1", profile("AD1", "Sansa Stark", "sansa@got.com")),
    );

    let stores = Stores {
        tenants: store.clone(),
        users: store.clone(),
        oauth_configs: store.clone(),
    };
    let state = AppState::new(config, stores, providers, fetcher.clone());
    let router = build_router(state.clone())
        .await
        .expect("Failed to build router");

    TestApp {
        router,
        state,
        store,
        fetcher,
        jwt,
    }
}

impl TestApp {
    pub async fn tenant(&self, host: &str) -> Tenant {
        self.store
            .find_by_host(host)
            .await
            .unwrap()
            .expect("tenant is seeded")
    }

    pub async fn get(&self, host: &str, uri: &str, cookies: &[(&str, &str)]) -> Response<Body> {
        let mut request = Request::builder().uri(uri).header(header::HOST, host);

        if !cookies.is_empty() {
            let cookie = cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; ");
            request = request.header(header::COOKIE, cookie);
        }

        self.router
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    /// Signed state token as produced by the initiate step.
    pub fn state_token(&self, provider: &str, redirect: &str, identifier: &str) -> String {
        self.state_token_with(StateClaims::new(
            provider,
            redirect,
            identifier,
            None,
            chrono::Duration::minutes(10),
        ))
    }

    pub fn state_token_with(&self, claims: StateClaims) -> String {
        self.jwt.encode_state(&claims).unwrap()
    }

    pub async fn register_user(&self, host: &str, email: Option<&str>, link: (&str, &str)) -> User {
        let tenant = self.tenant(host).await;
        let user = User::new(
            tenant.tenant_id,
            "Jon Snow".to_string(),
            email.map(String::from),
            Role::Administrator,
        )
        .with_provider(UserProvider::new(link.0, link.1));

        self.store.register_user(user).await.unwrap()
    }

    /// Auth cookie value for an existing user.
    pub fn auth_cookie_for(&self, user: &User) -> String {
        self.state.cookies.issue(user).unwrap().value().to_string()
    }

    pub async fn users(&self, host: &str) -> Vec<User> {
        let tenant = self.tenant(host).await;
        self.store.users(tenant.tenant_id).unwrap()
    }
}

pub fn location(response: &Response<Body>) -> String {
    response.headers()[header::LOCATION]
        .to_str()
        .unwrap()
        .to_string()
}

pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// Value of the cookie `name` set by the response, if any.
pub fn cookie_value(response: &Response<Body>, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    set_cookies(response).into_iter().find_map(|c| {
        c.split(';')
            .next()
            .and_then(|pair| pair.strip_prefix(&prefix))
            .map(str::to_string)
    })
}

/// Decoded query parameter of an absolute URL.
pub fn query_param(url: &str, name: &str) -> Option<String> {
    url::Url::parse(url)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
