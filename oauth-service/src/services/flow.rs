//! The three legs of the OAuth sign-in: initiate on the tenant host, callback
//! on the shared login host, finalize back on the tenant host.
//!
//! Nothing is kept server side between legs. Everything the later legs trust
//! comes from the signed [`StateClaims`] and is re-validated on arrival.

use axum::response::{IntoResponse, Json, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use url::Url;

use super::cookies::AuthCookieIssuer;
use super::error::ServiceError;
use super::jwt::{JwtService, StateClaims};
use super::providers::{ProfileFetcher, ProviderRegistry};
use super::redirect::{authority, request_uri, RedirectGuard};
use super::resolver::UserResolver;
use crate::dtos::oauth::EchoResponse;
use crate::models::Tenant;

pub const NOT_INVITED_PATH: &str = "/not-invited";

/// Result of one flow step. Every variant but `Report` is a 307 redirect.
#[derive(Debug)]
pub enum FlowStep {
    /// Provider consent page.
    Provider(String),
    /// Caller already has a session; skip the provider.
    AlreadySignedIn(String),
    /// Tenant-scoped token URL, from the login host.
    Finalize(String),
    /// Provider returned no code.
    Declined(String),
    /// Sign-up page carrying a profile token.
    SignUp(String),
    /// Provider test page.
    Echo(String),
    SignedIn {
        location: String,
        cookie: Cookie<'static>,
        outcome: &'static str,
    },
    /// Sign-in silently did not happen: no cookie.
    Rejected(String),
    NotInvited,
    Report(EchoResponse),
}

impl FlowStep {
    pub fn location(&self) -> Option<&str> {
        match self {
            FlowStep::Provider(l)
            | FlowStep::AlreadySignedIn(l)
            | FlowStep::Finalize(l)
            | FlowStep::Declined(l)
            | FlowStep::SignUp(l)
            | FlowStep::Echo(l)
            | FlowStep::Rejected(l) => Some(l),
            FlowStep::SignedIn { location, .. } => Some(location),
            FlowStep::NotInvited => Some(NOT_INVITED_PATH),
            FlowStep::Report(_) => None,
        }
    }

    /// Metric label.
    pub fn outcome(&self) -> &'static str {
        match self {
            FlowStep::Provider(_) => "redirected_to_provider",
            FlowStep::AlreadySignedIn(_) => "already_signed_in",
            FlowStep::Finalize(_) => "finalize",
            FlowStep::Declined(_) => "declined",
            FlowStep::SignUp(_) => "signup",
            FlowStep::Echo(_) => "echo",
            FlowStep::SignedIn { outcome, .. } => *outcome,
            FlowStep::Rejected(_) => "rejected",
            FlowStep::NotInvited => "not_invited",
            FlowStep::Report(_) => "echoed",
        }
    }
}

impl IntoResponse for FlowStep {
    fn into_response(self) -> Response {
        match self {
            FlowStep::SignedIn {
                location, cookie, ..
            } => (CookieJar::new().add(cookie), Redirect::temporary(&location)).into_response(),
            FlowStep::Report(report) => Json(report).into_response(),
            step => match step.location() {
                Some(location) => Redirect::temporary(location).into_response(),
                None => Redirect::temporary("/").into_response(),
            },
        }
    }
}

/// Input of the initiate leg.
#[derive(Debug, Default)]
pub struct InitiateRequest<'a> {
    pub provider: &'a str,
    pub redirect: Option<&'a str>,
    pub draft_code: Option<String>,
    pub session_id: &'a str,
    pub authenticated: bool,
}

/// Input of the finalize leg, as received on the tenant host.
#[derive(Debug, Default)]
pub struct FinalizeRequest<'a> {
    pub provider: &'a str,
    pub code: &'a str,
    pub identifier: &'a str,
    pub redirect: &'a str,
    pub draft_code: Option<&'a str>,
    pub session_id: &'a str,
}

pub struct OAuthFlow {
    jwt: Arc<JwtService>,
    providers: Arc<ProviderRegistry>,
    profiles: Arc<dyn ProfileFetcher>,
    resolver: UserResolver,
    cookies: Arc<dyn AuthCookieIssuer>,
    scheme: String,
}

impl OAuthFlow {
    pub fn new(
        jwt: Arc<JwtService>,
        providers: Arc<ProviderRegistry>,
        profiles: Arc<dyn ProfileFetcher>,
        resolver: UserResolver,
        cookies: Arc<dyn AuthCookieIssuer>,
        scheme: impl Into<String>,
    ) -> Self {
        Self {
            jwt,
            providers,
            profiles,
            resolver,
            cookies,
            scheme: scheme.into(),
        }
    }

    pub async fn initiate(
        &self,
        tenant: &Tenant,
        request: InitiateRequest<'_>,
    ) -> Result<FlowStep, ServiceError> {
        let provider = self.providers.get(request.provider)?;
        let target = RedirectGuard::resolve(
            request.redirect.unwrap_or_default(),
            &tenant.base_url(&self.scheme),
        )?;

        // Signed-in users only go through the provider to test it.
        if request.authenticated && target.path() != echo_path(request.provider) {
            return Ok(FlowStep::AlreadySignedIn(target.to_string()));
        }

        let claims = StateClaims::new(
            request.provider,
            target.as_str(),
            request.session_id,
            request.draft_code,
            self.jwt.state_ttl(),
        );
        let state = self.jwt.encode_state(&claims)?;
        let url = provider.authorization_url(&self.providers.callback_url(request.provider), &state)?;

        Ok(FlowStep::Provider(url))
    }

    /// Runs on the login host. `path_provider` is set when the provider was
    /// part of the callback route and must agree with the signed claim.
    ///
    /// Tokens without an identifier come from the site-creation front-end,
    /// which signs up before any tenant session exists; `initiate` always
    /// binds one.
    pub async fn callback(
        &self,
        path_provider: Option<&str>,
        state: &str,
        code: Option<&str>,
    ) -> Result<FlowStep, ServiceError> {
        let claims = self.jwt.decode_state(state)?;

        if path_provider.is_some_and(|p| p != claims.provider) {
            return Err(ServiceError::InvalidState);
        }

        let code = code.unwrap_or_default();
        if code.is_empty() {
            return Ok(FlowStep::Declined(claims.redirect));
        }

        let redirect = Url::parse(&claims.redirect).map_err(|_| ServiceError::InvalidState)?;

        if claims.identifier.is_empty() {
            return self.sign_up(&claims, redirect, code).await;
        }

        let mut finalize = redirect.clone();
        finalize.set_path(&format!("/oauth/{}/token", claims.provider));
        finalize.set_fragment(None);
        finalize.set_query(None);
        {
            let mut query = finalize.query_pairs_mut();
            query
                .append_pair("code", code)
                .append_pair("identifier", &claims.identifier)
                .append_pair("redirect", &request_uri(&redirect));
            if let Some(draft) = &claims.draft_code {
                query.append_pair("draft", draft);
            }
        }

        Ok(FlowStep::Finalize(finalize.to_string()))
    }

    async fn sign_up(
        &self,
        claims: &StateClaims,
        mut redirect: Url,
        code: &str,
    ) -> Result<FlowStep, ServiceError> {
        let profile = match self.profiles.fetch_profile(&claims.provider, code).await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(provider = %claims.provider, error = %e, "Sign-up profile fetch failed");
                return Ok(FlowStep::Rejected(claims.redirect.clone()));
            }
        };

        let token = self.jwt.encode_signup(&claims.provider, &profile)?;
        redirect.query_pairs_mut().append_pair("token", &token);

        Ok(FlowStep::SignUp(redirect.to_string()))
    }

    /// Session mismatches and uninvited users end in a redirect, never an
    /// error page.
    pub async fn finalize(
        &self,
        tenant: &Tenant,
        request: FinalizeRequest<'_>,
    ) -> Result<FlowStep, ServiceError> {
        let provider = request.provider;

        match self.sign_in(tenant, request).await {
            Err(ServiceError::SessionMismatch) => {
                tracing::warn!(provider, "OAuth identifier does not match session");
                Ok(FlowStep::Rejected("/".to_string()))
            }
            Err(ServiceError::NotInvited) => Ok(FlowStep::NotInvited),
            result => result,
        }
    }

    async fn sign_in(
        &self,
        tenant: &Tenant,
        request: FinalizeRequest<'_>,
    ) -> Result<FlowStep, ServiceError> {
        self.providers.get(request.provider)?;
        let mut target =
            RedirectGuard::resolve(request.redirect, &tenant.base_url(&self.scheme))?;

        ensure_same_session(request.identifier, request.session_id)?;

        if target.path() == echo_path(request.provider) {
            let mut echo = target.clone();
            echo.set_query(None);
            echo.query_pairs_mut()
                .append_pair("code", request.code)
                .append_pair("identifier", request.identifier);
            return Ok(FlowStep::Echo(request_uri(&echo)));
        }

        let profile = match self
            .profiles
            .fetch_profile(request.provider, request.code)
            .await
        {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(provider = request.provider, error = %e, "OAuth profile fetch failed");
                return Ok(FlowStep::Rejected(location(&target, tenant)));
            }
        };

        let resolution = self
            .resolver
            .resolve(tenant, request.provider, &profile)
            .await?;

        if let Some(draft) = request.draft_code.filter(|d| !d.is_empty()) {
            target.query_pairs_mut().append_pair("draft", draft);
        }

        let outcome = resolution.outcome();
        let cookie = self.cookies.issue(resolution.user())?;

        Ok(FlowStep::SignedIn {
            location: location(&target, tenant),
            cookie,
            outcome,
        })
    }

    /// Provider test page: the raw document and how it maps to a profile.
    /// Anyone but the signed-in user who started the test is sent home.
    pub async fn echo(
        &self,
        provider: &str,
        code: &str,
        identifier: &str,
        session_id: &str,
        authenticated: bool,
    ) -> Result<FlowStep, ServiceError> {
        let oauth = self.providers.get(provider)?;

        if !authenticated || ensure_same_session(identifier, session_id).is_err() {
            return Ok(FlowStep::Rejected("/".to_string()));
        }

        let mut report = EchoResponse {
            provider: provider.to_string(),
            raw: None,
            profile: None,
            error: None,
        };

        match self.profiles.fetch_raw_profile(provider, code).await {
            Ok(raw) => {
                match oauth.parse_profile(&raw) {
                    Ok(profile) => report.profile = Some(profile),
                    Err(e) => report.error = Some(e.to_string()),
                }
                report.raw = Some(raw);
            }
            Err(e) => report.error = Some(e.to_string()),
        }

        Ok(FlowStep::Report(report))
    }
}

fn echo_path(provider: &str) -> String {
    format!("/oauth/{}/echo", provider)
}

/// Empty identifiers never match.
fn ensure_same_session(identifier: &str, session_id: &str) -> Result<(), ServiceError> {
    if !identifier.is_empty() && bool::from(identifier.as_bytes().ct_eq(session_id.as_bytes())) {
        Ok(())
    } else {
        Err(ServiceError::SessionMismatch)
    }
}

/// Path-only on the tenant host itself, absolute on a subdomain.
fn location(target: &Url, tenant: &Tenant) -> String {
    match authority(target) {
        Some(host) if host == tenant.host => request_uri(target),
        _ => target.to_string(),
    }
}
