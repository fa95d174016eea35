use axum::{
    extract::{Path, Query, State},
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::oauth::{CallbackQuery, EchoQuery, SignInQuery, TokenQuery};
use crate::middleware::{CurrentUser, SessionId};
use crate::models::{ProviderOption, Tenant};
use crate::services::metrics::record_flow_outcome;
use crate::services::{FinalizeRequest, FlowStep, InitiateRequest, ServiceError};
use crate::AppState;

/// Start an OAuth sign-in on the tenant host
#[utoipa::path(
    get,
    path = "/oauth/{provider}",
    params(
        ("provider" = String, Path, description = "Provider name, e.g. facebook"),
        SignInQuery
    ),
    responses(
        (status = 307, description = "Redirect to the provider, or straight to the target when already signed in"),
        (status = 403, description = "Redirect target is not on this site"),
        (status = 404, description = "Unknown provider or tenant")
    ),
    tag = "OAuth"
)]
#[tracing::instrument(skip_all, fields(provider = %provider, tenant_id = %tenant.tenant_id))]
pub async fn sign_in_by_oauth(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    tenant: Tenant,
    session: SessionId,
    user: Option<CurrentUser>,
    Query(query): Query<SignInQuery>,
) -> Result<FlowStep, AppError> {
    query
        .validate()
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!(e)))?;

    let authenticated = user.is_some_and(|u| u.belongs_to(&tenant));
    let result = state
        .flow
        .initiate(
            &tenant,
            InitiateRequest {
                provider: &provider,
                redirect: query.redirect.as_deref(),
                draft_code: query.code,
                session_id: session.as_str(),
                authenticated,
            },
        )
        .await;

    finish("initiate", result)
}

/// Provider callback on the login host
#[utoipa::path(
    get,
    path = "/oauth/callback",
    params(CallbackQuery),
    responses(
        (status = 307, description = "Redirect to the tenant token URL, or back when consent was declined"),
        (status = 403, description = "Invalid, expired or tampered state")
    ),
    tag = "OAuth"
)]
#[tracing::instrument(skip_all)]
pub async fn oauth_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<FlowStep, AppError> {
    let result = state
        .flow
        .callback(None, &query.state, query.code.as_deref())
        .await;

    finish("callback", result)
}

/// Provider callback on the login host, provider-scoped form
#[utoipa::path(
    get,
    path = "/oauth/{provider}/callback",
    params(
        ("provider" = String, Path, description = "Provider name"),
        CallbackQuery
    ),
    responses(
        (status = 307, description = "Redirect to the tenant token URL"),
        (status = 403, description = "Invalid state or provider mismatch")
    ),
    tag = "OAuth"
)]
#[tracing::instrument(skip_all, fields(provider = %provider))]
pub async fn oauth_provider_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Result<FlowStep, AppError> {
    let result = state
        .flow
        .callback(Some(&provider), &query.state, query.code.as_deref())
        .await;

    finish("callback", result)
}

/// Finish sign-in on the tenant host
#[utoipa::path(
    get,
    path = "/oauth/{provider}/token",
    params(
        ("provider" = String, Path, description = "Provider name"),
        TokenQuery
    ),
    responses(
        (status = 307, description = "Redirect to the target, with the auth cookie on success"),
        (status = 403, description = "Redirect target is not on this site"),
        (status = 404, description = "Unknown provider or tenant")
    ),
    tag = "OAuth"
)]
#[tracing::instrument(skip_all, fields(provider = %provider, tenant_id = %tenant.tenant_id))]
pub async fn oauth_token(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    tenant: Tenant,
    session: SessionId,
    Query(query): Query<TokenQuery>,
) -> Result<FlowStep, AppError> {
    query
        .validate()
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!(e)))?;

    let result = state
        .flow
        .finalize(
            &tenant,
            FinalizeRequest {
                provider: &provider,
                code: &query.code,
                identifier: &query.identifier,
                redirect: &query.redirect,
                draft_code: query.draft.as_deref(),
                session_id: session.as_str(),
            },
        )
        .await;

    finish("token", result)
}

/// Raw and parsed profile of a provider, for the signed-in tester
#[utoipa::path(
    get,
    path = "/oauth/{provider}/echo",
    params(
        ("provider" = String, Path, description = "Provider name"),
        EchoQuery
    ),
    responses(
        (status = 200, description = "Provider profile report", body = crate::dtos::oauth::EchoResponse),
        (status = 307, description = "Not the user who started the test"),
        (status = 404, description = "Unknown provider or tenant")
    ),
    tag = "OAuth"
)]
#[tracing::instrument(skip_all, fields(provider = %provider, tenant_id = %tenant.tenant_id))]
pub async fn oauth_echo(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    tenant: Tenant,
    session: SessionId,
    user: Option<CurrentUser>,
    Query(query): Query<EchoQuery>,
) -> Result<FlowStep, AppError> {
    let authenticated = user.is_some_and(|u| u.belongs_to(&tenant));
    let result = state
        .flow
        .echo(
            &provider,
            &query.code,
            &query.identifier,
            session.as_str(),
            authenticated,
        )
        .await;

    finish("echo", result)
}

/// List registered providers
#[utoipa::path(
    get,
    path = "/oauth/providers",
    responses(
        (status = 200, description = "Registered providers", body = [ProviderOption])
    ),
    tag = "OAuth"
)]
pub async fn list_providers(State(state): State<AppState>) -> Json<Vec<ProviderOption>> {
    Json(state.providers.list())
}

fn finish(step: &'static str, result: Result<FlowStep, ServiceError>) -> Result<FlowStep, AppError> {
    match &result {
        Ok(flow_step) => {
            tracing::debug!(step, outcome = flow_step.outcome(), "OAuth step completed");
            record_flow_outcome(step, flow_step.outcome());
        }
        Err(e) => {
            tracing::warn!(step, error = %e, "OAuth step rejected");
            record_flow_outcome(step, error_label(e));
        }
    }

    result.map_err(AppError::from)
}

fn error_label(err: &ServiceError) -> &'static str {
    match err {
        ServiceError::InvalidState => "invalid_state",
        ServiceError::ForbiddenRedirect => "forbidden_redirect",
        ServiceError::UnknownProvider(_) | ServiceError::NotFound => "not_found",
        ServiceError::Conflict(_) => "conflict",
        _ => "error",
    }
}
