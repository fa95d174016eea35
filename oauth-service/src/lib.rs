pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    request_id_middleware, security_headers::security_headers_middleware, REQUEST_ID_HEADER,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::config::OAuthServiceConfig;
use crate::dtos::oauth::HealthResponse;
use crate::services::{
    AuthCookieIssuer, JwtCookieIssuer, JwtService, OAuthConfigStore, OAuthFlow, ProfileFetcher,
    ProviderRegistry, TenantStore, UserResolver, UserStore,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::oauth::sign_in_by_oauth,
        handlers::oauth::oauth_callback,
        handlers::oauth::oauth_provider_callback,
        handlers::oauth::oauth_token,
        handlers::oauth::oauth_echo,
        handlers::oauth::list_providers,
        handlers::signout::sign_out,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::oauth::EchoResponse,
            dtos::oauth::HealthResponse,
            models::OAuthProfile,
            models::ProviderOption,
        )
    ),
    tags(
        (name = "OAuth", description = "OAuth sign-in flow"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

/// Persistence collaborators of the flow.
#[derive(Clone)]
pub struct Stores {
    pub tenants: Arc<dyn TenantStore>,
    pub users: Arc<dyn UserStore>,
    pub oauth_configs: Arc<dyn OAuthConfigStore>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<OAuthServiceConfig>,
    pub tenants: Arc<dyn TenantStore>,
    pub providers: Arc<ProviderRegistry>,
    pub cookies: Arc<dyn AuthCookieIssuer>,
    pub flow: Arc<OAuthFlow>,
}

impl AppState {
    /// Wires the flow controller from its collaborators.
    pub fn new(
        config: OAuthServiceConfig,
        stores: Stores,
        providers: Arc<ProviderRegistry>,
        profiles: Arc<dyn ProfileFetcher>,
    ) -> Self {
        let jwt = Arc::new(JwtService::new(&config.jwt));
        let cookies: Arc<dyn AuthCookieIssuer> =
            Arc::new(JwtCookieIssuer::new(jwt.clone(), config.cookies.clone()));
        let resolver = UserResolver::new(stores.users, stores.oauth_configs);

        let flow = Arc::new(OAuthFlow::new(
            jwt,
            providers.clone(),
            profiles,
            resolver,
            cookies.clone(),
            config.public.scheme.clone(),
        ));

        Self {
            config: Arc::new(config),
            tenants: stores.tenants,
            providers,
            cookies,
            flow,
        }
    }
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    // Routes served on tenant hosts: need the tenant, the browser session
    // and the signed-in user.
    let tenant_routes = Router::new()
        .route("/oauth/:provider", get(handlers::oauth::sign_in_by_oauth))
        .route("/oauth/:provider/token", get(handlers::oauth::oauth_token))
        .route("/oauth/:provider/echo", get(handlers::oauth::oauth_echo))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::auth_user_middleware,
        ))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::session_middleware,
        ))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::tenant_middleware,
        ));

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .route("/oauth/providers", get(handlers::oauth::list_providers))
        .route("/oauth/callback", get(handlers::oauth::oauth_callback))
        .route(
            "/oauth/:provider/callback",
            get(handlers::oauth::oauth_provider_callback),
        )
        .route("/signout", get(handlers::signout::sign_out))
        .merge(tenant_routes)
        .layer(from_fn(middleware::metrics_middleware))
        .layer(
            // Path only: query strings carry codes and state tokens.
            TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                let request_id = req
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|h| h.to_str().ok())
                    .unwrap_or("unknown");

                tracing::info_span!(
                    "http_request",
                    method = %req.method(),
                    path = %req.uri().path(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .with_state(state);

    Ok(app)
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "Observability"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: state.config.service_name.clone(),
        version: state.config.service_version.clone(),
        environment: format!("{:?}", state.config.environment).to_lowercase(),
    })
}
