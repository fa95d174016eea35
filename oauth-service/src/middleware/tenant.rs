//! Tenant resolution from the request host.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use crate::models::Tenant;
use crate::services::ServiceError;
use crate::AppState;

/// Resolves the tenant from the `Host` header and stores it in the request
/// extensions. Unknown hosts are 404.
pub async fn tenant_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let host = request_host(&req).ok_or(ServiceError::NotFound)?;

    let tenant = state
        .tenants
        .find_by_host(&host)
        .await?
        .ok_or_else(|| {
            tracing::debug!(host = %host, "No tenant for host");
            ServiceError::NotFound
        })?;

    req.extensions_mut().insert(tenant);
    Ok(next.run(req).await)
}

fn request_host(req: &Request) -> Option<String> {
    req.headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .or_else(|| req.uri().authority().map(|a| a.to_string()))
        .map(|h| h.trim().to_ascii_lowercase())
        .filter(|h| !h.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for Tenant
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Tenant>()
            .cloned()
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Tenant not found")))
    }
}
