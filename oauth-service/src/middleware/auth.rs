use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;

use crate::models::Tenant;
use crate::services::UserClaims;
use crate::AppState;

/// The user behind a valid auth cookie.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserClaims);

impl CurrentUser {
    /// Auth cookies are host-scoped, but a token minted for one tenant is
    /// never honoured on another.
    pub fn belongs_to(&self, tenant: &Tenant) -> bool {
        self.0.tenant_id == tenant.tenant_id
    }
}

/// Decodes the auth cookie when present. Invalid or expired cookies are
/// ignored: the request simply proceeds anonymously.
pub async fn auth_user_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    if let Some(claims) = jar
        .get(state.cookies.cookie_name())
        .and_then(|c| state.cookies.authenticate(c.value()))
    {
        req.extensions_mut().insert(CurrentUser(claims));
    }

    next.run(req).await
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Not signed in")))
    }
}
