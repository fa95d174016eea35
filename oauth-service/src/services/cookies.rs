use axum_extra::extract::cookie::{Cookie, SameSite};
use std::sync::Arc;

use super::error::ServiceError;
use super::jwt::{JwtService, UserClaims};
use crate::config::CookieConfig;
use crate::models::User;

/// Issues and reads the authentication cookie.
pub trait AuthCookieIssuer: Send + Sync {
    fn cookie_name(&self) -> &str;

    fn issue(&self, user: &User) -> Result<Cookie<'static>, ServiceError>;

    /// Expired cookie with the same name and path.
    fn clear(&self) -> Cookie<'static>;

    /// Claims of a cookie value, `None` when it is invalid or expired.
    fn authenticate(&self, value: &str) -> Option<UserClaims>;
}

pub struct JwtCookieIssuer {
    jwt: Arc<JwtService>,
    config: CookieConfig,
}

impl JwtCookieIssuer {
    pub fn new(jwt: Arc<JwtService>, config: CookieConfig) -> Self {
        Self { jwt, config }
    }
}

impl AuthCookieIssuer for JwtCookieIssuer {
    fn cookie_name(&self) -> &str {
        &self.config.auth_cookie_name
    }

    fn issue(&self, user: &User) -> Result<Cookie<'static>, ServiceError> {
        let ttl = chrono::Duration::days(self.config.auth_cookie_expiry_days);
        let token = self.jwt.encode_user(user, ttl)?;

        Ok(Cookie::build((self.config.auth_cookie_name.clone(), token))
            .path("/")
            .http_only(true)
            .secure(self.config.secure)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::days(self.config.auth_cookie_expiry_days))
            .build())
    }

    fn clear(&self) -> Cookie<'static> {
        Cookie::build((self.config.auth_cookie_name.clone(), ""))
            .path("/")
            .http_only(true)
            .secure(self.config.secure)
            .max_age(time::Duration::ZERO)
            .build()
    }

    fn authenticate(&self, value: &str) -> Option<UserClaims> {
        self.jwt.decode_user(value)
    }
}
