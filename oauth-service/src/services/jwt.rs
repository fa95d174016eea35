use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use super::error::ServiceError;
use crate::config::JwtConfig;
use crate::models::{OAuthProfile, User};

/// HS256 codec for every token the service hands to browsers: OAuth state,
/// sign-up profile and the auth cookie payload.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    state_token_expiry_minutes: i64,
    signup_token_expiry_minutes: i64,
}

/// Intent carried through the provider round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateClaims {
    pub provider: String,
    /// Absolute URL on the tenant host where the flow ends.
    pub redirect: String,
    /// Browser session that started the flow, empty for sign-up.
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft_code: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

impl StateClaims {
    pub fn new(
        provider: &str,
        redirect: &str,
        identifier: &str,
        draft_code: Option<String>,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            provider: provider.to_string(),
            redirect: redirect.to_string(),
            identifier: identifier.to_string(),
            draft_code: draft_code.filter(|c| !c.is_empty()),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        }
    }
}

/// Profile handed to the sign-up page before an account exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthClaims {
    pub provider: String,
    pub id: String,
    pub name: String,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

/// Payload of the auth cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaims {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            state_token_expiry_minutes: config.state_token_expiry_minutes,
            signup_token_expiry_minutes: config.signup_token_expiry_minutes,
        }
    }

    pub fn state_ttl(&self) -> Duration {
        Duration::minutes(self.state_token_expiry_minutes)
    }

    pub fn encode_state(&self, claims: &StateClaims) -> Result<String, ServiceError> {
        self.encode(claims)
    }

    /// Bad signature, malformed token and elapsed expiry all come back as
    /// the same `InvalidState`.
    pub fn decode_state(&self, token: &str) -> Result<StateClaims, ServiceError> {
        self.decode(token).map_err(|_| ServiceError::InvalidState)
    }

    pub fn encode_signup(
        &self,
        provider: &str,
        profile: &OAuthProfile,
    ) -> Result<String, ServiceError> {
        let now = Utc::now();
        let claims = OAuthClaims {
            provider: provider.to_string(),
            id: profile.id.clone(),
            name: profile.name.clone(),
            email: profile.email.clone(),
            exp: (now + Duration::minutes(self.signup_token_expiry_minutes)).timestamp(),
            iat: now.timestamp(),
        };
        self.encode(&claims)
    }

    pub fn decode_signup(&self, token: &str) -> Result<OAuthClaims, ServiceError> {
        self.decode(token).map_err(|_| ServiceError::InvalidState)
    }

    pub fn encode_user(&self, user: &User, ttl: Duration) -> Result<String, ServiceError> {
        let now = Utc::now();
        let claims = UserClaims {
            user_id: user.user_id,
            tenant_id: user.tenant_id,
            name: user.name.clone(),
            email: user.email.clone(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };
        self.encode(&claims)
    }

    pub fn decode_user(&self, token: &str) -> Option<UserClaims> {
        self.decode(token).ok()
    }

    fn encode<T: Serialize>(&self, claims: &T) -> Result<String, ServiceError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to sign token: {}", e)))
    }

    fn decode<T: DeserializeOwned>(&self, token: &str) -> Result<T, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;

        decode::<T>(token, &self.decoding_key, &validation).map(|data| data.claims)
    }
}
