use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::models::OAuthProfile;

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
pub struct SignInQuery {
    /// Where to land after sign-in; defaults to the site root.
    #[validate(length(max = 2048, message = "Redirect is too long"))]
    #[param(example = "http://avengers.test.fider.io/posts/1")]
    pub redirect: Option<String>,

    /// Draft post to resume after sign-in.
    #[validate(length(max = 128, message = "Draft code is too long"))]
    pub code: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct CallbackQuery {
    #[serde(default)]
    pub state: String,
    /// Absent when the user declined consent.
    pub code: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
pub struct TokenQuery {
    #[serde(default)]
    pub code: String,
    #[validate(length(max = 128, message = "Identifier is too long"))]
    #[serde(default)]
    pub identifier: String,
    #[validate(length(max = 2048, message = "Redirect is too long"))]
    #[serde(default)]
    #[param(example = "/posts/1")]
    pub redirect: String,
    #[validate(length(max = 128, message = "Draft code is too long"))]
    pub draft: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct EchoQuery {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub identifier: String,
}

/// Raw and parsed profile, used by administrators to check a provider's
/// JSON mapping.
#[derive(Debug, Serialize, ToSchema)]
pub struct EchoResponse {
    #[schema(example = "facebook")]
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub raw: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<OAuthProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "healthy")]
    pub status: String,
    #[schema(example = "oauth-service")]
    pub service: String,
    #[schema(example = "0.1.0")]
    pub version: String,
    #[schema(example = "dev")]
    pub environment: String,
}
