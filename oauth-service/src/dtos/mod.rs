pub mod oauth;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "Access forbidden")]
    pub error: String,
    #[schema(example = "Invalid OAuth state")]
    pub details: Option<String>,
}
