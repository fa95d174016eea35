use service_core::error::AppError;
use thiserror::Error;

/// Failure kinds of the sign-in flow and its collaborators.
///
/// `ProfileFetchFailed`, `SessionMismatch` and `NotInvited` are turned into
/// redirects by the flow controller and never rendered as error pages.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Bad, expired or tampered state token. Deliberately carries no cause.
    #[error("Invalid OAuth state")]
    InvalidState,

    #[error("Redirect target is not allowed")]
    ForbiddenRedirect,

    #[error("Failed to fetch OAuth profile: {0}")]
    ProfileFetchFailed(String),

    #[error("User is not invited to this site")]
    NotInvited,

    #[error("OAuth identifier does not match the current session")]
    SessionMismatch,

    #[error("Not found")]
    NotFound,

    #[error("Unknown OAuth provider: {0}")]
    UnknownProvider(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store error: {0}")]
    Store(anyhow::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidState => AppError::Forbidden(anyhow::anyhow!("Invalid OAuth state")),
            ServiceError::ForbiddenRedirect => {
                AppError::Forbidden(anyhow::anyhow!("Redirect target is not allowed"))
            }
            ServiceError::ProfileFetchFailed(e) => AppError::BadGateway(e),
            ServiceError::NotInvited => AppError::Forbidden(anyhow::anyhow!("Not invited")),
            ServiceError::SessionMismatch => {
                AppError::Forbidden(anyhow::anyhow!("Session mismatch"))
            }
            ServiceError::NotFound => AppError::NotFound(anyhow::anyhow!("Not found")),
            ServiceError::UnknownProvider(name) => {
                AppError::NotFound(anyhow::anyhow!("Unknown OAuth provider: {}", name))
            }
            ServiceError::Conflict(e) => AppError::Conflict(anyhow::anyhow!(e)),
            ServiceError::Store(e) => AppError::StoreError(e),
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}
