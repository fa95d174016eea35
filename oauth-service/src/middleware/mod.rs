pub mod auth;
pub mod metrics;
pub mod session;
pub mod tenant;

pub use auth::{auth_user_middleware, CurrentUser};
pub use metrics::metrics_middleware;
pub use session::{session_middleware, SessionId};
pub use tenant::tenant_middleware;
