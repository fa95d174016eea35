pub mod oauth;
pub mod tenant;
pub mod user;

pub use oauth::{OAuthConfig, OAuthProfile, ProviderOption};
pub use tenant::Tenant;
pub use user::{Role, User, UserProvider};
