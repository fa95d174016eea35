//! Services layer for oauth-service.
//!
//! State token codec, redirect guard, providers, stores, user resolution,
//! cookie issuing and the flow controller that ties them together.

pub mod cookies;
pub mod error;
pub mod flow;
mod jwt;
pub mod metrics;
pub mod providers;
pub mod redirect;
pub mod resolver;
pub mod store;

pub use cookies::{AuthCookieIssuer, JwtCookieIssuer};
pub use error::ServiceError;
pub use flow::{FinalizeRequest, FlowStep, InitiateRequest, OAuthFlow};
pub use jwt::{JwtService, OAuthClaims, StateClaims, UserClaims};
pub use providers::{
    GenericOAuthProvider, MockProfileFetcher, OAuthProvider, ProfileFetcher, ProviderRegistry,
};
pub use redirect::RedirectGuard;
pub use resolver::{Resolution, UserResolver};
pub use store::{InMemoryStore, OAuthConfigStore, TenantStore, UserStore};
