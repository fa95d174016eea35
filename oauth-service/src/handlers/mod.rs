pub mod metrics;
pub mod oauth;
pub mod signout;
