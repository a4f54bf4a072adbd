//! External identity providers for the authorization-code flow.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Provider;

pub mod google;
pub mod pkce;

pub use google::GoogleProvider;

/// Identity asserted by a provider after a successful code exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderIdentity {
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("exchange call failed: {0}")]
    TokenExchange(String),

    #[error("failed to fetch userinfo: {0}")]
    UserInfoFetch(String),

    #[error("provider returned no email")]
    MissingEmail,

    #[error("configuration error: {0}")]
    Config(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn provider(&self) -> Provider;

    /// URL to send the browser to, carrying `state` and an S256 challenge.
    fn authorization_url(&self, state: &str, code_challenge: &str) -> String;

    /// Exchange an authorization code for a verified identity.
    async fn exchange(&self, code: &str, verifier: &str) -> Result<ProviderIdentity, OAuthError>;
}
