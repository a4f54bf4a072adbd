use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{IdentityProvider, OAuthError, ProviderIdentity};
use crate::config::OAuth2Config;
use crate::models::Provider;

const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const USERINFO_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v3/userinfo";
const SCOPES: &str = "openid email profile";

#[derive(Clone)]
pub struct GoogleProvider {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    http_client: Client,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    #[serde(default)]
    email: String,
    name: Option<String>,
}

impl GoogleProvider {
    pub fn from_config(config: &OAuth2Config) -> Result<Self, OAuthError> {
        let required = |value: &Option<String>, name: &str| {
            value
                .clone()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| OAuthError::Config(format!("{} not set", name)))
        };

        let http_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| OAuthError::Config(format!("http client: {}", e)))?;

        Ok(Self {
            client_id: required(&config.client_id, "OAUTH2_CLIENT_ID")?,
            client_secret: required(&config.client_secret, "OAUTH2_CLIENT_SECRET")?,
            redirect_uri: required(&config.redirect_url, "OAUTH2_REDIRECT_URL")?,
            http_client,
        })
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn provider(&self) -> Provider {
        Provider::Google
    }

    fn authorization_url(&self, state: &str, code_challenge: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=online&state={}&code_challenge={}&code_challenge_method=S256",
            AUTH_ENDPOINT,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(SCOPES),
            urlencoding::encode(state),
            urlencoding::encode(code_challenge),
        )
    }

    async fn exchange(&self, code: &str, verifier: &str) -> Result<ProviderIdentity, OAuthError> {
        let token = self
            .http_client
            .post(TOKEN_ENDPOINT)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("code_verifier", verifier),
                ("grant_type", "authorization_code"),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| OAuthError::TokenExchange(e.to_string()))?
            .json::<TokenResponse>()
            .await
            .map_err(|e| OAuthError::TokenExchange(format!("JSON parse error: {}", e)))?;

        let info = self
            .http_client
            .get(USERINFO_ENDPOINT)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| OAuthError::UserInfoFetch(e.to_string()))?
            .json::<UserInfo>()
            .await
            .map_err(|e| OAuthError::UserInfoFetch(format!("JSON parse error: {}", e)))?;

        if info.email.trim().is_empty() {
            return Err(OAuthError::MissingEmail);
        }

        Ok(ProviderIdentity {
            subject: info.sub,
            email: info.email,
            name: info.name,
        })
    }
}
