use actix_middleware::ApiRequest;
use actix_web::http::header;
use actix_web::HttpResponse;
use error_types::ServiceError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::app_state::AppState;
use crate::models::OAuthIdentity;
use crate::security::cookies::{
    clear_oauth_temp_cookie, oauth_temp_cookie, read_oauth_temp, session_cookie, OAuthTemp,
    OAUTH_TEMP_COOKIE,
};
use crate::services::oauth::pkce::{code_challenge, generate_code_verifier, generate_state};
use crate::services::oauth::IdentityProvider;

const AUTHENTICATION_FAILED: &str = "authentication failed";

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub auth_token: String,
}

fn provider(state: &AppState) -> Result<Arc<dyn IdentityProvider>, ServiceError> {
    state
        .oauth
        .clone()
        .ok_or_else(|| ServiceError::not_implemented("oauth2 is not configured"))
}

/// GET /oauth2/login
pub async fn login(state: AppState, _req: ApiRequest) -> Result<HttpResponse, ServiceError> {
    let provider = provider(&state)?;

    let temp = OAuthTemp {
        state: generate_state(),
        verifier: generate_code_verifier(),
    };
    let url = provider.authorization_url(&temp.state, &code_challenge(&temp.verifier));
    let cookie = oauth_temp_cookie(&temp).map_err(ServiceError::system)?;

    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, url))
        .cookie(cookie)
        .finish())
}

/// GET /oauth2/callback
pub async fn callback(state: AppState, req: ApiRequest) -> Result<HttpResponse, ServiceError> {
    let provider = provider(&state)?;

    let query: CallbackQuery = req.query()?;
    if query.code.is_empty() || query.state.is_empty() {
        return Err(ServiceError::invalid_argument("missing code/state"));
    }

    let cookie = req
        .cookie(OAUTH_TEMP_COOKIE)
        .ok_or_else(|| ServiceError::invalid_argument("missing oauth temp cookie"))?;
    let temp = read_oauth_temp(cookie.value()).map_err(ServiceError::invalid_argument)?;
    if temp.state != query.state {
        return Err(ServiceError::invalid_argument("oauth state mismatch"));
    }

    let identity = provider
        .exchange(&query.code, &temp.verifier)
        .await
        .map_err(|e| {
            tracing::warn!(provider = %provider.provider(), error = %e, "oauth exchange failed");
            ServiceError::unauthorized(AUTHENTICATION_FAILED)
        })?;

    let user = state
        .users
        .upsert_oauth_user(OAuthIdentity {
            provider: provider.provider(),
            subject: identity.subject,
            email: identity.email.trim().to_lowercase(),
        })
        .await?;

    let issued = state.sessions.create_session(user.id).await?;

    let name = identity
        .name
        .as_deref()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| user.display_name());
    let auth_token = state
        .jwt
        .issue(user.id, name, state.sessions.clock().now())
        .map_err(ServiceError::system)?;

    Ok(HttpResponse::Ok()
        .cookie(session_cookie(
            issued.token.expose(),
            issued.session.expires_at,
            req.is_tls(),
        ))
        .cookie(clear_oauth_temp_cookie())
        .json(LoginResponse { auth_token }))
}
