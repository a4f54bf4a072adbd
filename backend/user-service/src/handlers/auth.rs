use actix_middleware::ApiRequest;
use actix_web::{web, HttpResponse};
use error_types::{ErrorKind, ServiceError};
use serde::Deserialize;

use crate::app_state::AppState;
use crate::models::{FindUser, NewLocalUser, Role, Session, UserStatus};
use crate::security::cookies::{clear_session_cookie, session_cookie};
use crate::security::password::burn_verification;
use crate::security::{hash_password, verify_password};
use crate::validators::{validate_password, validate_username};

pub const INVALID_CREDENTIALS: &str = "invalid username or password";

/// Body of signup and login.
#[derive(Debug, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// POST /auth/signup
pub async fn signup(state: AppState, req: ApiRequest) -> Result<HttpResponse, ServiceError> {
    let body: Credentials = req.json()?;
    let email = validate_username(&body.username).map_err(ServiceError::invalid_argument)?;
    validate_password(&body.password).map_err(ServiceError::invalid_argument)?;

    let password = body.password;
    let password_hash = web::block(move || hash_password(&password))
        .await
        .map_err(|e| ServiceError::system(e.to_string()))?
        .map_err(ServiceError::system)?;

    let user = state
        .users
        .create_local_user(NewLocalUser {
            email,
            password_hash,
            role: Role::User,
            status: UserStatus::Active,
        })
        .await?;

    let issued = state.sessions.create_session(user.id).await?;

    Ok(HttpResponse::Created()
        .cookie(session_cookie(
            issued.token.expose(),
            issued.session.expires_at,
            req.is_tls(),
        ))
        .json(&user))
}

/// POST /auth/login
///
/// Unknown users, users without a local password, disabled users and wrong
/// passwords all get the same answer. A dummy verification runs when there
/// is no hash to check so response times do not reveal which case it was.
pub async fn login(state: AppState, req: ApiRequest) -> Result<HttpResponse, ServiceError> {
    let body: Credentials = req.json()?;
    let email = validate_username(&body.username)
        .map_err(|_| ServiceError::unauthorized(INVALID_CREDENTIALS))?;

    let user = match state.users.get_user(FindUser::by_email(email)).await {
        Ok(user) => Some(user),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => return Err(e),
    };

    let password = body.password;
    let hash = user.as_ref().and_then(|u| u.password_hash.clone());
    let verified = web::block(move || match hash {
        Some(hash) => verify_password(&password, &hash).is_ok(),
        None => {
            burn_verification(&password);
            false
        }
    })
    .await
    .map_err(|e| ServiceError::system(e.to_string()))?;

    let user = match user {
        Some(user) if verified && user.status == UserStatus::Active => user,
        _ => {
            tracing::info!("login rejected");
            return Err(ServiceError::unauthorized(INVALID_CREDENTIALS));
        }
    };

    let issued = state.sessions.create_session(user.id).await?;
    tracing::info!(user_id = user.id, "user logged in");

    Ok(HttpResponse::Ok()
        .cookie(session_cookie(
            issued.token.expose(),
            issued.session.expires_at,
            req.is_tls(),
        ))
        .json(&user))
}

/// GET /auth/logout
///
/// The cookie is always cleared. A failed durable revoke is logged and the
/// session is still dead in this process.
pub async fn logout(state: AppState, req: ApiRequest) -> Result<HttpResponse, ServiceError> {
    let session = req.identity::<Session>()?;

    if let Err(e) = state.sessions.revoke_session(&session).await {
        tracing::error!(
            user_id = session.user_id,
            session_id = session.id,
            error = %e,
            "failed to revoke session durably"
        );
    }

    Ok(HttpResponse::NoContent()
        .cookie(clear_session_cookie(req.is_tls()))
        .finish())
}
