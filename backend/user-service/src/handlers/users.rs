use actix_middleware::{ApiRequest, UserId};
use actix_web::HttpResponse;
use error_types::ServiceError;
use serde::Deserialize;

use crate::app_state::AppState;
use crate::models::{Session, UpdateUser};
use crate::validators::{
    validate_avatar_url, validate_full_name, validate_profile_email, validate_telephone,
    ValidationError,
};

/// Body of PATCH /user. Absent fields are left untouched.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub telephone: Option<String>,
    pub avatar_url: Option<String>,
}

impl UpdateProfileRequest {
    fn into_update(self, id: i64) -> Result<UpdateUser, ServiceError> {
        fn check<F>(value: Option<String>, validate: F) -> Result<Option<String>, ServiceError>
        where
            F: Fn(&str) -> Result<String, ValidationError>,
        {
            value
                .as_deref()
                .map(validate)
                .transpose()
                .map_err(ServiceError::invalid_argument)
        }

        Ok(UpdateUser {
            id,
            email: check(self.email, validate_profile_email)?,
            full_name: check(self.full_name, validate_full_name)?,
            telephone: check(self.telephone, validate_telephone)?,
            avatar_url: check(self.avatar_url, validate_avatar_url)?,
            ..UpdateUser::default()
        })
    }
}

/// GET /user/me
pub async fn current_user(state: AppState, req: ApiRequest) -> Result<HttpResponse, ServiceError> {
    let session = req.identity::<Session>()?;
    let user = state.users.get_user_by_id(session.user_id).await?;
    Ok(HttpResponse::Ok().json(&user))
}

/// PATCH /user
pub async fn update_user(state: AppState, req: ApiRequest) -> Result<HttpResponse, ServiceError> {
    let session = req.identity::<Session>()?;
    let body: UpdateProfileRequest = req.json()?;
    let update = body.into_update(session.user_id)?;

    let user = if update.is_empty() {
        state.users.get_user_by_id(session.user_id).await?
    } else {
        state.users.update_user(update).await?
    };
    tracing::debug!(user_id = user.id, "profile updated");

    Ok(HttpResponse::Ok().json(&user))
}

/// GET /auth/whoami
pub async fn whoami(state: AppState, req: ApiRequest) -> Result<HttpResponse, ServiceError> {
    let UserId(user_id) = req.identity::<UserId>()?;
    let user = state.users.get_user_by_id(user_id).await?;
    Ok(HttpResponse::Ok().json(&user))
}
