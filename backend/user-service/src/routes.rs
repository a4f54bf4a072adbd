//! Route table of the user service.

use actix_middleware::{
    ApiRequest, ApiRouter, JwtAuthMiddleware, Recovery, Route, VersionConfigError,
    VersionMiddleware,
};
use actix_web::web;
use std::future::Future;

use crate::app_state::AppState;
use crate::handlers::{auth, health, oauth, users};
use crate::security::session_auth;

/// Bind a state-taking handler into a plain API handler.
fn with_state<F, Fut>(state: &AppState, handler: F) -> impl Fn(ApiRequest) -> Fut + 'static
where
    F: Fn(AppState, ApiRequest) -> Fut + 'static,
    Fut: Future + 'static,
{
    let state = state.clone();
    move |req| handler(state.clone(), req)
}

/// Versioned API routes. Recovery runs outermost, then version negotiation,
/// then the per-route auth wrapper.
pub fn api_router(state: &AppState) -> Result<ApiRouter, VersionConfigError> {
    let api = &state.config.api;
    let version = VersionMiddleware::new(
        &state.config.app.server_version,
        &api.default_version,
        &api.min_version,
    )?;
    let session = session_auth(state.sessions.clone());
    let bearer = JwtAuthMiddleware::bearer(state.jwt.clone());

    Ok(ApiRouter::new()
        .middleware(Recovery::new())
        .middleware(version)
        .routes([
            Route::post("/auth/signup", with_state(state, auth::signup)),
            Route::post("/auth/login", with_state(state, auth::login)),
            Route::get("/auth/logout", with_state(state, auth::logout)).wrap(&session),
            Route::get("/auth/whoami", with_state(state, users::whoami)).wrap(&bearer),
            Route::get("/oauth2/login", with_state(state, oauth::login)),
            Route::get("/oauth2/callback", with_state(state, oauth::callback)),
            Route::get("/user/me", with_state(state, users::current_user)).wrap(&session),
            Route::patch("/user", with_state(state, users::update_user)).wrap(&session),
        ]))
}

/// Mount the health probe and the API routes. The version settings are
/// checked at startup, so a failure here only logs.
pub fn configure(state: AppState) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::new(state.clone()))
            .route("/health", web::get().to(health::health_check));

        match api_router(&state) {
            Ok(router) => router.configure(cfg),
            Err(e) => tracing::error!(error = %e, "API routes not mounted"),
        }
    }
}
