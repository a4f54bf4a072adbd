use actix_middleware::{ApiRequest, AuthFailure, IdentityResolver, RequireIdentity};
use async_trait::async_trait;
use std::sync::Arc;

use super::cookies::SESSION_COOKIE;
use crate::models::Session;
use crate::session::SessionManager;

/// Resolves the `sid` cookie into the active [`Session`] it names.
pub struct SessionCookieResolver {
    sessions: Arc<SessionManager>,
}

impl SessionCookieResolver {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }
}

#[async_trait(?Send)]
impl IdentityResolver for SessionCookieResolver {
    type Identity = Session;

    fn credential(&self) -> &'static str {
        "session cookie"
    }

    async fn resolve(&self, req: &ApiRequest) -> Result<Session, AuthFailure> {
        let cookie = req
            .cookie(SESSION_COOKIE)
            .filter(|c| !c.value().is_empty())
            .ok_or(AuthFailure::Missing("session cookie"))?;

        match self.sessions.resolve_active_session(cookie.value()).await {
            Ok(session) => Ok(session),
            Err(e) if e.is_unauthorized() => Err(AuthFailure::rejected(e)),
            Err(e) => Err(AuthFailure::Unavailable(e.into())),
        }
    }
}

/// Route wrapper requiring an active session.
pub fn session_auth(sessions: Arc<SessionManager>) -> RequireIdentity<SessionCookieResolver> {
    RequireIdentity::new(SessionCookieResolver::new(sessions))
}
