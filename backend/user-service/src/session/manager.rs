//! Session lifecycle: issue, resolve, revoke.
//!
//! The manager is the only caller of the [`SessionStore`] port for session
//! data. Every durable call runs under a deadline, and the cache is written
//! only after the durable side succeeded.

use chrono::Duration;
use crypto_core::SessionToken;
use error_types::ServiceError;
use std::future::Future;
use std::sync::Arc;

use super::cache::SessionCache;
use crate::clock::Clock;
use crate::models::{IssuedSession, NewSession, Session};
use crate::store::{SessionStore, StoreError};

/// Message for every failed session lookup.
pub const SESSION_UNAUTHORIZED: &str = "session expired or not found";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no session for presented token")]
    UnknownToken,

    #[error("session {0} was revoked")]
    Revoked(i64),

    #[error("session {0} has expired")]
    Expired(i64),

    #[error("session store failure: {0}")]
    Store(#[from] StoreError),
}

impl SessionError {
    /// Caller presented a bad credential, as opposed to a server-side failure.
    pub fn is_unauthorized(&self) -> bool {
        !matches!(self, SessionError::Store(_))
    }
}

impl From<SessionError> for ServiceError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Store(e) => ServiceError::system(e),
            _ => ServiceError::unauthorized(SESSION_UNAUTHORIZED),
        }
    }
}

pub fn default_session_ttl() -> Duration {
    Duration::hours(24)
}

pub const DEFAULT_QUERY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    cache: Arc<SessionCache>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    timeout: std::time::Duration,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, cache: Arc<SessionCache>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            cache,
            clock,
            ttl: default_session_ttl(),
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cache(&self) -> &Arc<SessionCache> {
        &self.cache
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    async fn durable<T>(
        &self,
        op: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.timeout, op)
            .await
            .map_err(|_| StoreError::DeadlineExceeded)?
    }

    /// Persist a new session for `user_id` and return it with its raw token.
    pub async fn create_session(&self, user_id: i64) -> Result<IssuedSession, SessionError> {
        let token = SessionToken::generate();
        let fingerprint = token.fingerprint();
        let now = self.clock.now();

        let session = self
            .durable(self.store.create_session(NewSession {
                user_id,
                token_hash: fingerprint,
                created_at: now,
                expires_at: now + self.ttl,
            }))
            .await
            .map_err(|e| {
                tracing::error!(user_id, error = %e, "failed to persist session");
                SessionError::Store(e)
            })?;

        self.cache.put(fingerprint, session.clone());
        tracing::info!(
            user_id,
            session_id = session.id,
            expires_at = %session.expires_at,
            "session created"
        );

        Ok(IssuedSession { token, session })
    }

    /// Look up the session a raw client token refers to. Unknown, malformed,
    /// revoked and expired tokens all fail as unauthorized.
    pub async fn resolve_active_session(&self, raw_token: &str) -> Result<Session, SessionError> {
        let fingerprint = SessionToken::from_presented(raw_token).fingerprint();

        let session = match self.cache.get(&fingerprint) {
            Some(session) => session,
            None => {
                let found = self.durable(self.store.find_session(&fingerprint)).await?;
                match found {
                    Some(session) => self.cache.fill(fingerprint, session),
                    None => return Err(SessionError::UnknownToken),
                }
            }
        };

        let now = self.clock.now();
        if session.is_revoked() {
            return Err(SessionError::Revoked(session.id));
        }
        if session.is_expired_at(now) {
            self.cache.remove_expired(&fingerprint, now);
            return Err(SessionError::Expired(session.id));
        }
        Ok(session)
    }

    /// Revoke a session. `Ok(true)` when this call changed durable state,
    /// `Ok(false)` when the session was already revoked.
    ///
    /// The session is inactive in this process as soon as this is called, even
    /// if the durable update then fails.
    pub async fn revoke_session(&self, session: &Session) -> Result<bool, SessionError> {
        let now = self.clock.now();
        self.cache.revoke(session, now);

        let changed = self
            .durable(self.store.revoke_session(&session.token_hash, now))
            .await?;

        if changed {
            tracing::info!(
                user_id = session.user_id,
                session_id = session.id,
                "session revoked"
            );
        } else {
            tracing::debug!(
                user_id = session.user_id,
                session_id = session.id,
                "session already revoked"
            );
        }
        Ok(changed)
    }
}
