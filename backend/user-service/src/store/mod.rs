//! Durable storage ports
//!
//! [`SessionStore`] and [`UserStore`] are the narrow interfaces the caching
//! layers talk to. [`postgres::PgStore`] is the production driver and
//! [`memory::MemoryStore`] keeps everything in process.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crypto_core::TokenFingerprint;
use error_types::ServiceError;

use crate::models::{FindUser, NewLocalUser, NewSession, OAuthIdentity, Session, UpdateUser, User};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("user already exists")]
    Duplicate,

    #[error("user not found")]
    NotFound,

    #[error("email update is not allowed")]
    EmailLocked,

    #[error("storage deadline exceeded")]
    DeadlineExceeded,

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
                return StoreError::Duplicate;
            }
        }
        if matches!(err, sqlx::Error::RowNotFound) {
            return StoreError::NotFound;
        }
        StoreError::Database(err)
    }
}

/// SQLSTATE for unique constraint violations.
pub const UNIQUE_VIOLATION: &str = "23505";

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate | StoreError::EmailLocked => ServiceError::conflict(err),
            StoreError::NotFound => ServiceError::not_found(err),
            StoreError::DeadlineExceeded => ServiceError::deadline_exceeded(err),
            StoreError::Corrupt(_) | StoreError::Database(_) => ServiceError::system(err),
        }
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    async fn create_session(&self, new: NewSession) -> Result<Session, StoreError>;

    /// Session with this fingerprint, revoked or expired ones included.
    async fn find_session(&self, token_hash: &TokenFingerprint)
        -> Result<Option<Session>, StoreError>;

    /// Mark the session revoked. `false` when it already was, or does not exist.
    async fn revoke_session(
        &self,
        token_hash: &TokenFingerprint,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    /// User row, local credential and profile stub, all or nothing.
    async fn create_local_user(&self, new: NewLocalUser) -> Result<User, StoreError>;

    /// Resolve a provider identity to a user, linking or creating as needed.
    async fn upsert_oauth_user(&self, identity: OAuthIdentity) -> Result<User, StoreError>;

    async fn update_user(&self, update: UpdateUser) -> Result<User, StoreError>;

    /// Newest first.
    async fn list_users(&self, find: FindUser) -> Result<Vec<User>, StoreError>;

    /// Exactly one match, otherwise [`StoreError::NotFound`].
    async fn get_user(&self, find: FindUser) -> Result<User, StoreError> {
        let mut users = self.list_users(find).await?;
        if users.len() != 1 {
            return Err(StoreError::NotFound);
        }
        users.pop().ok_or(StoreError::NotFound)
    }

    async fn delete_user(&self, id: i64) -> Result<bool, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use error_types::ErrorKind;

    #[test]
    fn test_store_errors_are_reclassified() {
        let cases = [
            (StoreError::Duplicate, ErrorKind::Conflict, "user already exists"),
            (StoreError::EmailLocked, ErrorKind::Conflict, "email update is not allowed"),
            (StoreError::NotFound, ErrorKind::NotFound, "user not found"),
            (StoreError::DeadlineExceeded, ErrorKind::DeadlineExceeded, "storage deadline exceeded"),
        ];
        for (err, kind, message) in cases {
            let service: ServiceError = err.into();
            assert_eq!(service.kind(), kind);
            assert_eq!(service.to_string(), message);
        }

        let service: ServiceError = StoreError::Database(sqlx::Error::PoolTimedOut).into();
        assert_eq!(service.status_code(), 500);
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        assert!(matches!(
            StoreError::from(sqlx::Error::RowNotFound),
            StoreError::NotFound
        ));
    }
}
