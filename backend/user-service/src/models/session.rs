/// Session model
use chrono::{DateTime, Utc};
use crypto_core::{SessionToken, TokenFingerprint};

/// Server-side record of a login. Only the token fingerprint is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: i64,
    pub user_id: i64,
    pub token_hash: TokenFingerprint,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Active until revoked or until `expires_at` (exclusive).
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked() && !self.is_expired_at(now)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Copy of this record marked revoked at `at`. An earlier revocation wins.
    pub fn revoked(&self, at: DateTime<Utc>) -> Session {
        Session {
            revoked_at: Some(self.revoked_at.unwrap_or(at)),
            ..self.clone()
        }
    }
}

/// Row to insert for a fresh session.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: i64,
    pub token_hash: TokenFingerprint,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A newly created session together with the raw token handed to the client.
#[derive(Debug)]
pub struct IssuedSession {
    pub token: SessionToken,
    pub session: Session,
}
