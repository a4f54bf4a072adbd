//! Process-local session cache
//!
//! Keyed by token fingerprint, holding the record snapshot taken when it was
//! written. The cache never re-validates expiry; callers compare `expires_at`
//! against their clock on every hit.
//!
//! Revocation leaves a revoked snapshot (tombstone) in place instead of an
//! empty slot. Read-through repopulation only fills vacant slots, so a reader
//! holding a pre-revocation row cannot put an active record back.

use chrono::{DateTime, Utc};
use crypto_core::TokenFingerprint;
use dashmap::DashMap;

use crate::models::Session;

#[derive(Default)]
pub struct SessionCache {
    entries: DashMap<TokenFingerprint, Session>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, fingerprint: &TokenFingerprint) -> Option<Session> {
        self.entries.get(fingerprint).map(|entry| entry.value().clone())
    }

    /// Unconditional write, used right after a durable create.
    pub fn put(&self, fingerprint: TokenFingerprint, session: Session) {
        self.entries.insert(fingerprint, session);
    }

    /// Insert-if-vacant, used after a durable read. Returns whatever the slot
    /// holds afterwards, which may be a tombstone written in the meantime.
    pub fn fill(&self, fingerprint: TokenFingerprint, session: Session) -> Session {
        self.entries
            .entry(fingerprint)
            .or_insert(session)
            .value()
            .clone()
    }

    /// Replace the entry with a revoked snapshot of `session`.
    pub fn revoke(&self, session: &Session, at: DateTime<Utc>) {
        self.entries
            .entry(session.token_hash)
            .and_modify(|cached| *cached = cached.revoked(at))
            .or_insert_with(|| session.revoked(at));
    }

    pub fn remove(&self, fingerprint: &TokenFingerprint) -> Option<Session> {
        self.entries.remove(fingerprint).map(|(_, session)| session)
    }

    /// Drop the entry only if it is expired at `now`.
    pub fn remove_expired(&self, fingerprint: &TokenFingerprint, now: DateTime<Utc>) {
        self.entries
            .remove_if(fingerprint, |_, session| session.is_expired_at(now));
    }

    /// Drop every expired entry, tombstones included. Returns how many went.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, session| !session.is_expired_at(now));
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    fn session(token: &str, expires_at: DateTime<Utc>) -> Session {
        Session {
            id: 1,
            user_id: 42,
            token_hash: TokenFingerprint::of(token),
            created_at: expires_at - Duration::hours(24),
            expires_at,
            revoked_at: None,
        }
    }

    #[test]
    fn test_fill_does_not_overwrite_tombstone() {
        let cache = SessionCache::new();
        let now = Utc::now();
        let s = session("a", now + Duration::hours(1));

        cache.revoke(&s, now);
        let seen = cache.fill(s.token_hash, s.clone());
        assert!(seen.is_revoked());
        assert!(cache.get(&s.token_hash).unwrap().is_revoked());
    }

    #[test]
    fn test_revoke_overwrites_active_entry() {
        let cache = SessionCache::new();
        let now = Utc::now();
        let s = session("a", now + Duration::hours(1));

        cache.put(s.token_hash, s.clone());
        cache.revoke(&s, now);
        assert_eq!(cache.get(&s.token_hash).unwrap().revoked_at, Some(now));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_purge_and_conditional_removal() {
        let cache = SessionCache::new();
        let now = Utc::now();
        let live = session("live", now + Duration::minutes(5));
        let dead = session("dead", now);

        cache.put(live.token_hash, live.clone());
        cache.put(dead.token_hash, dead.clone());

        cache.remove_expired(&live.token_hash, now);
        assert!(cache.get(&live.token_hash).is_some());

        assert_eq!(cache.purge_expired(now), 1);
        assert!(cache.get(&dead.token_hash).is_none());

        assert_eq!(cache.remove(&live.token_hash), Some(live));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_writers_and_readers() {
        let cache = Arc::new(SessionCache::new());
        let expires_at = Utc::now() + Duration::hours(1);

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..500 {
                        let s = session(&format!("{}-{}", t, i), expires_at);
                        cache.put(s.token_hash, s.clone());
                        assert!(cache.get(&s.token_hash).is_some());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 8 * 500);
    }
}
