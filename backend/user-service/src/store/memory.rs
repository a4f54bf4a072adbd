//! In-process driver.
//!
//! Enforces the same constraints as the Postgres schema: unique e-mail
//! (case-insensitive), unique `(provider, subject)` identity, unique session
//! fingerprint.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use crypto_core::TokenFingerprint;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use super::{SessionStore, StoreError, UserStore};
use crate::models::{
    FindUser, NewLocalUser, NewSession, OAuthIdentity, Provider, Role, Session, UpdateUser, User,
    UserStatus,
};

struct IdentityRow {
    user_id: i64,
    provider: Provider,
    subject: Option<String>,
    password_hash: Option<String>,
}

#[derive(Default)]
struct Tables {
    next_user_id: i64,
    next_session_id: i64,
    users: BTreeMap<i64, User>,
    identities: Vec<IdentityRow>,
    sessions: HashMap<TokenFingerprint, Session>,
}

impl Tables {
    fn email_taken(&self, email: &str, except: Option<i64>) -> bool {
        self.users
            .values()
            .any(|u| Some(u.id) != except && u.email.eq_ignore_ascii_case(email))
    }

    fn insert_user(&mut self, email: &str, email_locked: bool, role: Role, status: UserStatus) -> i64 {
        self.next_user_id += 1;
        let id = self.next_user_id;
        let now = Utc::now();
        self.users.insert(
            id,
            User {
                id,
                email: email.to_string(),
                email_locked,
                role,
                status,
                password_hash: None,
                full_name: None,
                telephone: None,
                avatar_url: None,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    /// User joined with its local credential, as the SQL driver returns it.
    fn load(&self, id: i64) -> Result<User, StoreError> {
        let mut user = self.users.get(&id).cloned().ok_or(StoreError::NotFound)?;
        user.password_hash = self
            .identities
            .iter()
            .find(|i| i.user_id == id && i.provider == Provider::Local)
            .and_then(|i| i.password_hash.clone());
        Ok(user)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(&self, new: NewSession) -> Result<Session, StoreError> {
        let mut tables = self.tables();
        if tables.sessions.contains_key(&new.token_hash) {
            return Err(StoreError::Duplicate);
        }
        tables.next_session_id += 1;
        let session = Session {
            id: tables.next_session_id,
            user_id: new.user_id,
            token_hash: new.token_hash,
            created_at: new.created_at,
            expires_at: new.expires_at,
            revoked_at: None,
        };
        tables.sessions.insert(new.token_hash, session.clone());
        Ok(session)
    }

    async fn find_session(
        &self,
        token_hash: &TokenFingerprint,
    ) -> Result<Option<Session>, StoreError> {
        Ok(self.tables().sessions.get(token_hash).cloned())
    }

    async fn revoke_session(
        &self,
        token_hash: &TokenFingerprint,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        match self.tables().sessions.get_mut(token_hash) {
            Some(session) if session.revoked_at.is_none() => {
                session.revoked_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_local_user(&self, new: NewLocalUser) -> Result<User, StoreError> {
        let mut tables = self.tables();
        if tables.email_taken(&new.email, None) {
            return Err(StoreError::Duplicate);
        }
        let id = tables.insert_user(&new.email, false, new.role, new.status);
        tables.identities.push(IdentityRow {
            user_id: id,
            provider: Provider::Local,
            subject: None,
            password_hash: Some(new.password_hash),
        });
        tables.load(id)
    }

    async fn upsert_oauth_user(&self, identity: OAuthIdentity) -> Result<User, StoreError> {
        let mut tables = self.tables();

        let linked = tables.identities.iter().find(|i| {
            i.provider == identity.provider && i.subject.as_deref() == Some(&identity.subject)
        });
        if let Some(row) = linked {
            return tables.load(row.user_id);
        }

        let existing = tables
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(&identity.email))
            .map(|u| u.id);
        let user_id = match existing {
            Some(id) => id,
            None => tables.insert_user(&identity.email, true, Role::User, UserStatus::Active),
        };

        tables.identities.push(IdentityRow {
            user_id,
            provider: identity.provider,
            subject: Some(identity.subject),
            password_hash: None,
        });
        tables.load(user_id)
    }

    async fn update_user(&self, update: UpdateUser) -> Result<User, StoreError> {
        let mut tables = self.tables();
        let locked = tables
            .users
            .get(&update.id)
            .map(|u| u.email_locked)
            .ok_or(StoreError::NotFound)?;

        if let Some(email) = &update.email {
            if locked {
                return Err(StoreError::EmailLocked);
            }
            if tables.email_taken(email, Some(update.id)) {
                return Err(StoreError::Duplicate);
            }
        }

        let user = tables.users.get_mut(&update.id).ok_or(StoreError::NotFound)?;
        if let Some(email) = update.email {
            user.email = email;
        }
        if let Some(role) = update.role {
            user.role = role;
        }
        if let Some(status) = update.status {
            user.status = status;
        }
        if let Some(full_name) = update.full_name {
            user.full_name = Some(full_name);
        }
        if let Some(telephone) = update.telephone {
            user.telephone = Some(telephone);
        }
        if let Some(avatar_url) = update.avatar_url {
            user.avatar_url = Some(avatar_url);
        }
        user.updated_at = Utc::now().max(user.updated_at + Duration::microseconds(1));

        tables.load(update.id)
    }

    async fn list_users(&self, find: FindUser) -> Result<Vec<User>, StoreError> {
        let tables = self.tables();
        let mut users = tables
            .users
            .values()
            .filter(|u| find.id.map_or(true, |id| u.id == id))
            .filter(|u| {
                find.email
                    .as_deref()
                    .map_or(true, |email| u.email.eq_ignore_ascii_case(email))
            })
            .filter(|u| find.role.map_or(true, |role| u.role == role))
            .filter(|u| {
                find.provider.map_or(true, |provider| {
                    tables
                        .identities
                        .iter()
                        .any(|i| i.user_id == u.id && i.provider == provider)
                })
            })
            .map(|u| tables.load(u.id))
            .collect::<Result<Vec<_>, _>>()?;

        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        if let Some(limit) = find.limit {
            users.truncate(limit.max(0) as usize);
        }
        Ok(users)
    }

    async fn delete_user(&self, id: i64) -> Result<bool, StoreError> {
        let mut tables = self.tables();
        if tables.users.remove(&id).is_none() {
            return Ok(false);
        }
        tables.identities.retain(|i| i.user_id != id);
        tables.sessions.retain(|_, s| s.user_id != id);
        Ok(true)
    }
}
