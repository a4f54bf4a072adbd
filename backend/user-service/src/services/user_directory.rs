//! Caching façade over the [`UserStore`] port.
//!
//! Every user the store returns is mirrored into a process-local map keyed
//! by id. Lookups by id are answered from the map first. A cached copy is only
//! ever replaced by one with an equal or later `updated_at`, so a writer or
//! reader that finishes late cannot put an older snapshot back.

use dashmap::DashMap;
use error_types::ServiceError;
use std::sync::Arc;

use crate::models::{FindUser, NewLocalUser, OAuthIdentity, UpdateUser, User};
use crate::store::UserStore;

pub struct UserDirectory {
    store: Arc<dyn UserStore>,
    cache: DashMap<i64, User>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self {
            store,
            cache: DashMap::new(),
        }
    }

    fn remember(&self, user: &User) {
        self.cache
            .entry(user.id)
            .and_modify(|cached| {
                if user.updated_at >= cached.updated_at {
                    *cached = user.clone();
                }
            })
            .or_insert_with(|| user.clone());
    }

    pub async fn create_local_user(&self, new: NewLocalUser) -> Result<User, ServiceError> {
        let user = self.store.create_local_user(new).await?;
        self.remember(&user);
        tracing::info!(user_id = user.id, "local user created");
        Ok(user)
    }

    pub async fn upsert_oauth_user(&self, identity: OAuthIdentity) -> Result<User, ServiceError> {
        let provider = identity.provider;
        let user = self.store.upsert_oauth_user(identity).await?;
        self.remember(&user);
        tracing::info!(user_id = user.id, provider = %provider, "oauth identity resolved");
        Ok(user)
    }

    pub async fn update_user(&self, update: UpdateUser) -> Result<User, ServiceError> {
        let user = self.store.update_user(update).await?;
        self.remember(&user);
        Ok(user)
    }

    pub async fn get_user(&self, find: FindUser) -> Result<User, ServiceError> {
        if let Some(id) = find.id {
            if let Some(user) = self.cache.get(&id) {
                return Ok(user.value().clone());
            }
        }
        let user = self.store.get_user(find).await?;
        self.remember(&user);
        Ok(user)
    }

    pub async fn get_user_by_id(&self, id: i64) -> Result<User, ServiceError> {
        self.get_user(FindUser::by_id(id)).await
    }

    pub async fn list_users(&self, find: FindUser) -> Result<Vec<User>, ServiceError> {
        let users = self.store.list_users(find).await?;
        for user in &users {
            self.remember(user);
        }
        Ok(users)
    }

    pub async fn delete_user(&self, id: i64) -> Result<bool, ServiceError> {
        self.cache.remove(&id);
        Ok(self.store.delete_user(id).await?)
    }

    pub fn cached(&self, id: i64) -> Option<User> {
        self.cache.get(&id).map(|user| user.value().clone())
    }
}
