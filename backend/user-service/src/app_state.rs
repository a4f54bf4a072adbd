//! Central application state
//!
//! Every handler reaches its dependencies through [`AppState`]. The state is
//! built once at startup and cloned into each worker.

use anyhow::Context;
use crypto_core::JwtCodec;
use sqlx::PgPool;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::{Config, Driver};
use crate::db;
use crate::services::oauth::{GoogleProvider, IdentityProvider};
use crate::services::UserDirectory;
use crate::session::{SessionCache, SessionManager};
use crate::store::{MemoryStore, PgStore, SessionStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<SessionManager>,
    pub users: Arc<UserDirectory>,
    pub jwt: Arc<JwtCodec>,
    /// `None` when OAuth2 is not configured.
    pub oauth: Option<Arc<dyn IdentityProvider>>,
    /// Set for the Postgres driver only.
    pub db: Option<PgPool>,
}

impl AppState {
    /// Connect the configured driver and wire the services on top of it.
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        match config.database.driver {
            Driver::Postgres => {
                let pool = db::create_pool(&config.database).await?;
                let store = Arc::new(PgStore::new(pool.clone()));
                Self::assemble(config, store.clone(), store, Some(pool), Arc::new(SystemClock))
            }
            Driver::Memory => {
                tracing::warn!("using the in-memory driver; data is lost on restart");
                Self::in_memory(config, Arc::new(SystemClock))
            }
        }
    }

    pub fn in_memory(config: Config, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        let store = Arc::new(MemoryStore::new());
        Self::assemble(config, store.clone(), store, None, clock)
    }

    pub fn assemble(
        config: Config,
        session_store: Arc<dyn SessionStore>,
        user_store: Arc<dyn UserStore>,
        db: Option<PgPool>,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let jwt = JwtCodec::from_secret(config.jwt.secret.as_bytes())
            .context("invalid SECRET_KEY")?;

        let sessions = SessionManager::new(session_store, Arc::new(SessionCache::new()), clock)
            .with_ttl(config.session.ttl())
            .with_timeout(config.database.query_timeout());

        let oauth: Option<Arc<dyn IdentityProvider>> = if config.oauth2.is_configured() {
            let google = GoogleProvider::from_config(&config.oauth2)
                .context("failed to configure the Google provider")?;
            Some(Arc::new(google))
        } else {
            tracing::info!("OAuth2 is not configured; /oauth2 routes answer 501");
            None
        };

        Ok(Self {
            config: Arc::new(config),
            sessions: Arc::new(sessions),
            users: Arc::new(UserDirectory::new(user_store)),
            jwt: Arc::new(jwt),
            oauth,
            db,
        })
    }

    pub fn with_identity_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.oauth = Some(provider);
        self
    }
}
