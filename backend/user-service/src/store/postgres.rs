use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crypto_core::TokenFingerprint;
use sqlx::postgres::PgPool;
use sqlx::{FromRow, Postgres, QueryBuilder};

use super::{SessionStore, StoreError, UserStore};
use crate::models::{
    FindUser, NewLocalUser, NewSession, OAuthIdentity, Role, Session, UpdateUser, User, UserStatus,
};

const USER_SELECT: &str = r#"
    SELECT
        u.id,
        u.email,
        u.email_locked,
        u.role,
        u.status,
        ai.password_hash,
        p.full_name,
        p.telephone,
        p.avatar_url,
        u.created_at,
        u.updated_at
    FROM users u
    JOIN user_profiles p ON p.user_id = u.id
    LEFT JOIN auth_identities ai ON ai.user_id = u.id AND ai.provider = 'local'
    WHERE 1 = 1"#;

#[derive(FromRow)]
struct UserRow {
    id: i64,
    email: String,
    email_locked: bool,
    role: String,
    status: String,
    password_hash: Option<String>,
    full_name: Option<String>,
    telephone: Option<String>,
    avatar_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            email: row.email,
            email_locked: row.email_locked,
            role: row
                .role
                .parse::<Role>()
                .map_err(|e| StoreError::Corrupt(e.to_string()))?,
            status: row
                .status
                .parse::<UserStatus>()
                .map_err(|e| StoreError::Corrupt(e.to_string()))?,
            password_hash: row.password_hash,
            full_name: row.full_name,
            telephone: row.telephone,
            avatar_url: row.avatar_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct SessionRow {
    id: i64,
    user_id: i64,
    token_hash: Vec<u8>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
}

impl TryFrom<SessionRow> for Session {
    type Error = StoreError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let token_hash = TokenFingerprint::from_slice(&row.token_hash).ok_or_else(|| {
            StoreError::Corrupt(format!(
                "session {} has a {}-byte token hash",
                row.id,
                row.token_hash.len()
            ))
        })?;
        Ok(Session {
            id: row.id,
            user_id: row.user_id,
            token_hash,
            created_at: row.created_at,
            expires_at: row.expires_at,
            revoked_at: row.revoked_at,
        })
    }
}

/// Postgres driver for users and sessions.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn create_session(&self, new: NewSession) -> Result<Session, StoreError> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO sessions (user_id, token_hash, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(new.user_id)
        .bind(new.token_hash.as_bytes().as_slice())
        .bind(new.created_at)
        .bind(new.expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(Session {
            id,
            user_id: new.user_id,
            token_hash: new.token_hash,
            created_at: new.created_at,
            expires_at: new.expires_at,
            revoked_at: None,
        })
    }

    async fn find_session(
        &self,
        token_hash: &TokenFingerprint,
    ) -> Result<Option<Session>, StoreError> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, token_hash, created_at, expires_at, revoked_at
            FROM sessions
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash.as_bytes().as_slice())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Session::try_from).transpose()
    }

    async fn revoke_session(
        &self,
        token_hash: &TokenFingerprint,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET revoked_at = $1
            WHERE token_hash = $2 AND revoked_at IS NULL
            "#,
        )
        .bind(at)
        .bind(token_hash.as_bytes().as_slice())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_local_user(&self, new: NewLocalUser) -> Result<User, StoreError> {
        let mut tx = self.pool.begin().await?;

        let (user_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO users (email, email_locked, status, role)
            VALUES ($1, FALSE, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&new.email)
        .bind(new.status.as_str())
        .bind(new.role.as_str())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO auth_identities (user_id, provider, password_hash) VALUES ($1, 'local', $2)",
        )
        .bind(user_id)
        .bind(&new.password_hash)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO user_profiles (user_id) VALUES ($1)")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.get_user(FindUser::by_id(user_id)).await
    }

    async fn upsert_oauth_user(&self, identity: OAuthIdentity) -> Result<User, StoreError> {
        let mut tx = self.pool.begin().await?;

        let linked: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT user_id
            FROM auth_identities
            WHERE provider = $1 AND provider_subject = $2
            FOR UPDATE
            "#,
        )
        .bind(identity.provider.as_str())
        .bind(&identity.subject)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some((user_id,)) = linked {
            tx.commit().await?;
            return self.get_user(FindUser::by_id(user_id)).await;
        }

        let existing: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM users WHERE LOWER(email) = LOWER($1) FOR UPDATE")
                .bind(&identity.email)
                .fetch_optional(&mut *tx)
                .await?;

        let user_id = match existing {
            Some((id,)) => id,
            None => {
                let (id,): (i64,) = sqlx::query_as(
                    r#"
                    INSERT INTO users (email, email_locked, status, role)
                    VALUES ($1, TRUE, $2, $3)
                    RETURNING id
                    "#,
                )
                .bind(&identity.email)
                .bind(UserStatus::Active.as_str())
                .bind(Role::User.as_str())
                .fetch_one(&mut *tx)
                .await?;

                sqlx::query("INSERT INTO user_profiles (user_id) VALUES ($1)")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                id
            }
        };

        sqlx::query(
            r#"
            INSERT INTO auth_identities (user_id, provider, provider_subject)
            VALUES ($1, $2, $3)
            ON CONFLICT (provider, provider_subject) DO UPDATE SET updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(identity.provider.as_str())
        .bind(&identity.subject)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get_user(FindUser::by_id(user_id)).await
    }

    async fn update_user(&self, update: UpdateUser) -> Result<User, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Row stays locked until commit so the email lock cannot change underneath us
        let locked: Option<(bool,)> =
            sqlx::query_as("SELECT email_locked FROM users WHERE id = $1 FOR UPDATE")
                .bind(update.id)
                .fetch_optional(&mut *tx)
                .await?;
        match locked {
            None => return Err(StoreError::NotFound),
            Some((true,)) if update.email.is_some() => return Err(StoreError::EmailLocked),
            Some(_) => {}
        }

        let mut profile = QueryBuilder::<Postgres>::new("UPDATE user_profiles SET updated_at = NOW()");
        if let Some(full_name) = &update.full_name {
            profile.push(", full_name = ").push_bind(full_name);
        }
        if let Some(telephone) = &update.telephone {
            profile.push(", telephone = ").push_bind(telephone);
        }
        if let Some(avatar_url) = &update.avatar_url {
            profile.push(", avatar_url = ").push_bind(avatar_url);
        }
        profile.push(" WHERE user_id = ").push_bind(update.id);
        profile.build().execute(&mut *tx).await?;

        // Strictly increasing per row, in commit order; cached copies compare on it
        let mut user = QueryBuilder::<Postgres>::new(
            "UPDATE users SET updated_at = GREATEST(clock_timestamp(), updated_at + INTERVAL '1 microsecond')",
        );
        if let Some(email) = &update.email {
            user.push(", email = ").push_bind(email);
        }
        if let Some(role) = update.role {
            user.push(", role = ").push_bind(role.as_str());
        }
        if let Some(status) = update.status {
            user.push(", status = ").push_bind(status.as_str());
        }
        user.push(" WHERE id = ").push_bind(update.id);
        let result = user.build().execute(&mut *tx).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        tx.commit().await?;

        self.get_user(FindUser::by_id(update.id)).await
    }

    async fn list_users(&self, find: FindUser) -> Result<Vec<User>, StoreError> {
        let mut query = QueryBuilder::<Postgres>::new(USER_SELECT);
        if let Some(id) = find.id {
            query.push(" AND u.id = ").push_bind(id);
        }
        if let Some(email) = find.email {
            query.push(" AND LOWER(u.email) = LOWER(").push_bind(email).push(")");
        }
        if let Some(role) = find.role {
            query.push(" AND u.role = ").push_bind(role.as_str());
        }
        if let Some(provider) = find.provider {
            query
                .push(" AND EXISTS (SELECT 1 FROM auth_identities x WHERE x.user_id = u.id AND x.provider = ")
                .push_bind(provider.as_str())
                .push(")");
        }
        query.push(" ORDER BY u.created_at DESC, u.id DESC");
        if let Some(limit) = find.limit {
            query.push(" LIMIT ").push_bind(limit);
        }

        let rows: Vec<UserRow> = query.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(User::try_from).collect()
    }

    async fn delete_user(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}
