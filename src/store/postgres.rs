//! Postgres-backed token store.

use async_trait::async_trait;
use sqlx::PgPool;

use super::{StoreError, TokenStore};
use crate::models::token::TokenRecord;

#[derive(Clone)]
pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn find_by_token(&self, token: &str) -> Result<Option<TokenRecord>, StoreError> {
        let row = sqlx::query_as::<_, TokenRecord>(
            "SELECT token, user_key, roles, info, issued_at, expire_at, is_revoked
             FROM tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_by_user_key(&self, user_key: &str) -> Result<Vec<TokenRecord>, StoreError> {
        let rows = sqlx::query_as::<_, TokenRecord>(
            "SELECT token, user_key, roles, info, issued_at, expire_at, is_revoked
             FROM tokens WHERE user_key = $1 ORDER BY issued_at ASC",
        )
        .bind(user_key)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn insert(&self, record: &TokenRecord) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO tokens (token, user_key, roles, info, issued_at, expire_at, is_revoked)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&record.token)
        .bind(&record.user_key)
        .bind(&record.roles)
        .bind(&record.info)
        .bind(record.issued_at)
        .bind(record.expire_at)
        .bind(record.is_revoked)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e)
                if e.as_database_error()
                    .map(|d| d.is_unique_violation())
                    .unwrap_or(false) =>
            {
                Err(StoreError::DuplicateToken)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, record: &TokenRecord) -> Result<(), StoreError> {
        // Monotonic merge: expiry only ever grows, revocation is final.
        sqlx::query(
            "UPDATE tokens
             SET expire_at = GREATEST(expire_at, $2),
                 is_revoked = is_revoked OR $3
             WHERE token = $1",
        )
        .bind(&record.token)
        .bind(record.expire_at)
        .bind(record.is_revoked)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
