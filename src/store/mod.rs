//! Durable token record storage.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::token::TokenRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The record's token collides with an existing one. The lifecycle
    /// manager retries issuance with a fresh token; callers never see this
    /// as a user-facing error.
    #[error("duplicate token")]
    DuplicateToken,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Abstract record store the lifecycle manager runs against.
///
/// `update` must merge monotonically: the stored `expire_at` becomes the
/// maximum of stored and given, and `is_revoked` the OR of stored and given.
/// That keeps `expire_at` non-decreasing and lets a revoke that races a
/// renewal win regardless of write order.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn find_by_token(&self, token: &str) -> Result<Option<TokenRecord>, StoreError>;

    async fn find_by_user_key(&self, user_key: &str) -> Result<Vec<TokenRecord>, StoreError>;

    async fn insert(&self, record: &TokenRecord) -> Result<(), StoreError>;

    async fn update(&self, record: &TokenRecord) -> Result<(), StoreError>;
}
