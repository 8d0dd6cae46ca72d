//! In-process token store for tests and single-process embedding.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{StoreError, TokenStore};
use crate::models::token::TokenRecord;

#[derive(Default)]
pub struct MemoryTokenStore {
    records: DashMap<String, TokenRecord>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a record, bypassing the store trait. Test-support only.
    pub fn get(&self, token: &str) -> Option<TokenRecord> {
        self.records.get(token).map(|r| r.clone())
    }

    /// Overwrite a record verbatim, bypassing the monotonic merge.
    /// Test-support only (e.g. back-dating `expire_at` to simulate the
    /// passage of time).
    pub fn put(&self, record: TokenRecord) {
        self.records.insert(record.token.clone(), record);
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn find_by_token(&self, token: &str) -> Result<Option<TokenRecord>, StoreError> {
        Ok(self.records.get(token).map(|r| r.clone()))
    }

    async fn find_by_user_key(&self, user_key: &str) -> Result<Vec<TokenRecord>, StoreError> {
        let mut records: Vec<TokenRecord> = self
            .records
            .iter()
            .filter(|r| r.user_key == user_key)
            .map(|r| r.clone())
            .collect();
        records.sort_by_key(|r| r.issued_at);
        Ok(records)
    }

    async fn insert(&self, record: &TokenRecord) -> Result<(), StoreError> {
        if self.records.contains_key(&record.token) {
            return Err(StoreError::DuplicateToken);
        }
        self.records.insert(record.token.clone(), record.clone());
        Ok(())
    }

    async fn update(&self, record: &TokenRecord) -> Result<(), StoreError> {
        if let Some(mut stored) = self.records.get_mut(&record.token) {
            stored.expire_at = stored.expire_at.max(record.expire_at);
            stored.is_revoked = stored.is_revoked || record.is_revoked;
        }
        Ok(())
    }
}
