//! The authoritative session-token state machine.
//!
//! Active → near-expiry (best-effort renewed) → expired; any non-terminal
//! state → revoked. Every check is a fresh store read — no in-process
//! caching of token state, so revocation is visible immediately.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;

use crate::codec::TokenCodec;
use crate::config::AuthConfig;
use crate::errors::AuthError;
use crate::models::token::TokenRecord;
use crate::store::{StoreError, TokenStore};

/// Token collisions are astronomically unlikely; if one does happen, retry
/// with a fresh token rather than surfacing it to the caller.
const MAX_ISSUE_ATTEMPTS: u32 = 3;

pub struct TokenLifecycle {
    codec: TokenCodec,
    store: Arc<dyn TokenStore>,
    expiration_window: chrono::Duration,
    renewal_threshold: chrono::Duration,
}

impl TokenLifecycle {
    pub fn new(config: &AuthConfig, store: Arc<dyn TokenStore>) -> Result<Self, AuthError> {
        let codec = TokenCodec::new(config)?;
        Ok(TokenLifecycle {
            codec,
            store,
            expiration_window: config.expiration_window,
            renewal_threshold: config.renewal_threshold,
        })
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Create and persist a new session record.
    ///
    /// With `revoke_existing`, all of the principal's prior tokens are
    /// revoked first (ordered two-phase; a revocation failure aborts
    /// issuance). The two phases are not transactional — a crash in between
    /// leaves prior tokens revoked and no new token, which errs on the safe
    /// side.
    pub async fn issue(
        &self,
        user_key: &str,
        roles: Vec<String>,
        info: serde_json::Value,
        revoke_existing: bool,
    ) -> Result<TokenRecord, AuthError> {
        if user_key.is_empty() {
            return Err(AuthError::Validation("user key must not be empty".into()));
        }
        if roles.is_empty() {
            return Err(AuthError::Validation(
                "at least one role is required".into(),
            ));
        }

        if revoke_existing {
            self.revoke_all(user_key).await?;
        }

        for attempt in 1..=MAX_ISSUE_ATTEMPTS {
            let token = self.codec.issue()?;
            let record = TokenRecord::new(
                token,
                user_key.to_string(),
                roles.clone(),
                info.clone(),
                self.expiration_window,
            );

            match self.store.insert(&record).await {
                Ok(()) => {
                    tracing::debug!(user_key = %user_key, "issued session token");
                    return Ok(record);
                }
                Err(StoreError::DuplicateToken) => {
                    tracing::warn!(
                        user_key = %user_key,
                        attempt,
                        "token collision on insert, retrying with a fresh token"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AuthError::Internal(anyhow::anyhow!(
            "could not allocate a unique token after {} attempts",
            MAX_ISSUE_ATTEMPTS
        )))
    }

    /// Fetch the record behind a presented token.
    ///
    /// A token the codec rejects never reaches the store; absence is `None`,
    /// not an error. Store failures propagate — an outage must not read as
    /// anonymous access.
    pub async fn lookup(&self, token: &str) -> Result<Option<TokenRecord>, AuthError> {
        if !self.codec.verify(token) {
            return Ok(None);
        }
        Ok(self.store.find_by_token(token).await?)
    }

    pub fn is_expired(&self, record: &TokenRecord) -> bool {
        record.is_expired(Utc::now())
    }

    pub fn needs_renewal(&self, record: &TokenRecord, now: DateTime<Utc>) -> bool {
        record.expire_at - now < self.renewal_threshold
    }

    /// Extend a record's expiry to `now + expiration_window` and persist.
    ///
    /// The target is computed from `now`, not by adding the window to the
    /// stored expiry, so repeated near-expiry requests cannot compound the
    /// extension. The store's monotonic merge guarantees the expiry never
    /// moves backwards.
    pub async fn renew(&self, record: &TokenRecord) -> Result<(), StoreError> {
        let mut extended = record.clone();
        extended.expire_at = record.expire_at.max(Utc::now() + self.expiration_window);
        self.store.update(&extended).await
    }

    /// Best-effort sliding renewal, off the request's critical path.
    /// Failures are logged and swallowed; the current request's outcome is
    /// already decided when this runs.
    pub fn spawn_renewal(self: &Arc<Self>, record: &TokenRecord) {
        let lifecycle = Arc::clone(self);
        let record = record.clone();
        tokio::spawn(async move {
            if let Err(e) = lifecycle.renew(&record).await {
                tracing::warn!(user_key = %record.user_key, "token renewal failed: {}", e);
            }
        });
    }

    /// Idempotently revoke the record matching `token`. No-op when no
    /// record matches or it is already revoked.
    pub async fn revoke(&self, token: &str) -> Result<(), AuthError> {
        let Some(mut record) = self.store.find_by_token(token).await? else {
            return Ok(());
        };
        if record.is_revoked {
            return Ok(());
        }
        record.is_revoked = true;
        self.store.update(&record).await?;
        tracing::debug!(user_key = %record.user_key, "revoked session token");
        Ok(())
    }

    /// Revoke every non-revoked record for `user_key`.
    ///
    /// Fan-out with first-failure propagation. The store has no multi-record
    /// transaction, so a failure can leave some records revoked and others
    /// not — the error reports that instead of hiding it.
    pub async fn revoke_all(&self, user_key: &str) -> Result<(), AuthError> {
        let records = self.store.find_by_user_key(user_key).await?;

        let revocations = records
            .into_iter()
            .filter(|r| !r.is_revoked)
            .map(|mut record| {
                record.is_revoked = true;
                let store = Arc::clone(&self.store);
                async move { store.update(&record).await }
            });

        try_join_all(revocations).await?;
        Ok(())
    }
}
