//! Durable token records and their per-request projection.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::AuthError;

/// The durable unit of a session.
///
/// Created only by [`TokenLifecycle::issue`](crate::lifecycle::TokenLifecycle::issue);
/// mutated only by sliding renewal (extending `expire_at`) and revocation
/// (setting `is_revoked`). Records are never physically deleted here —
/// retention is a storage-policy concern.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TokenRecord {
    /// Opaque signed identifier, globally unique, immutable.
    pub token: String,
    /// Owning principal. Not unique: a principal may hold several tokens.
    pub user_key: String,
    /// Granted roles for this session. Non-empty, immutable after issuance.
    #[serde(deserialize_with = "string_or_list")]
    pub roles: Vec<String>,
    /// Application-defined payload captured at issuance.
    pub info: serde_json::Value,
    pub issued_at: DateTime<Utc>,
    /// Monotonically non-decreasing over the record's life.
    pub expire_at: DateTime<Utc>,
    /// Monotonic: false → true only.
    pub is_revoked: bool,
}

impl TokenRecord {
    pub(crate) fn new(
        token: String,
        user_key: String,
        roles: Vec<String>,
        info: serde_json::Value,
        expiration_window: Duration,
    ) -> Self {
        let issued_at = Utc::now();
        TokenRecord {
            token,
            user_key,
            roles,
            info,
            issued_at,
            expire_at: issued_at + expiration_window,
            is_revoked: false,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expire_at
    }

    /// A record authenticates a request iff it is neither revoked nor expired.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked && !self.is_expired(now)
    }
}

/// Legacy documents were inconsistent about `roles`: sometimes a single
/// string, sometimes a list. Normalize to a list once, at the serde boundary.
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        One(String),
        Many(Vec<String>),
    }

    Ok(match StringOrList::deserialize(deserializer)? {
        StringOrList::One(role) => vec![role],
        StringOrList::Many(roles) => roles,
    })
}

/// Per-request projection of a validated session.
///
/// Attached to the request's extensions by the authentication gate and
/// discarded with the request. Never persisted.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub token: String,
    pub user_key: String,
    pub roles: Vec<String>,
    pub info: serde_json::Value,
    pub expire_at: DateTime<Utc>,
}

impl From<&TokenRecord> for AuthContext {
    fn from(record: &TokenRecord) -> Self {
        AuthContext {
            token: record.token.clone(),
            user_key: record.user_key.clone(),
            roles: record.roles.clone(),
            info: record.info.clone(),
            expire_at: record.expire_at,
        }
    }
}

/// Extractor: handlers that require an authenticated principal take
/// `AuthContext` directly and get a 401 when the request is anonymous.
#[async_trait::async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AuthError::Authentication)
    }
}
