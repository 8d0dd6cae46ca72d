//! Request-pipeline entry points: the authentication and authorization gates.

pub mod authn;
pub mod authz;

use std::sync::Arc;

use crate::config::{AuthConfig, TokenLocation};
use crate::errors::AuthError;
use crate::lifecycle::TokenLifecycle;
use crate::models::token::AuthContext;
use crate::store::TokenStore;

/// Shared state behind the gates: one configured lifecycle manager plus the
/// token-extraction settings. Built once, cloned into the router via
/// `axum::middleware::from_fn_with_state`.
pub struct AuthState {
    lifecycle: Arc<TokenLifecycle>,
    location: TokenLocation,
    field: String,
}

impl AuthState {
    pub fn new(config: &AuthConfig, store: Arc<dyn TokenStore>) -> Result<Arc<Self>, AuthError> {
        let lifecycle = Arc::new(TokenLifecycle::new(config, store)?);
        Ok(Arc::new(AuthState {
            lifecycle,
            location: config.token_location,
            field: config.token_field.clone(),
        }))
    }

    pub fn lifecycle(&self) -> &Arc<TokenLifecycle> {
        &self.lifecycle
    }

    pub(crate) fn location(&self) -> TokenLocation {
        self.location
    }

    pub(crate) fn field(&self) -> &str {
        &self.field
    }

    /// Establish a session for an already-identified principal. Returns the
    /// opaque token the client presents on subsequent requests.
    pub async fn login(
        &self,
        user_key: &str,
        roles: Vec<String>,
        info: serde_json::Value,
        revoke_existing: bool,
    ) -> Result<String, AuthError> {
        let record = self
            .lifecycle
            .issue(user_key, roles, info, revoke_existing)
            .await?;
        Ok(record.token)
    }

    /// End the session behind `ctx`: revokes the current token, or all of
    /// the principal's tokens when `revoke_all` is set. The caller drops its
    /// `AuthContext` with the request.
    pub async fn logout(&self, ctx: &AuthContext, revoke_all: bool) -> Result<(), AuthError> {
        if revoke_all {
            self.lifecycle.revoke_all(&ctx.user_key).await
        } else {
            self.lifecycle.revoke(&ctx.token).await
        }
    }

    /// Administrative revocation of every session held by a principal.
    pub async fn revoke(&self, user_key: &str) -> Result<(), AuthError> {
        self.lifecycle.revoke_all(user_key).await
    }
}
