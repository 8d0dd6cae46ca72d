//! Authorization gate.
//!
//! `require_roles` guards a route (or subtree) with a set of role patterns.
//! An anonymous request gets 401; an authenticated principal whose granted
//! roles satisfy none of the resolved patterns gets 403.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::extract::{FromRequestParts, RawPathParams, Request};
use axum::middleware::Next;
use axum::response::Response;

use crate::errors::AuthError;
use crate::models::token::AuthContext;
use crate::roles::{self, RoleParams};

type BoxedResponseFuture = Pin<Box<dyn Future<Output = Result<Response, AuthError>> + Send>>;

/// Build a middleware function enforcing the given role patterns.
///
/// Patterns may be literals or templates bound against the matched route's
/// path parameters and the query string. Satisfying ANY pattern authorizes.
///
/// ```ignore
/// Router::new()
///     .route("/business/:business_id/staff", get(list_staff))
///     .route_layer(middleware::from_fn(authz::require_roles(&[
///         "admin",
///         "manager-at-{{:business_id}}",
///     ])))
/// ```
///
/// Layer ordering matters: the authentication gate must run before this one
/// so the `AuthContext` extension is present.
pub fn require_roles(
    patterns: &[&str],
) -> impl Fn(Request, Next) -> BoxedResponseFuture + Clone + Send + 'static {
    let patterns: Arc<Vec<String>> = Arc::new(patterns.iter().map(|s| s.to_string()).collect());

    move |req: Request, next: Next| {
        let patterns = Arc::clone(&patterns);
        Box::pin(async move { authorize(&patterns, req, next).await })
    }
}

async fn authorize(
    patterns: &[String],
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let Some(ctx) = req.extensions().get::<AuthContext>() else {
        return Err(AuthError::Authentication);
    };
    let granted = ctx.roles.clone();
    let user_key = ctx.user_key.clone();

    let (mut parts, body) = req.into_parts();
    let params = role_params(&mut parts).await;

    if !roles::is_authorized(&granted, patterns, &params) {
        tracing::debug!(
            user_key = %user_key,
            required = ?patterns,
            "authorization denied"
        );
        return Err(AuthError::Authorization);
    }

    Ok(next.run(Request::from_parts(parts, body)).await)
}

/// Capture the request-scoped parameters role templates can bind against.
async fn role_params(parts: &mut axum::http::request::Parts) -> RoleParams {
    // Routes without captures have no RawPathParams extension; that's fine.
    let path: HashMap<String, String> = RawPathParams::from_request_parts(parts, &())
        .await
        .map(|raw| {
            raw.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        })
        .unwrap_or_default();

    let query: HashMap<String, String> = parts
        .uri
        .query()
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default();

    RoleParams { path, query }
}
