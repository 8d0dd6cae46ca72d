//! Authentication gate.
//!
//! Extracts the session token from its configured location, validates it
//! through the lifecycle manager and attaches an [`AuthContext`] for
//! downstream middleware and handlers. A missing, forged or unknown token is
//! NOT an error here — the request continues anonymous, and only the
//! authorization gate rejects anonymous access to protected actions.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{COOKIE, CONTENT_TYPE};
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;

use super::AuthState;
use crate::config::TokenLocation;
use crate::errors::AuthError;
use crate::models::token::AuthContext;

/// Requests with bodies larger than this are passed through without body
/// token extraction rather than buffered whole.
const BODY_EXTRACTION_LIMIT: usize = 1024 * 1024;

/// Per-request authentication middleware. Wire it with
/// `axum::middleware::from_fn_with_state(auth_state, authn::authenticate)`.
pub async fn authenticate(
    State(state): State<Arc<AuthState>>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let (token, mut req) = extract_token(&state, req).await;

    let Some(token) = token else {
        return Ok(next.run(req).await);
    };

    // Forged/unknown tokens fall through to anonymous; store failures do not.
    let Some(record) = state.lifecycle().lookup(&token).await? else {
        return Ok(next.run(req).await);
    };

    if record.is_revoked {
        return Err(AuthError::Authentication);
    }
    if state.lifecycle().is_expired(&record) {
        return Err(AuthError::TokenExpired);
    }

    if state.lifecycle().needs_renewal(&record, Utc::now()) {
        state.lifecycle().spawn_renewal(&record);
    }

    req.extensions_mut().insert(AuthContext::from(&record));
    Ok(next.run(req).await)
}

/// Pull the token out of the configured location. Body extraction buffers
/// the body and puts it back so downstream extractors still see it.
async fn extract_token(state: &AuthState, req: Request) -> (Option<String>, Request) {
    match state.location() {
        TokenLocation::Query => {
            let token = req
                .uri()
                .query()
                .and_then(|q| query_param(q, state.field()));
            (token, req)
        }
        TokenLocation::Cookie => {
            let token = req
                .headers()
                .get_all(COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .find_map(|header| cookie_value(header, state.field()));
            (token, req)
        }
        TokenLocation::Body => extract_from_body(state, req).await,
    }
}

fn query_param(query: &str, name: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

fn cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k.trim() == name).then(|| v.trim().to_string())
    })
}

async fn extract_from_body(state: &AuthState, req: Request) -> (Option<String>, Request) {
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let (parts, body) = req.into_parts();
    let bytes = match axum::body::to_bytes(body, BODY_EXTRACTION_LIMIT).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("could not buffer request body for token extraction: {}", e);
            return (None, Request::from_parts(parts, Body::empty()));
        }
    };

    let token = if content_type.contains("application/json") {
        serde_json::from_slice::<serde_json::Value>(&bytes)
            .ok()
            .and_then(|v| v.get(state.field()).and_then(|t| t.as_str().map(String::from)))
    } else if content_type.contains("application/x-www-form-urlencoded") {
        std::str::from_utf8(&bytes)
            .ok()
            .and_then(|form| query_param(form, state.field()))
    } else {
        None
    };

    (token, Request::from_parts(parts, Body::from(bytes)))
}
