//! passgate — token-based authentication and role authorization for axum
//! pipelines.
//!
//! The crate issues opaque signed session tokens, validates them on every
//! request against a durable [`TokenStore`](store::TokenStore), extends
//! sessions near expiry (sliding renewal) and answers role-based
//! authorization questions, including roles parameterized by the request's
//! path and query (`"manager-at-{{:business_id}}"`).
//!
//! ```ignore
//! use std::sync::Arc;
//! use axum::{middleware, routing::get, Router};
//! use passgate::config::AuthConfig;
//! use passgate::middleware::{authn, authz, AuthState};
//! use passgate::store::postgres::PgTokenStore;
//!
//! let store = Arc::new(PgTokenStore::connect(&db_url).await?);
//! let auth = AuthState::new(&AuthConfig::new("my-secret"), store)?;
//!
//! let app = Router::new()
//!     .route("/business/:business_id/staff", get(list_staff))
//!     .route_layer(middleware::from_fn(authz::require_roles(&[
//!         "admin",
//!         "manager-at-{{:business_id}}",
//!     ])))
//!     .layer(middleware::from_fn_with_state(auth.clone(), authn::authenticate));
//! ```
//!
//! Authentication strictly precedes authorization: layer the authentication
//! gate outermost. Handlers can also take
//! [`AuthContext`](models::token::AuthContext) as an extractor.

pub mod codec;
pub mod config;
pub mod errors;
pub mod lifecycle;
pub mod middleware;
pub mod models;
pub mod roles;
pub mod store;
