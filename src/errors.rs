use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

/// Non-standard "Authentication Timeout" status. Lets clients distinguish
/// "log in again" (session lapsed) from "never logged in" (401).
pub const STATUS_AUTHENTICATION_TIMEOUT: u16 = 419;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unauthorized")]
    Authentication,

    #[error("authentication timeout")]
    TokenExpired,

    #[error("forbidden")]
    Authorization,

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// Stable numeric status for this error kind, independent of transport.
    pub fn status(&self) -> u16 {
        match self {
            AuthError::Configuration(_) => 500,
            AuthError::Validation(_) => 400,
            AuthError::Authentication => 401,
            AuthError::TokenExpired => STATUS_AUTHENTICATION_TIMEOUT,
            AuthError::Authorization => 403,
            AuthError::Store(_) => 500,
            AuthError::Internal(_) => 500,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (error_type, code, msg) = match &self {
            AuthError::Configuration(e) => {
                tracing::error!("Configuration error: {}", e);
                (
                    "internal_error",
                    "configuration_error",
                    "internal server error".to_string(),
                )
            }
            AuthError::Validation(e) => ("invalid_request_error", "validation_error", e.clone()),
            AuthError::Authentication => (
                "authentication_error",
                "unauthorized",
                "you need authentication for the current request".to_string(),
            ),
            AuthError::TokenExpired => (
                "authentication_error",
                "token_expired",
                "token has been expired".to_string(),
            ),
            AuthError::Authorization => (
                "permission_error",
                "forbidden",
                "you are not allowed for the request".to_string(),
            ),
            AuthError::Store(e) => {
                tracing::error!("Store error: {}", e);
                (
                    "internal_error",
                    "store_error",
                    "internal server error".to_string(),
                )
            }
            AuthError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
        };

        let status =
            StatusCode::from_u16(self.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": code,
                "status": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}
