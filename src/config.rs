use chrono::Duration;
use serde::Deserialize;

use crate::errors::AuthError;

const SECRET_KEY_MIN_LENGTH: usize = 6;

/// Where the session token travels on the inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenLocation {
    Query,
    Cookie,
    Body,
}

impl TokenLocation {
    pub fn parse(s: &str) -> Result<Self, AuthError> {
        match s.to_lowercase().as_str() {
            "query" => Ok(TokenLocation::Query),
            "cookie" | "cookies" => Ok(TokenLocation::Cookie),
            "body" => Ok(TokenLocation::Body),
            other => Err(AuthError::Configuration(format!(
                "invalid token location '{}': expected query, cookie or body",
                other
            ))),
        }
    }
}

/// Signing algorithms accepted for the session token.
///
/// The configuration carries a single shared-secret string, so only the
/// HMAC family is representable; asymmetric algorithms are rejected at parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum SigningAlgorithm {
    HS256,
    HS384,
    HS512,
}

impl SigningAlgorithm {
    pub fn parse(s: &str) -> Result<Self, AuthError> {
        match s.to_uppercase().as_str() {
            "HS256" => Ok(SigningAlgorithm::HS256),
            "HS384" => Ok(SigningAlgorithm::HS384),
            "HS512" => Ok(SigningAlgorithm::HS512),
            // Recognized but unsupported: these need key-pair material, and
            // the configuration carries a single shared-secret string.
            alg @ ("RS256" | "RS384" | "RS512" | "ES256" | "ES384" | "ES512") => {
                Err(AuthError::Configuration(format!(
                    "algorithm '{}' is recognized but unsupported: asymmetric signing \
                     requires key-pair material, but the configuration carries a shared \
                     secret; use HS256, HS384 or HS512",
                    alg
                )))
            }
            other => Err(AuthError::Configuration(format!(
                "invalid signing algorithm '{}': expected HS256, HS384 or HS512",
                other
            ))),
        }
    }

    pub(crate) fn as_jwt(self) -> jsonwebtoken::Algorithm {
        match self {
            SigningAlgorithm::HS256 => jsonwebtoken::Algorithm::HS256,
            SigningAlgorithm::HS384 => jsonwebtoken::Algorithm::HS384,
            SigningAlgorithm::HS512 => jsonwebtoken::Algorithm::HS512,
        }
    }
}

impl Default for SigningAlgorithm {
    fn default() -> Self {
        SigningAlgorithm::HS256
    }
}

/// Immutable configuration for one authentication instance.
///
/// Built once, validated at construction. Multiple independently configured
/// instances can coexist in one process; nothing here is global.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Shared secret backing token signatures. At least 6 characters.
    pub secret_key: String,
    pub algorithm: SigningAlgorithm,
    pub token_location: TokenLocation,
    /// Name of the token field at the configured location.
    pub token_field: String,
    /// How long a fresh or renewed token stays valid.
    pub expiration_window: Duration,
    /// A usable token seen within this much of its expiry gets extended.
    pub renewal_threshold: Duration,
    /// Connection string for the durable token store, when one is used.
    pub database_url: Option<String>,
}

impl AuthConfig {
    /// Config with the stock defaults: token in the query string under
    /// `token`, 10-minute expiration window, 5-minute renewal threshold.
    pub fn new(secret_key: impl Into<String>) -> Self {
        AuthConfig {
            secret_key: secret_key.into(),
            algorithm: SigningAlgorithm::default(),
            token_location: TokenLocation::Query,
            token_field: "token".to_string(),
            expiration_window: Duration::minutes(10),
            renewal_threshold: Duration::minutes(5),
            database_url: None,
        }
    }

    /// Fail-fast validation. Runs at instance construction, never at first
    /// request.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.secret_key.len() < SECRET_KEY_MIN_LENGTH {
            return Err(AuthError::Configuration(format!(
                "secret key must be at least {} characters",
                SECRET_KEY_MIN_LENGTH
            )));
        }
        if self.token_field.is_empty() {
            return Err(AuthError::Configuration(
                "token field name must not be empty".to_string(),
            ));
        }
        if self.expiration_window <= Duration::zero() {
            return Err(AuthError::Configuration(
                "expiration window must be positive".to_string(),
            ));
        }
        if self.renewal_threshold < Duration::zero() {
            return Err(AuthError::Configuration(
                "renewal threshold must not be negative".to_string(),
            ));
        }
        if self.renewal_threshold >= self.expiration_window {
            tracing::warn!(
                threshold_secs = self.renewal_threshold.num_seconds(),
                window_secs = self.expiration_window.num_seconds(),
                "renewal threshold is not below the expiration window; every request will renew"
            );
        }
        Ok(())
    }
}

/// Load configuration from `PASSGATE_*` environment variables (and `.env`).
pub fn load() -> Result<AuthConfig, AuthError> {
    dotenvy::dotenv().ok();

    let secret_key = std::env::var("PASSGATE_SECRET_KEY").map_err(|_| {
        AuthError::Configuration("PASSGATE_SECRET_KEY is not set".to_string())
    })?;

    let mut cfg = AuthConfig::new(secret_key);

    if let Ok(alg) = std::env::var("PASSGATE_ALGORITHM") {
        cfg.algorithm = SigningAlgorithm::parse(&alg)?;
    }
    if let Ok(loc) = std::env::var("PASSGATE_TOKEN_LOCATION") {
        cfg.token_location = TokenLocation::parse(&loc)?;
    }
    if let Ok(field) = std::env::var("PASSGATE_TOKEN_FIELD") {
        cfg.token_field = field;
    }
    if let Ok(mins) = std::env::var("PASSGATE_EXPIRATION_MINUTES") {
        let mins: i64 = mins.parse().map_err(|_| {
            AuthError::Configuration("PASSGATE_EXPIRATION_MINUTES must be a number".to_string())
        })?;
        cfg.expiration_window = Duration::minutes(mins);
    }
    if let Ok(mins) = std::env::var("PASSGATE_RENEWAL_THRESHOLD_MINUTES") {
        let mins: i64 = mins.parse().map_err(|_| {
            AuthError::Configuration(
                "PASSGATE_RENEWAL_THRESHOLD_MINUTES must be a number".to_string(),
            )
        })?;
        cfg.renewal_threshold = Duration::minutes(mins);
    }
    cfg.database_url = std::env::var("PASSGATE_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok();

    cfg.validate()?;
    Ok(cfg)
}
