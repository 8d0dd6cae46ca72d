//! Signed opaque session tokens.
//!
//! The token carries no semantic claims — the authoritative session state
//! lives in the [`TokenStore`](crate::store::TokenStore). The signature only
//! lets [`verify`](TokenCodec::verify) reject forged or tampered strings
//! cheaply, before any store lookup.

use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::errors::AuthError;

/// Two independent nonces make accidental collision across concurrent
/// issuers vanishingly unlikely.
#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    rn: String,
    rn2: String,
}

fn nonce() -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{}.{:032x}", nanos, rand::random::<u128>())
}

/// Stateless token factory/verifier bound to one secret + algorithm.
pub struct TokenCodec {
    header: Header,
    validation: Validation,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenCodec {
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        config.validate()?;

        let algorithm = config.algorithm.as_jwt();
        let mut validation = Validation::new(algorithm);
        // No exp claim in the token: expiry is tracked on the server-side
        // record, not inside the signed payload.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Ok(TokenCodec {
            header: Header::new(algorithm),
            validation,
            encoding: EncodingKey::from_secret(config.secret_key.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret_key.as_bytes()),
        })
    }

    /// Generate a fresh signed token, distinct from all prior tokens with
    /// overwhelming probability.
    pub fn issue(&self) -> Result<String, AuthError> {
        let claims = TokenClaims {
            rn: nonce(),
            rn2: nonce(),
        };
        jsonwebtoken::encode(&self.header, &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(anyhow::anyhow!("token signing failed: {}", e)))
    }

    /// True iff the token was produced by this codec under the current
    /// secret. Never errors: malformed, unsigned and mis-signed input all
    /// come back false.
    pub fn verify(&self, token: &str) -> bool {
        jsonwebtoken::decode::<TokenClaims>(token, &self.decoding, &self.validation).is_ok()
    }
}
