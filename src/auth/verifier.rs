//! # Credential Verification
//!
//! Bearer-token extraction and signature/expiry verification. This is the
//! pure half of authentication: no network access, no side effects,
//! deterministic given the token, the shared secret, and the clock.

use axum::http::{header, HeaderMap};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use tracing::debug;

use crate::core::error::{GatewayError, GatewayResult};
use crate::core::types::TokenClaims;

/// Extract the bearer token from an `Authorization` header
///
/// The header must be `Bearer <token>`; any other shape (absent header,
/// different scheme, empty token, non-UTF8 value) yields `None` rather than
/// an error. The value is split on spaces and only the second part is taken.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;

    let mut parts = value.split(' ');
    match (parts.next(), parts.next()) {
        (Some("Bearer"), Some(token)) if !token.is_empty() => Some(token),
        _ => None,
    }
}

/// Verifies access-token signatures and expiry against the shared secret
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    /// Create a verifier for HS256 tokens signed with `secret`
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify a token and return its claims
    ///
    /// Signature mismatch, malformed encoding, and elapsed expiry all
    /// collapse into `InvalidToken`; the specific reason is only logged.
    pub fn verify(&self, token: &str) -> GatewayResult<TokenClaims> {
        match jsonwebtoken::decode::<TokenClaims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => Ok(data.claims),
            Err(e) => {
                debug!(reason = %e, "token verification failed");
                Err(GatewayError::InvalidToken)
            }
        }
    }
}
