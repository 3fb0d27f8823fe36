//! # Authentication Decision Engine
//!
//! Orchestrates credential verification and identity resolution, then stamps
//! the four trusted identity headers onto the request. Client-supplied
//! values under those names are always overwritten; forged identity never
//! crosses the gateway.

use axum::http::{HeaderMap, HeaderValue};
use tracing::debug;

use crate::auth::resolver::IdentityResolver;
use crate::auth::verifier::{extract_bearer_token, TokenVerifier};
use crate::core::error::{GatewayError, GatewayResult};
use crate::core::types::{
    Identity, HEADER_USER_EMAIL, HEADER_USER_ID, HEADER_USER_NAME, HEADER_USER_ROLE,
};

/// The authentication decision engine
pub struct AuthEngine {
    verifier: TokenVerifier,
    resolver: IdentityResolver,
}

impl AuthEngine {
    pub fn new(verifier: TokenVerifier, resolver: IdentityResolver) -> Self {
        Self { verifier, resolver }
    }

    /// Authenticate a request from its headers
    ///
    /// Extraction failure is `MissingCredential`; verification and
    /// resolution failures propagate as their own kinds. A token that never
    /// verifies never triggers an identity-service call.
    pub async fn authenticate(&self, headers: &HeaderMap) -> GatewayResult<Identity> {
        let token = extract_bearer_token(headers).ok_or(GatewayError::MissingCredential)?;
        let claims = self.verifier.verify(token)?;
        let identity = self.resolver.resolve(&claims.sub).await?;

        debug!(user_id = %identity.id, role = %identity.role, "authenticated user");
        Ok(identity)
    }
}

/// Overwrite the trusted identity headers with the resolved identity
///
/// Always inserts all four headers; absent email/name forward as empty
/// values so upstreams see a consistent header set. Values that cannot be
/// represented as header bytes degrade to empty rather than failing the
/// request.
pub fn apply_identity_headers(headers: &mut HeaderMap, identity: &Identity) {
    let value = |raw: &str| {
        HeaderValue::from_str(raw).unwrap_or_else(|_| HeaderValue::from_static(""))
    };

    headers.insert(HEADER_USER_ID, value(&identity.id));
    headers.insert(HEADER_USER_ROLE, value(&identity.role));
    headers.insert(HEADER_USER_EMAIL, value(identity.email.as_deref().unwrap_or("")));
    headers.insert(HEADER_USER_NAME, value(identity.name.as_deref().unwrap_or("")));
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;
    use chrono::Utc;
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::core::types::TokenClaims;

    const SECRET: &str = "test-signing-secret";

    fn make_token(sub: &str, expires_in_seconds: i64) -> String {
        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            sub: sub.to_string(),
            email: None,
            name: None,
            exp: now + expires_in_seconds,
            iat: now,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn engine_for(server: &MockServer) -> AuthEngine {
        AuthEngine::new(
            TokenVerifier::new(SECRET),
            IdentityResolver::new(
                reqwest::Client::new(),
                server.uri(),
                "test-internal-secret",
                Duration::from_secs(2),
            ),
        )
    }

    fn bearer_headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn test_authenticate_happy_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/internal/users/user-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "user-1",
                "email": "user-1@example.com",
                "name": "Ada",
                "role": "editor",
                "isActive": true,
            })))
            .mount(&server)
            .await;

        let engine = engine_for(&server);
        let identity = engine
            .authenticate(&bearer_headers(&make_token("user-1", 3600)))
            .await
            .unwrap();

        assert_eq!(identity.id, "user-1");
        assert_eq!(identity.role, "editor");
    }

    #[tokio::test]
    async fn test_missing_header_never_calls_identity_service() {
        let server = MockServer::start().await;

        let engine = engine_for(&server);
        let result = engine.authenticate(&HeaderMap::new()).await;

        assert_eq!(result, Err(GatewayError::MissingCredential));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bad_token_never_calls_identity_service() {
        let server = MockServer::start().await;

        let engine = engine_for(&server);
        let expired = engine
            .authenticate(&bearer_headers(&make_token("user-1", -3600)))
            .await;
        let garbage = engine.authenticate(&bearer_headers("garbage")).await;

        assert_eq!(expired, Err(GatewayError::InvalidToken));
        assert_eq!(garbage, Err(GatewayError::InvalidToken));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[test]
    fn test_identity_headers_overwrite_forged_values() {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_USER_ID, HeaderValue::from_static("forged-admin"));
        headers.insert(HEADER_USER_ROLE, HeaderValue::from_static("admin"));

        let identity = Identity {
            id: "user-1".to_string(),
            email: Some("user-1@example.com".to_string()),
            name: Some("Ada".to_string()),
            role: "editor".to_string(),
            is_active: true,
        };
        apply_identity_headers(&mut headers, &identity);

        assert_eq!(headers.get(HEADER_USER_ID).unwrap(), "user-1");
        assert_eq!(headers.get(HEADER_USER_ROLE).unwrap(), "editor");
        assert_eq!(headers.get(HEADER_USER_EMAIL).unwrap(), "user-1@example.com");
        assert_eq!(headers.get(HEADER_USER_NAME).unwrap(), "Ada");
        // insert replaces; only one value per header remains
        assert_eq!(headers.get_all(HEADER_USER_ID).iter().count(), 1);
    }

    #[test]
    fn test_absent_email_and_name_forward_as_empty() {
        let mut headers = HeaderMap::new();
        let identity = Identity {
            id: "user-2".to_string(),
            email: None,
            name: None,
            role: "user".to_string(),
            is_active: true,
        };
        apply_identity_headers(&mut headers, &identity);

        assert_eq!(headers.get(HEADER_USER_EMAIL).unwrap(), "");
        assert_eq!(headers.get(HEADER_USER_NAME).unwrap(), "");
    }
}
