//! # Identity Resolution
//!
//! One live lookup against the identity service's internal endpoint per
//! authenticated request. The result is normalized into the gateway's
//! failure taxonomy; transport detail never escapes this module except into
//! the logs.

use std::time::Duration;

use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::core::error::{GatewayError, GatewayResult};
use crate::core::types::{Identity, HEADER_INTERNAL_SECRET};

/// Resolves a verified subject id to a live identity
///
/// Holds the process-wide HTTP client, so concurrent resolutions share a
/// connection pool and one slow lookup cannot stall unrelated requests.
pub struct IdentityResolver {
    client: reqwest::Client,
    base_url: String,
    internal_secret: String,
    timeout: Duration,
}

impl IdentityResolver {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        internal_secret: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            internal_secret: internal_secret.into(),
            timeout,
        }
    }

    /// Fetch the identity for `subject_id`, fresh, with no retries
    ///
    /// Outcome mapping:
    /// - 404 → `UserNotFound`
    /// - any other non-2xx, transport failure, timeout, or unparseable body
    ///   → `IdentityServiceUnavailable`
    /// - 2xx with `isActive=false` → `AccountDisabled`
    /// - 2xx with `isActive=true` → the identity
    pub async fn resolve(&self, subject_id: &str) -> GatewayResult<Identity> {
        let url = format!("{}/internal/users/{}", self.base_url, subject_id);

        let response = self
            .client
            .get(&url)
            .header(HEADER_INTERNAL_SECRET, &self.internal_secret)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                warn!(subject_id, error = %e, "identity service request failed");
                GatewayError::IdentityServiceUnavailable
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(subject_id, "identity service reported unknown user");
            return Err(GatewayError::UserNotFound);
        }
        if !status.is_success() {
            warn!(subject_id, status = %status, "identity service returned an error status");
            return Err(GatewayError::IdentityServiceUnavailable);
        }

        let identity: Identity = response.json().await.map_err(|e| {
            warn!(subject_id, error = %e, "identity service response was unparseable");
            GatewayError::IdentityServiceUnavailable
        })?;

        if !identity.is_active {
            debug!(subject_id, "identity is disabled");
            return Err(GatewayError::AccountDisabled);
        }

        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const INTERNAL_SECRET: &str = "test-internal-secret";

    fn resolver_for(server: &MockServer) -> IdentityResolver {
        IdentityResolver::new(
            reqwest::Client::new(),
            server.uri(),
            INTERNAL_SECRET,
            Duration::from_secs(2),
        )
    }

    #[tokio::test]
    async fn test_resolve_active_user() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/internal/users/user-1"))
            .and(header(HEADER_INTERNAL_SECRET, INTERNAL_SECRET))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "user-1",
                "email": "user-1@example.com",
                "name": "Ada",
                "role": "editor",
                "isActive": true,
            })))
            .mount(&server)
            .await;

        let identity = resolver_for(&server).resolve("user-1").await.unwrap();
        assert_eq!(identity.id, "user-1");
        assert_eq!(identity.role, "editor");
        assert!(identity.is_active);
    }

    #[tokio::test]
    async fn test_resolve_unknown_user_is_user_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/internal/users/ghost"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = resolver_for(&server).resolve("ghost").await;
        assert_eq!(result, Err(GatewayError::UserNotFound));
    }

    #[tokio::test]
    async fn test_resolve_disabled_account() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/internal/users/user-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "user-2",
                "email": null,
                "name": null,
                "role": "user",
                "isActive": false,
            })))
            .mount(&server)
            .await;

        let result = resolver_for(&server).resolve("user-2").await;
        assert_eq!(result, Err(GatewayError::AccountDisabled));
    }

    #[tokio::test]
    async fn test_resolve_5xx_is_service_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/internal/users/user-3"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = resolver_for(&server).resolve("user-3").await;
        assert_eq!(result, Err(GatewayError::IdentityServiceUnavailable));
    }

    #[tokio::test]
    async fn test_resolve_unparseable_body_is_service_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/internal/users/user-4"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let result = resolver_for(&server).resolve("user-4").await;
        assert_eq!(result, Err(GatewayError::IdentityServiceUnavailable));
    }

    #[tokio::test]
    async fn test_resolve_connection_refused_is_service_unavailable() {
        // Bind then drop a listener so the port is free but nothing answers.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let resolver = IdentityResolver::new(
            reqwest::Client::new(),
            format!("http://{addr}"),
            INTERNAL_SECRET,
            Duration::from_millis(500),
        );

        let result = resolver.resolve("user-5").await;
        assert_eq!(result, Err(GatewayError::IdentityServiceUnavailable));
    }
}
