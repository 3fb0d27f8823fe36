//! # Upstream Proxy Adapter
//!
//! Streams a request to its upstream target and streams the response back.
//! The body passes through byte for byte in both directions; it is never
//! buffered, re-parsed, or re-serialized, so length and structure cannot
//! change in transit. Only hop-by-hop headers and `Host` are dropped;
//! `Host` is derived from the target URL instead.
//!
//! Connection failures and timeouts are normalized to a per-target gateway
//! error; one unreachable backend never affects requests routed elsewhere
//! and never takes the process down.

use axum::body::Body;
use axum::http::{HeaderMap, Method, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::config::UpstreamTarget;
use crate::core::error::{GatewayError, GatewayResult};

/// Headers that are connection-scoped and must not be forwarded either
/// direction. `host` and `content-length` are re-derived by the client from
/// the target URL and the streamed body.
const STRIPPED_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

/// Streams requests to upstream targets through the shared HTTP client
pub struct Forwarder {
    client: reqwest::Client,
    timeout: Duration,
}

impl Forwarder {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Forward a request to `target` and relay the upstream response
    ///
    /// The upstream's status and body are relayed verbatim, whatever they
    /// are; only a transport-level failure (unreachable, reset, timeout)
    /// becomes `UpstreamUnreachable` for this target.
    pub async fn forward(
        &self,
        target: &UpstreamTarget,
        method: &Method,
        path_and_query: &str,
        headers: &HeaderMap,
        body: Body,
    ) -> GatewayResult<Response<Body>> {
        let url = format!(
            "{}{}",
            target.base_url.as_str().trim_end_matches('/'),
            path_and_query
        );

        let outbound_method = reqwest::Method::from_bytes(method.as_str().as_bytes())
            .map_err(|e| GatewayError::internal(format!("invalid request method: {e}")))?;

        debug!(upstream = %target.name, %url, "forwarding request");

        let mut outbound_headers = reqwest::header::HeaderMap::new();
        for (name, value) in headers {
            if is_stripped_header(name.as_str()) {
                continue;
            }
            let (Ok(name), Ok(value)) = (
                reqwest::header::HeaderName::from_bytes(name.as_str().as_bytes()),
                reqwest::header::HeaderValue::from_bytes(value.as_bytes()),
            ) else {
                continue;
            };
            outbound_headers.append(name, value);
        }

        let upstream_response = self
            .client
            .request(outbound_method, &url)
            .headers(outbound_headers)
            .body(reqwest::Body::wrap_stream(body.into_data_stream()))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                warn!(upstream = %target.name, error = %e, "upstream request failed");
                GatewayError::upstream_unreachable(target.label.clone())
            })?;

        relay_response(upstream_response)
    }
}

/// Translate the upstream response into the gateway's response, streaming
/// the body through untouched
fn relay_response(upstream: reqwest::Response) -> GatewayResult<Response<Body>> {
    let status = StatusCode::from_u16(upstream.status().as_u16())
        .map_err(|e| GatewayError::internal(format!("invalid upstream status: {e}")))?;

    let mut response = Response::builder().status(status);
    if let Some(headers) = response.headers_mut() {
        for (name, value) in upstream.headers() {
            if is_stripped_header(name.as_str()) {
                continue;
            }
            let (Ok(name), Ok(value)) = (
                axum::http::HeaderName::from_bytes(name.as_str().as_bytes()),
                axum::http::HeaderValue::from_bytes(value.as_bytes()),
            ) else {
                continue;
            };
            headers.append(name, value);
        }
    }

    response
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|e| GatewayError::internal(format!("failed to build response: {e}")))
}

fn is_stripped_header(name: &str) -> bool {
    STRIPPED_HEADERS
        .iter()
        .any(|stripped| name.eq_ignore_ascii_case(stripped))
}
