//! # Gateway Server Module
//!
//! The HTTP server and the request pipeline. Every request runs the same
//! sequence: route lookup → authentication (only when the matched rule
//! requires it) → path rewrite → streaming forward to the selected
//! upstream. Failures short-circuit into the uniform error responses.
//!
//! All state shared between concurrent requests is immutable configuration
//! assembled once here; each request's context lives and dies inside its
//! own pipeline execution.

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router as AxumRouter};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Instrument};
use uuid::Uuid;

use crate::auth::{apply_identity_headers, AuthEngine, IdentityResolver, TokenVerifier};
use crate::core::config::{GatewayConfig, Upstreams};
use crate::core::error::{GatewayError, GatewayResult};
use crate::proxy::Forwarder;
use crate::routing::RouteTable;

/// Shared server state: immutable after construction
#[derive(Clone)]
pub struct ServerState {
    route_table: Arc<RouteTable>,
    auth: Arc<AuthEngine>,
    forwarder: Arc<Forwarder>,
    upstreams: Arc<Upstreams>,
}

impl ServerState {
    /// Assemble all pipeline components from configuration
    ///
    /// One `reqwest` client backs both the identity resolver and the
    /// forwarder, so every outbound call shares the same connection pool.
    pub fn from_config(config: &GatewayConfig) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| GatewayError::internal(format!("failed to build HTTP client: {e}")))?;

        let identity_base_url = config
            .upstreams
            .get(crate::core::config::UPSTREAM_AUTH_SERVICE)
            .ok_or_else(|| GatewayError::config("auth-service upstream is not configured"))?
            .base_url
            .to_string();

        let resolver = IdentityResolver::new(
            client.clone(),
            identity_base_url,
            config.auth.internal_secret.clone(),
            config.timeouts.identity,
        );
        let auth = AuthEngine::new(TokenVerifier::new(&config.auth.jwt_secret), resolver);

        Ok(Self {
            route_table: Arc::new(RouteTable::new(&config.routes)?),
            auth: Arc::new(auth),
            forwarder: Arc::new(Forwarder::new(client, config.timeouts.upstream)),
            upstreams: Arc::new(config.upstreams.clone()),
        })
    }
}

/// Build the axum application for the given configuration
///
/// `GET /health` is answered by the gateway itself; everything else falls
/// through to the proxy pipeline.
pub fn build_app(config: &GatewayConfig) -> GatewayResult<AxumRouter> {
    let state = ServerState::from_config(config)?;

    let app = AxumRouter::new()
        .route("/health", get(health_check))
        .fallback(handle_request)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer(&config.server.cors_origins)),
        );

    Ok(app)
}

/// Health check endpoint, never proxied
async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Entry point for every proxied request
async fn handle_request(State(state): State<ServerState>, request: Request) -> Response {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!(
        "request",
        id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    match dispatch(state, request).instrument(span).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

/// The gateway pipeline for one request
async fn dispatch(state: ServerState, mut request: Request) -> GatewayResult<Response> {
    let rule = state
        .route_table
        .find(request.method(), request.uri().path());

    if rule.requires_auth {
        let identity = state.auth.authenticate(request.headers()).await?;
        apply_identity_headers(request.headers_mut(), &identity);
    }

    let target = state.upstreams.get(&rule.upstream).ok_or_else(|| {
        GatewayError::internal(format!(
            "route '{}' references unknown upstream '{}'",
            rule.pattern, rule.upstream
        ))
    })?;

    let path_and_query = {
        let rewritten = rule.rewritten_path(request.uri().path());
        match request.uri().query() {
            Some(query) => format!("{rewritten}?{query}"),
            None => rewritten.into_owned(),
        }
    };

    let (parts, body) = request.into_parts();
    state
        .forwarder
        .forward(target, &parts.method, &path_and_query, &parts.headers, body)
        .await
}

/// CORS layer from the configured origins; credentials are allowed, so the
/// origin list must stay explicit (no wildcard)
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::HEAD,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// The gateway server: the axum application plus its bind address
pub struct GatewayServer {
    bind_addr: SocketAddr,
    app: AxumRouter,
}

impl GatewayServer {
    /// Create a server from configuration (does not bind yet)
    pub fn new(config: &GatewayConfig) -> GatewayResult<Self> {
        Ok(Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], config.server.port)),
            app: build_app(config)?,
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    /// Bind and serve until a shutdown signal arrives
    pub async fn start(self) -> GatewayResult<()> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        info!("gateway listening on {}", self.bind_addr);

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

/// Resolve when SIGTERM or SIGINT arrives
async fn shutdown_signal() {
    use tokio::signal;

    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .expect("failed to install SIGTERM handler");
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .expect("failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {
            info!("received SIGTERM, shutting down");
        }
        _ = sigint.recv() => {
            info!("received SIGINT, shutting down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{
        default_routes, AuthSettings, ServerSettings, TimeoutSettings, UpstreamTarget,
        UPSTREAM_AUTH_SERVICE, UPSTREAM_BACKEND, UPSTREAM_TG_PUBLISHER,
    };
    use axum::body::{to_bytes, Body};
    use axum::http::StatusCode;
    use tower::ServiceExt;
    use url::Url;

    fn test_config() -> GatewayConfig {
        GatewayConfig {
            server: ServerSettings {
                port: 0,
                cors_origins: vec!["http://localhost:5173".to_string()],
            },
            auth: AuthSettings {
                jwt_secret: "test-signing-secret".to_string(),
                internal_secret: "test-internal-secret".to_string(),
            },
            upstreams: Upstreams::new(vec![
                UpstreamTarget {
                    name: UPSTREAM_BACKEND.to_string(),
                    label: "Backend service".to_string(),
                    base_url: Url::parse("http://127.0.0.1:59990").unwrap(),
                },
                UpstreamTarget {
                    name: UPSTREAM_TG_PUBLISHER.to_string(),
                    label: "Telegram publisher service".to_string(),
                    base_url: Url::parse("http://127.0.0.1:59991").unwrap(),
                },
                UpstreamTarget {
                    name: UPSTREAM_AUTH_SERVICE.to_string(),
                    label: "Auth service".to_string(),
                    base_url: Url::parse("http://127.0.0.1:59992").unwrap(),
                },
            ]),
            timeouts: TimeoutSettings::default(),
            routes: default_routes(),
        }
    }

    #[tokio::test]
    async fn test_health_is_served_by_the_gateway() {
        let app = build_app(&test_config()).unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_missing_token_on_protected_route_is_401_json() {
        let app = build_app(&test_config()).unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/tg/channels")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["statusCode"], 401);
        assert_eq!(body["message"], "Missing authorization token");
        assert_eq!(body["error"], "Unauthorized");
    }
}
