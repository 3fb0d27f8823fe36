//! # Configuration Module
//!
//! This module handles gateway configuration. Secrets, upstream base URLs,
//! the listening port, and CORS origins come from the environment and are
//! all resolved once at startup; a missing required value is a fatal startup
//! condition, never a per-request error.
//!
//! The route table is data, not code: it is loaded from a YAML file when
//! `GATEWAY_ROUTES_PATH` is set, so operators can change which prefixes
//! require authentication or which backend they land on without a rebuild.
//! Without the variable, a built-in default table is used.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::core::error::{GatewayError, GatewayResult};

/// Well-known upstream names referenced by route rules
pub const UPSTREAM_BACKEND: &str = "backend";
pub const UPSTREAM_TG_PUBLISHER: &str = "tg-publisher";
pub const UPSTREAM_AUTH_SERVICE: &str = "auth-service";

/// Main gateway configuration structure
///
/// Built once at startup and shared immutably (behind `Arc`) with every
/// component; nothing mutates it afterwards, so no locking is needed.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Server settings (port, CORS origins)
    pub server: ServerSettings,

    /// Authentication settings (secrets)
    pub auth: AuthSettings,

    /// The three configured upstream targets
    pub upstreams: Upstreams,

    /// Timeouts for the two suspension points (identity lookup, proxy call)
    pub timeouts: TimeoutSettings,

    /// Ordered route table definitions, first match wins
    pub routes: Vec<RouteDefinition>,
}

/// Server settings
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Listening port
    pub port: u16,

    /// Allowed CORS origins
    pub cors_origins: Vec<String>,
}

/// Authentication settings
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Shared secret for access-token signature verification
    pub jwt_secret: String,

    /// Service-to-service secret sent on identity lookups
    pub internal_secret: String,
}

/// Timeouts for outbound calls
#[derive(Debug, Clone, Copy)]
pub struct TimeoutSettings {
    /// Identity service lookup timeout
    pub identity: Duration,

    /// Upstream proxy call timeout
    pub upstream: Duration,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            identity: Duration::from_secs(5),
            upstream: Duration::from_secs(30),
        }
    }
}

/// One upstream target the gateway can forward to
#[derive(Debug, Clone)]
pub struct UpstreamTarget {
    /// Name route rules refer to (e.g. "backend")
    pub name: String,

    /// Human-readable label used in 502 messages (e.g. "Backend service")
    pub label: String,

    /// Base URL requests are forwarded to
    pub base_url: Url,
}

/// The set of configured upstreams, resolved by name
#[derive(Debug, Clone)]
pub struct Upstreams {
    targets: Vec<UpstreamTarget>,
}

impl Upstreams {
    pub fn new(targets: Vec<UpstreamTarget>) -> Self {
        Self { targets }
    }

    /// Look up an upstream by the name route rules use
    pub fn get(&self, name: &str) -> Option<&UpstreamTarget> {
        self.targets.iter().find(|t| t.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &UpstreamTarget> {
        self.targets.iter()
    }
}

/// Prefix substitution applied to the path before forwarding
///
/// `prefix` is replaced by `replacement` when the path starts with it, e.g.
/// `{prefix: "/tg", replacement: "/api"}` turns `/tg/channels` into
/// `/api/channels`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PathRewrite {
    pub prefix: String,
    pub replacement: String,
}

/// One entry of the ordered route table, as configured
///
/// Patterns are either an exact path (`/tags`) or a prefix glob (`/tg/*`,
/// which also matches `/tg` itself). An empty method list matches every
/// method. Rules are evaluated top to bottom; the first match wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDefinition {
    /// Path pattern (e.g. "/tg/*")
    pub pattern: String,

    /// HTTP methods this rule applies to; empty means all
    #[serde(default)]
    pub methods: Vec<String>,

    /// Whether requests matching this rule go through authentication
    #[serde(default)]
    pub requires_auth: bool,

    /// Name of the upstream target to forward to
    pub upstream: String,

    /// Optional path prefix substitution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewrite: Option<PathRewrite>,
}

impl GatewayConfig {
    /// Load the full configuration from the environment
    ///
    /// Collects every problem instead of stopping at the first, so a broken
    /// deployment shows all misconfigured values at once.
    pub fn from_env() -> GatewayResult<Self> {
        let mut errors = Vec::new();

        let jwt_secret = require_var("JWT_SECRET", &mut errors);
        let internal_secret = require_var("INTERNAL_SERVICE_SECRET", &mut errors);
        let backend_url = require_url("MEM_BACKEND_URL", &mut errors);
        let tg_publisher_url = require_url("TG_PUBLISHER_URL", &mut errors);
        let auth_service_url = require_url("MEZ_AUTH_URL", &mut errors);

        let port = match env::var("PORT") {
            Ok(raw) => match raw.parse::<u16>() {
                Ok(port) => port,
                Err(_) => {
                    errors.push(format!("PORT is not a valid port number: {raw}"));
                    0
                }
            },
            Err(_) => 3000,
        };

        let cors_origins = match env::var("CORS_ORIGIN") {
            Ok(raw) => raw
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
            Err(_) => vec!["http://localhost:5173".to_string()],
        };

        let timeouts = TimeoutSettings {
            identity: duration_var("GATEWAY_IDENTITY_TIMEOUT", Duration::from_secs(5), &mut errors),
            upstream: duration_var("GATEWAY_UPSTREAM_TIMEOUT", Duration::from_secs(30), &mut errors),
        };

        let routes = match env::var("GATEWAY_ROUTES_PATH") {
            Ok(path) => match load_routes_file(&path) {
                Ok(routes) => routes,
                Err(e) => {
                    errors.push(e.to_string());
                    Vec::new()
                }
            },
            Err(_) => default_routes(),
        };

        if !errors.is_empty() {
            return Err(GatewayError::config(errors.join("; ")));
        }

        // The collectors above pushed an error for every None, so these
        // unwraps cannot be reached with a non-empty error list.
        let config = Self {
            server: ServerSettings { port, cors_origins },
            auth: AuthSettings {
                jwt_secret: jwt_secret.unwrap_or_default(),
                internal_secret: internal_secret.unwrap_or_default(),
            },
            upstreams: Upstreams::new(vec![
                UpstreamTarget {
                    name: UPSTREAM_BACKEND.to_string(),
                    label: "Backend service".to_string(),
                    base_url: backend_url.unwrap_or_else(|| fallback_url()),
                },
                UpstreamTarget {
                    name: UPSTREAM_TG_PUBLISHER.to_string(),
                    label: "Telegram publisher service".to_string(),
                    base_url: tg_publisher_url.unwrap_or_else(|| fallback_url()),
                },
                UpstreamTarget {
                    name: UPSTREAM_AUTH_SERVICE.to_string(),
                    label: "Auth service".to_string(),
                    base_url: auth_service_url.unwrap_or_else(|| fallback_url()),
                },
            ]),
            timeouts,
            routes,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the assembled configuration
    ///
    /// Checks the route table references only known upstreams, patterns are
    /// well-formed, and a catch-all rule is present so route matching is
    /// total.
    pub fn validate(&self) -> GatewayResult<()> {
        let mut errors = Vec::new();

        if self.auth.jwt_secret.trim().is_empty() {
            errors.push("JWT_SECRET must not be empty".to_string());
        }
        if self.auth.internal_secret.trim().is_empty() {
            errors.push("INTERNAL_SERVICE_SECRET must not be empty".to_string());
        }

        if self.routes.is_empty() {
            errors.push("route table has no rules".to_string());
        }

        for (index, route) in self.routes.iter().enumerate() {
            if !route.pattern.starts_with('/') {
                errors.push(format!(
                    "route {} pattern '{}' must start with '/'",
                    index, route.pattern
                ));
            }

            if self.upstreams.get(&route.upstream).is_none() {
                errors.push(format!(
                    "route '{}' references unknown upstream '{}'",
                    route.pattern, route.upstream
                ));
            }

            for method in &route.methods {
                match method.to_uppercase().as_str() {
                    "GET" | "POST" | "PUT" | "DELETE" | "PATCH" | "HEAD" | "OPTIONS" => {}
                    other => errors.push(format!(
                        "route '{}' has invalid HTTP method: {}",
                        route.pattern, other
                    )),
                }
            }

            if let Some(rewrite) = &route.rewrite {
                if !rewrite.prefix.starts_with('/') {
                    errors.push(format!(
                        "route '{}' rewrite prefix '{}' must start with '/'",
                        route.pattern, rewrite.prefix
                    ));
                }
            }
        }

        let has_catch_all = self
            .routes
            .iter()
            .any(|route| route.pattern == "/*" && route.methods.is_empty());
        if !has_catch_all {
            errors.push("route table must end with a catch-all '/*' rule".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(GatewayError::config(errors.join("; ")))
        }
    }
}

/// The built-in route table, mirroring the deployed snapshot
///
/// Public read-only endpoints bypass authentication, `/tg/*` lands on the
/// messaging publisher with the `/tg` → `/api` rewrite, the identity
/// service's own endpoints pass through under `/auth/*`, and everything
/// else falls through to the backend.
pub fn default_routes() -> Vec<RouteDefinition> {
    vec![
        RouteDefinition {
            pattern: "/public/articles/*".to_string(),
            methods: vec!["GET".to_string()],
            requires_auth: false,
            upstream: UPSTREAM_BACKEND.to_string(),
            rewrite: None,
        },
        RouteDefinition {
            pattern: "/tags".to_string(),
            methods: vec!["GET".to_string()],
            requires_auth: false,
            upstream: UPSTREAM_BACKEND.to_string(),
            rewrite: None,
        },
        RouteDefinition {
            pattern: "/tags/by-slug/*".to_string(),
            methods: vec!["GET".to_string()],
            requires_auth: false,
            upstream: UPSTREAM_BACKEND.to_string(),
            rewrite: None,
        },
        RouteDefinition {
            pattern: "/auth/*".to_string(),
            methods: vec![],
            requires_auth: false,
            upstream: UPSTREAM_AUTH_SERVICE.to_string(),
            rewrite: None,
        },
        RouteDefinition {
            pattern: "/tg/*".to_string(),
            methods: vec![],
            requires_auth: true,
            upstream: UPSTREAM_TG_PUBLISHER.to_string(),
            rewrite: Some(PathRewrite {
                prefix: "/tg".to_string(),
                replacement: "/api".to_string(),
            }),
        },
        RouteDefinition {
            pattern: "/users/*".to_string(),
            methods: vec![],
            requires_auth: true,
            upstream: UPSTREAM_BACKEND.to_string(),
            rewrite: None,
        },
        RouteDefinition {
            pattern: "/articles/*".to_string(),
            methods: vec![],
            requires_auth: true,
            upstream: UPSTREAM_BACKEND.to_string(),
            rewrite: None,
        },
        RouteDefinition {
            pattern: "/tags/*".to_string(),
            methods: vec![],
            requires_auth: true,
            upstream: UPSTREAM_BACKEND.to_string(),
            rewrite: None,
        },
        RouteDefinition {
            pattern: "/assets/*".to_string(),
            methods: vec![],
            requires_auth: true,
            upstream: UPSTREAM_BACKEND.to_string(),
            rewrite: None,
        },
        RouteDefinition {
            pattern: "/uploads/*".to_string(),
            methods: vec![],
            requires_auth: true,
            upstream: UPSTREAM_BACKEND.to_string(),
            rewrite: None,
        },
        RouteDefinition {
            pattern: "/*".to_string(),
            methods: vec![],
            requires_auth: false,
            upstream: UPSTREAM_BACKEND.to_string(),
            rewrite: None,
        },
    ]
}

/// Load route definitions from a YAML file
pub fn load_routes_file<P: AsRef<Path>>(path: P) -> GatewayResult<Vec<RouteDefinition>> {
    let content = std::fs::read_to_string(&path).map_err(|e| {
        GatewayError::config(format!(
            "failed to read routes file {}: {}",
            path.as_ref().display(),
            e
        ))
    })?;

    serde_yaml::from_str(&content).map_err(|e| {
        GatewayError::config(format!(
            "failed to parse routes file {}: {}",
            path.as_ref().display(),
            e
        ))
    })
}

fn require_var(name: &str, errors: &mut Vec<String>) -> Option<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => {
            errors.push(format!("{name} is required"));
            None
        }
    }
}

fn require_url(name: &str, errors: &mut Vec<String>) -> Option<Url> {
    let raw = require_var(name, errors)?;
    match Url::parse(&raw) {
        Ok(url) => Some(url),
        Err(e) => {
            errors.push(format!("{name} is not a valid URL: {e}"));
            None
        }
    }
}

fn duration_var(name: &str, default: Duration, errors: &mut Vec<String>) -> Duration {
    match env::var(name) {
        Ok(raw) => match humantime::parse_duration(&raw) {
            Ok(duration) => duration,
            Err(e) => {
                errors.push(format!("{name} is not a valid duration: {e}"));
                default
            }
        },
        Err(_) => default,
    }
}

// Placeholder only reachable when from_env is already returning an error.
fn fallback_url() -> Url {
    Url::parse("http://127.0.0.1:0").expect("static URL")
}
