//! # Route Table
//!
//! The ordered route table mapping requests to upstream targets. Rules are
//! data, evaluated top to bottom with first match winning, so rule order is
//! the tie-break and every path resolves to exactly one effective target.
//! Construction enforces a trailing catch-all, which makes lookup total.
//!
//! Selection is a pure function of method and path; it never looks at the
//! caller's identity.

use axum::http::Method;
use std::borrow::Cow;
use std::str::FromStr;

use crate::core::config::{PathRewrite, RouteDefinition};
use crate::core::error::{GatewayError, GatewayResult};

/// A compiled route rule
#[derive(Debug, Clone)]
pub struct RouteRule {
    /// Path pattern: exact (`/tags`) or prefix glob (`/tg/*`)
    pub pattern: String,

    /// Methods this rule applies to; empty means all
    pub methods: Vec<Method>,

    /// Whether matching requests pass through the authentication engine
    pub requires_auth: bool,

    /// Name of the upstream target
    pub upstream: String,

    /// Optional prefix substitution applied before forwarding
    pub rewrite: Option<PathRewrite>,
}

impl RouteRule {
    /// Check whether this rule matches the given method and path
    pub fn matches(&self, method: &Method, path: &str) -> bool {
        self.matches_method(method) && self.matches_path(path)
    }

    fn matches_method(&self, method: &Method) -> bool {
        self.methods.is_empty() || self.methods.contains(method)
    }

    fn matches_path(&self, path: &str) -> bool {
        if let Some(prefix) = self.pattern.strip_suffix("/*") {
            // A glob matches the bare prefix too: "/tg/*" matches "/tg".
            match path.strip_prefix(prefix) {
                Some(rest) => rest.is_empty() || rest.starts_with('/'),
                None => false,
            }
        } else {
            path == self.pattern
        }
    }

    /// Apply this rule's rewrite to `path`, if any
    pub fn rewritten_path<'a>(&self, path: &'a str) -> Cow<'a, str> {
        match &self.rewrite {
            Some(rewrite) => match path.strip_prefix(rewrite.prefix.as_str()) {
                Some(rest) => Cow::Owned(format!("{}{}", rewrite.replacement, rest)),
                None => Cow::Borrowed(path),
            },
            None => Cow::Borrowed(path),
        }
    }
}

/// The ordered route table
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    /// Compile a route table from configuration
    ///
    /// Fails unless the final shape guarantees a total lookup: at least one
    /// rule, and a catch-all (`/*`, all methods) somewhere in the list.
    pub fn new(definitions: &[RouteDefinition]) -> GatewayResult<Self> {
        if definitions.is_empty() {
            return Err(GatewayError::config("route table has no rules"));
        }

        let mut rules = Vec::with_capacity(definitions.len());
        for definition in definitions {
            let methods = definition
                .methods
                .iter()
                .map(|raw| {
                    Method::from_str(&raw.to_uppercase()).map_err(|_| {
                        GatewayError::config(format!(
                            "route '{}' has invalid HTTP method: {}",
                            definition.pattern, raw
                        ))
                    })
                })
                .collect::<GatewayResult<Vec<Method>>>()?;

            rules.push(RouteRule {
                pattern: definition.pattern.clone(),
                methods,
                requires_auth: definition.requires_auth,
                upstream: definition.upstream.clone(),
                rewrite: definition.rewrite.clone(),
            });
        }

        let has_catch_all = rules
            .iter()
            .any(|rule| rule.pattern == "/*" && rule.methods.is_empty());
        if !has_catch_all {
            return Err(GatewayError::config(
                "route table must contain a catch-all '/*' rule",
            ));
        }

        Ok(Self { rules })
    }

    /// Find the rule for a request: linear scan, first match wins
    ///
    /// Total because construction enforced a catch-all.
    pub fn find(&self, method: &Method, path: &str) -> &RouteRule {
        self.rules
            .iter()
            .find(|rule| rule.matches(method, path))
            .unwrap_or_else(|| {
                // Unreachable by construction; the catch-all matches everything.
                self.rules.last().expect("route table is non-empty")
            })
    }

    /// Number of compiled rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
