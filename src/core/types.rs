//! # Core Types Module
//!
//! This module defines the data structures that flow through the gateway
//! pipeline: the claims carried by a verified bearer token, the identity
//! fetched from the identity service, and the trusted headers the gateway
//! stamps onto forwarded requests.

use serde::{Deserialize, Serialize};

/// Names of the identity headers the gateway injects on authenticated
/// requests. Inbound values under these names are never trusted; the
/// authentication engine always overwrites them.
pub const HEADER_USER_ID: &str = "x-user-id";
pub const HEADER_USER_ROLE: &str = "x-user-role";
pub const HEADER_USER_EMAIL: &str = "x-user-email";
pub const HEADER_USER_NAME: &str = "x-user-name";

/// Header carrying the service-to-service secret on identity lookups.
/// Distinct from user bearer tokens.
pub const HEADER_INTERNAL_SECRET: &str = "x-internal-secret";

/// Claims carried by an access token
///
/// Produced only by successful signature and expiry verification; nothing in
/// here is trusted before that. `sub` is the subject (user) id used for the
/// identity lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject id the token was issued for
    pub sub: String,

    /// Email claim, if the issuer included one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Display name claim, if the issuer included one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Expiration time (seconds since epoch), enforced during verification
    pub exp: i64,

    /// Issued-at time (seconds since epoch)
    #[serde(default)]
    pub iat: i64,
}

/// A user identity as reported by the identity service
///
/// Fetched fresh on every authenticated request; never persisted or cached
/// across requests. The wire shape is the identity service's camelCase JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Canonical user id
    pub id: String,

    /// Email, if the account has one
    pub email: Option<String>,

    /// Display name, if the account has one
    pub name: Option<String>,

    /// Role forwarded to upstream services
    pub role: String,

    /// Disabled accounts fail authentication even with a valid token
    pub is_active: bool,
}
