//! # Error Handling Module
//!
//! This module defines the complete failure taxonomy of the gateway and its
//! mapping to client-visible HTTP responses. Every failure a request can hit
//! falls into one of the variants below; anything else is a bug and surfaces
//! as `Internal`.
//!
//! The propagation policy is strict: authentication failures are normalized
//! into non-sensitive 401 messages before they reach the client, and upstream
//! connection detail is logged server-side but never serialized outward.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Main result type used throughout the gateway
pub type GatewayResult<T> = Result<T, GatewayError>;

/// All failure kinds the gateway can produce
///
/// The five authentication variants collapse to HTTP 401 at the pipeline
/// boundary, each with a distinguishing but non-sensitive message. Proxy
/// failures map to 502 with a target-identifying message. Everything
/// unanticipated is `Internal` and maps to a generic 500.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// No `Authorization` header, or one that is not `Bearer <token>`
    #[error("Missing authorization token")]
    MissingCredential,

    /// Token signature mismatch, malformed encoding, or elapsed expiry
    #[error("Invalid or expired access token")]
    InvalidToken,

    /// Identity service answered 404 for the token's subject
    #[error("User not found")]
    UserNotFound,

    /// Identity service reports the account as inactive
    #[error("User account is disabled")]
    AccountDisabled,

    /// Identity lookup failed: transport error, timeout, non-2xx, or
    /// unparseable body
    #[error("Authentication service unavailable")]
    IdentityServiceUnavailable,

    /// Routed backend unreachable or timed out; `service` is the
    /// human-readable upstream label, not a connection detail
    #[error("{service} unavailable")]
    UpstreamUnreachable { service: String },

    /// Configuration-related errors (missing variables, invalid URLs, etc.)
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Internal errors for unexpected failures
    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl GatewayError {
    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error with a custom message
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create an upstream-unreachable error for the given service label
    pub fn upstream_unreachable<S: Into<String>>(service: S) -> Self {
        Self::UpstreamUnreachable {
            service: service.into(),
        }
    }

    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingCredential
            | Self::InvalidToken
            | Self::UserNotFound
            | Self::AccountDisabled
            | Self::IdentityServiceUnavailable => StatusCode::UNAUTHORIZED,
            Self::UpstreamUnreachable { .. } => StatusCode::BAD_GATEWAY,
            Self::Configuration { .. } | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The `error` field of the client-visible JSON body
    pub fn error_label(&self) -> &'static str {
        match self.status_code() {
            StatusCode::UNAUTHORIZED => "Unauthorized",
            StatusCode::BAD_GATEWAY => "Bad Gateway",
            _ => "Internal Server Error",
        }
    }

    /// The `message` field of the client-visible JSON body
    ///
    /// Internal and configuration detail stays server-side; clients get a
    /// generic message for those kinds.
    pub fn client_message(&self) -> String {
        match self {
            Self::Configuration { .. } | Self::Internal { .. } => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Whether this error belongs to the authentication taxonomy
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::MissingCredential
                | Self::InvalidToken
                | Self::UserNotFound
                | Self::AccountDisabled
                | Self::IdentityServiceUnavailable
        )
    }
}

/// Implement conversion from jsonwebtoken::errors::Error
///
/// Every verification failure collapses into `InvalidToken`; the underlying
/// reason is logged by the verifier, not carried in the error.
impl From<jsonwebtoken::errors::Error> for GatewayError {
    fn from(_err: jsonwebtoken::errors::Error) -> Self {
        Self::InvalidToken
    }
}

/// Implement conversion from std::io::Error
impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal {
            message: err.to_string(),
        }
    }
}

/// Convert errors into the gateway's uniform failure responses
///
/// The body shape is `{"statusCode": u16, "message": string, "error":
/// string}` for every failure category. Server-side detail for 500s is
/// logged here, at the single point where errors leave the process.
impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed with internal error");
        }

        let body = json!({
            "statusCode": status.as_u16(),
            "message": self.client_message(),
            "error": self.error_label(),
        });

        (status, Json(body)).into_response()
    }
}
