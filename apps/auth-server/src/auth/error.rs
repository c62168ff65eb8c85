// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication and authorization errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Verification and authorization failures.
///
/// Every variant is terminal for the request. Messages are safe to return to
/// callers; internal causes are logged where they occur and never carried here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No bearer header and no access token cookie
    #[error("Authentication credentials were not provided")]
    MissingToken,
    /// Authorization header is not `Bearer <token>`
    #[error("Invalid authorization header format (expected 'Bearer <token>')")]
    InvalidAuthHeader,
    /// Signing keys could not be fetched from the identity provider
    #[error("Signing keys are currently unavailable")]
    KeySetUnavailable,
    /// No published key matches the token's key identifier
    #[error("No matching signing key found")]
    KeyNotFound,
    /// Token could not be parsed, or has no key identifier
    #[error("Token is malformed")]
    MalformedToken,
    /// Token declares an algorithm other than RS256
    #[error("Token algorithm is not supported")]
    UnsupportedAlgorithm,
    /// Token signature does not verify
    #[error("Token signature is invalid")]
    InvalidSignature,
    /// Token `exp` is in the past
    #[error("Token has expired")]
    ExpiredToken,
    /// Token `nbf` is in the future
    #[error("Token is not yet valid")]
    TokenNotYetValid,
    /// Token audience does not include the expected audience
    #[error("Token audience is invalid")]
    InvalidAudience,
    /// Token issuer differs from the expected issuer
    #[error("Token issuer is invalid")]
    InvalidIssuer,
    /// Verified identity lacks every required capability
    #[error("Insufficient permissions for this operation")]
    InsufficientPermissions,
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::KeySetUnavailable => "key_set_unavailable",
            AuthError::KeyNotFound => "key_not_found",
            AuthError::MalformedToken => "malformed_token",
            AuthError::UnsupportedAlgorithm => "unsupported_algorithm",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::ExpiredToken => "expired_token",
            AuthError::TokenNotYetValid => "token_not_yet_valid",
            AuthError::InvalidAudience => "invalid_audience",
            AuthError::InvalidIssuer => "invalid_issuer",
            AuthError::InsufficientPermissions => "insufficient_permissions",
        }
    }

    /// Get the HTTP status code for this error.
    ///
    /// Everything raised by key resolution or token verification is a 401;
    /// only the authorization gate produces a 403.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InsufficientPermissions => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
