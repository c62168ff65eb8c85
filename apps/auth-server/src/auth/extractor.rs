// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for verified callers.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(claims): Auth) -> impl IntoResponse {
//!     // claims is DecodedClaims
//! }
//! ```
//!
//! The token is read from `Authorization: Bearer <token>` or, when that header
//! is absent, from the `access_token` cookie.

use std::marker::PhantomData;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use super::cookies::{read_cookie, ACCESS_TOKEN_COOKIE};
use super::gate::{Admin, AuthorizationGate, CapabilitySet};
use super::{AuthError, DecodedClaims};
use crate::state::AppState;

/// Locate the bearer token in request headers.
///
/// The scheme name is matched case-insensitively. A present but malformed
/// `Authorization` header is an error even when a cookie is also present.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    if let Some(header) = headers.get(AUTHORIZATION) {
        let value = header.to_str().map_err(|_| AuthError::InvalidAuthHeader)?;
        let token = value
            .split_once(' ')
            .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("Bearer"))
            .map(|(_, token)| token.trim())
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::InvalidAuthHeader)?;
        return Ok(token);
    }

    read_cookie(headers, ACCESS_TOKEN_COOKIE).ok_or(AuthError::MissingToken)
}

/// Extractor for verified claims.
///
/// Reuses claims stored by [`require_auth`](super::middleware::require_auth)
/// when present, otherwise verifies the request's token.
pub struct Auth(pub DecodedClaims);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(claims) = parts.extensions.get::<DecodedClaims>().cloned() {
            return Ok(Auth(claims));
        }

        let token = bearer_token(&parts.headers)?;
        let claims = state.verify_token(token).await?;
        Ok(Auth(claims))
    }
}

/// Extractor that additionally requires any capability in `C::REQUIRED`.
///
/// # Example
///
/// ```rust,ignore
/// async fn admin_only(Authorized(claims, ..): AdminOnly) -> impl IntoResponse {
///     // Only callers holding "admin" reach here
/// }
/// ```
pub struct Authorized<C: CapabilitySet>(pub DecodedClaims, pub PhantomData<C>);

impl<C: CapabilitySet> FromRequestParts<AppState> for Authorized<C> {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Auth(claims) = Auth::from_request_parts(parts, state).await?;
        AuthorizationGate::authorize(&claims, C::REQUIRED).into_result()?;
        Ok(Authorized(claims, PhantomData))
    }
}

/// Extractor that requires the `admin` capability.
pub type AdminOnly = Authorized<Admin>;
