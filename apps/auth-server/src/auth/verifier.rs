// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token verification.
//!
//! Verification is all-or-nothing:
//!
//! 1. Parse the header without verifying; require a `kid`.
//! 2. Reject anything not declaring RS256 before any key lookup.
//! 3. Resolve the key through the [`KeySetCache`] (may refresh once).
//! 4. Verify the signature, then `exp`/`nbf`, audience and issuer.
//!
//! [`DecodedClaims`] is only built once every step has passed.

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, Validation};
use serde::Deserialize;
use tracing::debug;

use super::claims::{DecodedClaims, RawClaims};
use super::error::AuthError;
use super::jwks::KeySetCache;

/// The only accepted signing algorithm.
const ALLOWED_ALGORITHM: Algorithm = Algorithm::RS256;
const ALLOWED_ALGORITHM_NAME: &str = "RS256";

/// Claims that must be present in every accepted token.
const REQUIRED_CLAIMS: [&str; 4] = ["exp", "iss", "aud", "sub"];

/// Header fields read before the signature is checked.
#[derive(Debug, Deserialize)]
struct UnverifiedHeader {
    #[serde(default)]
    alg: Option<String>,
    #[serde(default)]
    kid: Option<String>,
}

/// Verifies bearer tokens against the identity provider's published keys.
#[derive(Clone)]
pub struct TokenVerifier {
    keys: Arc<KeySetCache>,
    /// Leeway in seconds for `exp` / `nbf`
    leeway: u64,
    /// Claim holding the role/permission list
    roles_claim: String,
}

impl TokenVerifier {
    pub fn new(keys: Arc<KeySetCache>, roles_claim: impl Into<String>) -> Self {
        Self {
            keys,
            leeway: 0,
            roles_claim: roles_claim.into(),
        }
    }

    /// Set the clock skew leeway.
    pub fn with_leeway(mut self, leeway_secs: u64) -> Self {
        self.leeway = leeway_secs;
        self
    }

    pub fn key_set(&self) -> &Arc<KeySetCache> {
        &self.keys
    }

    /// Verify `raw_token` and return its claims.
    pub async fn verify(
        &self,
        raw_token: &str,
        expected_audience: &str,
        expected_issuer: &str,
    ) -> Result<DecodedClaims, AuthError> {
        self.verify_inner(raw_token, expected_audience, expected_issuer)
            .await
            .inspect_err(|e| debug!(error_code = e.error_code(), "Bearer token rejected"))
    }

    async fn verify_inner(
        &self,
        raw_token: &str,
        expected_audience: &str,
        expected_issuer: &str,
    ) -> Result<DecodedClaims, AuthError> {
        let header = read_header(raw_token)?;
        let kid = header
            .kid
            .filter(|kid| !kid.is_empty())
            .ok_or(AuthError::MalformedToken)?;

        if header.alg.as_deref() != Some(ALLOWED_ALGORITHM_NAME) {
            return Err(AuthError::UnsupportedAlgorithm);
        }

        let key = self.keys.resolve(&kid).await?;

        let mut validation = Validation::new(ALLOWED_ALGORITHM);
        validation.leeway = self.leeway;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_audience(&[expected_audience]);
        validation.set_issuer(&[expected_issuer]);
        validation.set_required_spec_claims(&REQUIRED_CLAIMS);

        // Decode into plain JSON so the standard-claim checks run before the
        // payload is held to the `RawClaims` shape.
        let token_data = decode::<serde_json::Value>(raw_token, &key, &validation)
            .map_err(map_jwt_error)?;
        let raw: RawClaims =
            serde_json::from_value(token_data.claims).map_err(|_| AuthError::MalformedToken)?;

        Ok(DecodedClaims::from_verified(raw, &self.roles_claim))
    }
}

/// Decode the JOSE header without trusting it.
fn read_header(token: &str) -> Result<UnverifiedHeader, AuthError> {
    let mut segments = token.split('.');
    let (Some(header), Some(_payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(AuthError::MalformedToken);
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(header)
        .map_err(|_| AuthError::MalformedToken)?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::MalformedToken)
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
        ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
        ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        ErrorKind::InvalidAudience => AuthError::InvalidAudience,
        ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
            AuthError::UnsupportedAlgorithm
        }
        ErrorKind::MissingRequiredClaim(claim) => match claim.as_str() {
            "aud" => AuthError::InvalidAudience,
            "iss" => AuthError::InvalidIssuer,
            _ => AuthError::MalformedToken,
        },
        _ => AuthError::MalformedToken,
    }
}
