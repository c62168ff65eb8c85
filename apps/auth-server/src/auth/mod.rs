// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Auth0 JWT verification, capability checks and OAuth session bootstrap.
//!
//! ## Auth Flow
//!
//! 1. The browser logs in at the identity provider (`/api/auth/login`)
//! 2. The callback exchanges the code and stores the tokens in cookies
//! 3. Requests carry `Authorization: Bearer <JWT>` or the `access_token` cookie
//! 4. The server:
//!    - Resolves the signing key from the cached JWKS (one refresh on miss)
//!    - Verifies the RS256 signature, expiry, audience and issuer
//!    - Extracts `sub` and the configured role claim
//!
//! ## Security
//!
//! - Only RS256 is accepted; the algorithm is checked before any key lookup
//! - Verification is all-or-nothing; there is no anonymous fallback
//! - Capability checks fail closed

pub mod claims;
pub mod cookies;
pub mod error;
pub mod extractor;
pub mod gate;
pub mod idp;
pub mod jwks;
pub mod middleware;
pub mod session;
pub mod verifier;

#[cfg(test)]
pub(crate) mod test_support;

pub use claims::DecodedClaims;
pub use cookies::CookiePolicy;
pub use error::AuthError;
pub use extractor::{AdminOnly, Auth, Authorized};
pub use gate::{Admin, AuthorizationDecision, AuthorizationGate, CapabilitySet};
pub use jwks::{KeySetCache, SigningKeySet};
pub use middleware::require_auth;
pub use session::{Fault, SessionBootstrap, SessionError, SessionTokens, UserProfile};
pub use verifier::TokenVerifier;
