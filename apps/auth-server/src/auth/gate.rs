// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Capability checks against verified claims.
//!
//! A requirement is satisfied when the claims carry **any** of the required
//! capabilities. Callers that need several capabilities at once must check
//! each one separately.

use super::claims::DecodedClaims;
use super::error::AuthError;

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationDecision {
    pub allowed: bool,
    pub reason: String,
}

impl AuthorizationDecision {
    /// Convert a denial into [`AuthError::InsufficientPermissions`].
    pub fn into_result(self) -> Result<(), AuthError> {
        if self.allowed {
            Ok(())
        } else {
            Err(AuthError::InsufficientPermissions)
        }
    }
}

/// Pure role/permission gate. No I/O and no state.
pub struct AuthorizationGate;

impl AuthorizationGate {
    pub fn authorize<S: AsRef<str>>(
        claims: &DecodedClaims,
        required: &[S],
    ) -> AuthorizationDecision {
        if required.is_empty() {
            return AuthorizationDecision {
                allowed: false,
                reason: "no capabilities were required".to_string(),
            };
        }

        let granted = required
            .iter()
            .map(AsRef::as_ref)
            .find(|cap| claims.roles().iter().any(|role| role == cap));

        match granted {
            Some(cap) => AuthorizationDecision {
                allowed: true,
                reason: format!("granted by '{cap}'"),
            },
            None => AuthorizationDecision {
                allowed: false,
                reason: format!(
                    "requires any of [{}]",
                    required
                        .iter()
                        .map(AsRef::as_ref)
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            },
        }
    }
}

/// A statically declared capability requirement, used by
/// [`Authorized`](super::Authorized).
pub trait CapabilitySet: Send + Sync + 'static {
    const REQUIRED: &'static [&'static str];
}

/// Requires the `admin` capability.
pub struct Admin;

impl CapabilitySet for Admin {
    const REQUIRED: &'static [&'static str] = &["admin"];
}
