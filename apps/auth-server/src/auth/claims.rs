// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims and the verified identity handed to request handlers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// `aud` may be a single string or an array of strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum AudienceClaim {
    Single(String),
    Multiple(Vec<String>),
}

impl AudienceClaim {
    fn into_vec(self) -> Vec<String> {
        match self {
            AudienceClaim::Single(aud) => vec![aud],
            AudienceClaim::Multiple(auds) => auds,
        }
    }
}

/// Payload shape of an access token issued by the identity provider.
///
/// Only built after the signature and standard claims have been verified.
/// Optional claims are kept as raw JSON so an odd type drops the value
/// instead of rejecting the token.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawClaims {
    pub sub: String,
    pub iss: String,
    pub aud: AudienceClaim,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<serde_json::Value>,
    #[serde(default)]
    pub email: Option<serde_json::Value>,
    /// Everything else, including the namespaced role claim
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Validated identity extracted from a verified token.
///
/// Only [`TokenVerifier`](super::TokenVerifier) constructs this type, and only
/// after every check has passed. Fields are read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DecodedClaims {
    subject: String,
    issuer: String,
    audience: Vec<String>,
    expires_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    issued_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    roles: Vec<String>,
}

impl DecodedClaims {
    /// Build from a verified payload, reading roles from `roles_claim`.
    ///
    /// A missing or non-array role claim yields an empty list; non-string
    /// entries are dropped.
    pub(crate) fn from_verified(raw: RawClaims, roles_claim: &str) -> Self {
        let roles = raw
            .extra
            .get(roles_claim)
            .and_then(serde_json::Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(serde_json::Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            subject: raw.sub,
            issuer: raw.iss,
            audience: raw.aud.into_vec(),
            expires_at: raw.exp,
            issued_at: raw.iat.as_ref().and_then(serde_json::Value::as_i64),
            email: raw
                .email
                .as_ref()
                .and_then(serde_json::Value::as_str)
                .map(str::to_string),
            roles,
        }
    }

    /// Subject (user ID), e.g. `auth0|abc123`
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn audience(&self) -> &[String] {
        &self.audience
    }

    /// Expiration (Unix timestamp)
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    pub fn issued_at(&self) -> Option<i64> {
        self.issued_at
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Role/permission list from the configured claim
    pub fn roles(&self) -> &[String] {
        &self.roles
    }
}

#[cfg(test)]
impl DecodedClaims {
    pub(crate) fn for_tests(subject: &str, roles: &[&str]) -> Self {
        Self {
            subject: subject.to_string(),
            issuer: "https://tenant.example.com/".to_string(),
            audience: vec!["https://accounts.example.com/api".to_string()],
            expires_at: 0,
            issued_at: None,
            email: None,
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawClaims {
        serde_json::from_value(value).unwrap()
    }

    fn sample() -> serde_json::Value {
        json!({
            "sub": "auth0|user_123",
            "iss": "https://tenant.example.com/",
            "aud": ["https://accounts.example.com/api", "https://tenant.example.com/userinfo"],
            "exp": 1700003600,
            "iat": 1700000000,
            "email": "user@example.com",
            "permissions": ["read:profile", "admin"],
            "https://accounts.example.com/roles": ["editor"]
        })
    }

    #[test]
    fn extracts_standard_fields() {
        let claims = DecodedClaims::from_verified(raw(sample()), "permissions");
        assert_eq!(claims.subject(), "auth0|user_123");
        assert_eq!(claims.issuer(), "https://tenant.example.com/");
        assert_eq!(claims.audience().len(), 2);
        assert_eq!(claims.expires_at(), 1700003600);
        assert_eq!(claims.issued_at(), Some(1700000000));
        assert_eq!(claims.email(), Some("user@example.com"));
    }

    #[test]
    fn roles_come_from_configured_claim_only() {
        let claims = DecodedClaims::from_verified(raw(sample()), "permissions");
        assert_eq!(claims.roles(), ["read:profile", "admin"]);

        let claims =
            DecodedClaims::from_verified(raw(sample()), "https://accounts.example.com/roles");
        assert_eq!(claims.roles(), ["editor"]);
    }

    #[test]
    fn single_string_audience_is_accepted() {
        let mut value = sample();
        value["aud"] = json!("https://accounts.example.com/api");
        let claims = DecodedClaims::from_verified(raw(value), "permissions");
        assert_eq!(claims.audience(), ["https://accounts.example.com/api"]);
    }

    #[test]
    fn missing_or_malformed_role_claim_yields_no_roles() {
        let mut value = sample();
        value.as_object_mut().unwrap().remove("permissions");
        let claims = DecodedClaims::from_verified(raw(value), "permissions");
        assert!(claims.roles().is_empty());

        let mut value = sample();
        value["permissions"] = json!("admin");
        let claims = DecodedClaims::from_verified(raw(value), "permissions");
        assert!(claims.roles().is_empty());

        let mut value = sample();
        value["permissions"] = json!(["admin", 7, null]);
        let claims = DecodedClaims::from_verified(raw(value), "permissions");
        assert_eq!(claims.roles(), ["admin"]);
    }

    #[test]
    fn oddly_typed_optional_claims_are_dropped() {
        let mut value = sample();
        value["email"] = json!(42);
        value["iat"] = json!("yesterday");
        let claims = DecodedClaims::from_verified(raw(value), "permissions");
        assert_eq!(claims.email(), None);
        assert_eq!(claims.issued_at(), None);
        assert_eq!(claims.subject(), "auth0|user_123");
    }
}
