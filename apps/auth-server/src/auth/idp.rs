// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity provider endpoints and the outbound HTTP client.

use std::time::Duration;

/// URLs published by the identity provider, all derived from one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdpEndpoints {
    base_url: String,
}

impl IdpEndpoints {
    /// Derive endpoints from a configured domain.
    ///
    /// A bare domain (`tenant.auth0.com`) is served over HTTPS. A value that
    /// already carries a scheme is used verbatim, which lets tests point at a
    /// local plain-HTTP provider.
    pub fn from_domain(domain: &str) -> Self {
        let domain = domain.trim().trim_end_matches('/');
        let base_url = if domain.starts_with("https://") || domain.starts_with("http://") {
            domain.to_string()
        } else {
            format!("https://{domain}")
        };
        Self { base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Expected `iss` claim; the provider always appends a trailing slash.
    pub fn issuer(&self) -> String {
        format!("{}/", self.base_url)
    }

    pub fn jwks_url(&self) -> String {
        format!("{}/.well-known/jwks.json", self.base_url)
    }

    pub fn token_url(&self) -> String {
        format!("{}/oauth/token", self.base_url)
    }

    pub fn userinfo_url(&self) -> String {
        format!("{}/userinfo", self.base_url)
    }

    pub fn authorize_url(&self) -> String {
        format!("{}/authorize", self.base_url)
    }

    pub fn logout_url(&self) -> String {
        format!("{}/v2/logout", self.base_url)
    }
}

/// Build the HTTP client used for every identity provider call.
///
/// Every request carries the bounded timeout so a slow provider cannot stall
/// request handling.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
}
