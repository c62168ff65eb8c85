// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session cookie contract.
//!
//! | Cookie | Contents | Max-Age |
//! |--------|----------|---------|
//! | `access_token` | provider access token | access window (3600s) |
//! | `refresh_token` | provider refresh token | refresh window (2592000s) |
//! | `auth_state` | OAuth `state` for the pending login | 600s |
//!
//! All cookies are `HttpOnly; Secure; SameSite=Lax; Path=/`. Clearing uses the
//! same path with `Max-Age=0`.

use std::time::Duration;

use axum::http::{header::COOKIE, HeaderMap};

use super::session::SessionTokens;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";
pub const AUTH_STATE_COOKIE: &str = "auth_state";

/// Lifetime of the `auth_state` cookie (one login attempt).
pub const AUTH_STATE_MAX_AGE: Duration = Duration::from_secs(600);

const COOKIE_PATH: &str = "/";

/// Max-age policy for the session cookies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookiePolicy {
    pub access_max_age: Duration,
    pub refresh_max_age: Duration,
}

impl CookiePolicy {
    /// `Set-Cookie` values for freshly issued tokens.
    ///
    /// The refresh cookie is only written when `tokens` carries a refresh
    /// token; otherwise the existing one is left in place.
    pub fn session_cookies(&self, tokens: &SessionTokens) -> Vec<String> {
        let mut cookies = vec![set_cookie(
            ACCESS_TOKEN_COOKIE,
            &tokens.access_token,
            self.access_max_age,
        )];
        if let Some(refresh) = &tokens.refresh_token {
            cookies.push(set_cookie(REFRESH_TOKEN_COOKIE, refresh, self.refresh_max_age));
        }
        cookies
    }
}

/// Whether `value` can be written into `Set-Cookie` verbatim.
///
/// Allows only RFC 6265 cookie-octets and rejects whitespace, control
/// characters, `"`, `,`, `;` and `\`.
pub fn is_cookie_safe(value: &str) -> bool {
    value
        .bytes()
        .all(|b| matches!(b, 0x21 | 0x23..=0x2B | 0x2D..=0x3A | 0x3C..=0x5B | 0x5D..=0x7E))
}

/// `Set-Cookie` value with the session attributes.
pub fn set_cookie(name: &str, value: &str, max_age: Duration) -> String {
    format!(
        "{name}={value}; Max-Age={}; Path={COOKIE_PATH}; HttpOnly; Secure; SameSite=Lax",
        max_age.as_secs()
    )
}

/// `Set-Cookie` value that removes `name`.
pub fn clear_cookie(name: &str) -> String {
    set_cookie(name, "", Duration::ZERO)
}

/// Clears both session cookies.
pub fn clear_session_cookies() -> [String; 2] {
    [
        clear_cookie(ACCESS_TOKEN_COOKIE),
        clear_cookie(REFRESH_TOKEN_COOKIE),
    ]
}

/// Read a cookie from the request's `Cookie` headers.
///
/// Empty values count as absent.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"'))
        .filter(|value| !value.is_empty())
}
