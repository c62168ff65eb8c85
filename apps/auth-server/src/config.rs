// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! once at startup by [`Settings::from_env`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `AUTH0_DOMAIN` | Identity provider domain (or full base URL with scheme) | Required |
//! | `AUTH0_AUDIENCE` | Expected JWT audience claim | Required |
//! | `AUTH0_CLIENT_ID` | OAuth client id | Required |
//! | `AUTH0_CLIENT_SECRET` | OAuth client secret | Required |
//! | `AUTH0_ROLES_CLAIM` | Claim holding the role/permission list | `permissions` |
//! | `APP_URL` | Public base URL of this service | `http://localhost:8000` |
//! | `FRONTEND_URL` | Frontend base URL (post-login/logout target) | `http://localhost:5173` |
//! | `IDP_HTTP_TIMEOUT_SECS` | Timeout for all identity provider calls | `10` |
//! | `AUTH_CLOCK_SKEW_SECS` | Leeway applied to `exp` / `nbf` | `0` |
//! | `ACCESS_TOKEN_MAX_AGE_SECS` | Access token validity window | `3600` |
//! | `REFRESH_TOKEN_MAX_AGE_SECS` | Refresh token validity window | `2592000` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8000` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::time::Duration;

use crate::auth::idp::IdpEndpoints;

pub const AUTH0_DOMAIN_ENV: &str = "AUTH0_DOMAIN";
pub const AUTH0_AUDIENCE_ENV: &str = "AUTH0_AUDIENCE";
pub const AUTH0_CLIENT_ID_ENV: &str = "AUTH0_CLIENT_ID";
pub const AUTH0_CLIENT_SECRET_ENV: &str = "AUTH0_CLIENT_SECRET";
pub const AUTH0_ROLES_CLAIM_ENV: &str = "AUTH0_ROLES_CLAIM";
pub const APP_URL_ENV: &str = "APP_URL";
pub const FRONTEND_URL_ENV: &str = "FRONTEND_URL";
pub const IDP_HTTP_TIMEOUT_ENV: &str = "IDP_HTTP_TIMEOUT_SECS";
pub const CLOCK_SKEW_ENV: &str = "AUTH_CLOCK_SKEW_SECS";
pub const ACCESS_TOKEN_MAX_AGE_ENV: &str = "ACCESS_TOKEN_MAX_AGE_SECS";
pub const REFRESH_TOKEN_MAX_AGE_ENV: &str = "REFRESH_TOKEN_MAX_AGE_SECS";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_ROLES_CLAIM: &str = "permissions";
pub const DEFAULT_APP_URL: &str = "http://localhost:8000";
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// Default timeout for outbound identity provider requests.
pub const DEFAULT_IDP_TIMEOUT: Duration = Duration::from_secs(10);

/// Access token validity window (1 hour).
pub const DEFAULT_ACCESS_TOKEN_MAX_AGE: Duration = Duration::from_secs(3600);

/// Refresh token validity window (30 days).
pub const DEFAULT_REFRESH_TOKEN_MAX_AGE: Duration = Duration::from_secs(2_592_000);

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(String),

    #[error("environment variable {name} is invalid: {reason}")]
    Invalid { name: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl LogFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Some(LogFormat::Json),
            "pretty" | "text" => Some(LogFormat::Pretty),
            _ => None,
        }
    }
}

/// Identity provider settings shared by the verifier and the session flow.
#[derive(Clone)]
pub struct IdpSettings {
    pub domain: String,
    pub audience: String,
    pub client_id: String,
    pub client_secret: String,
    pub roles_claim: String,
    pub http_timeout: Duration,
    pub clock_skew_secs: u64,
    pub access_token_max_age: Duration,
    pub refresh_token_max_age: Duration,
}

impl IdpSettings {
    pub fn endpoints(&self) -> IdpEndpoints {
        IdpEndpoints::from_domain(&self.domain)
    }
}

impl std::fmt::Debug for IdpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdpSettings")
            .field("domain", &self.domain)
            .field("audience", &self.audience)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("roles_claim", &self.roles_claim)
            .field("http_timeout", &self.http_timeout)
            .field("clock_skew_secs", &self.clock_skew_secs)
            .finish()
    }
}

/// Full service configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub idp: IdpSettings,
    pub app_url: String,
    pub frontend_url: String,
    pub host: String,
    pub port: u16,
    pub log_format: LogFormat,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required =
            |name: &str| get(name).ok_or_else(|| ConfigError::Missing(name.to_string()));
        let or_default = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_string());

        let idp = IdpSettings {
            domain: required(AUTH0_DOMAIN_ENV)?,
            audience: required(AUTH0_AUDIENCE_ENV)?,
            client_id: required(AUTH0_CLIENT_ID_ENV)?,
            client_secret: required(AUTH0_CLIENT_SECRET_ENV)?,
            roles_claim: or_default(AUTH0_ROLES_CLAIM_ENV, DEFAULT_ROLES_CLAIM),
            http_timeout: parse_secs(get(IDP_HTTP_TIMEOUT_ENV), IDP_HTTP_TIMEOUT_ENV, DEFAULT_IDP_TIMEOUT)?,
            clock_skew_secs: parse_secs(get(CLOCK_SKEW_ENV), CLOCK_SKEW_ENV, Duration::ZERO)?.as_secs(),
            access_token_max_age: parse_secs(
                get(ACCESS_TOKEN_MAX_AGE_ENV),
                ACCESS_TOKEN_MAX_AGE_ENV,
                DEFAULT_ACCESS_TOKEN_MAX_AGE,
            )?,
            refresh_token_max_age: parse_secs(
                get(REFRESH_TOKEN_MAX_AGE_ENV),
                REFRESH_TOKEN_MAX_AGE_ENV,
                DEFAULT_REFRESH_TOKEN_MAX_AGE,
            )?,
        };

        if idp.http_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                name: IDP_HTTP_TIMEOUT_ENV.to_string(),
                reason: "timeout must be greater than zero".to_string(),
            });
        }

        let port = match get(PORT_ENV) {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: PORT_ENV.to_string(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let log_format = match get(LOG_FORMAT_ENV) {
            Some(raw) => LogFormat::parse(&raw).ok_or_else(|| ConfigError::Invalid {
                name: LOG_FORMAT_ENV.to_string(),
                reason: format!("expected 'json' or 'pretty', got '{raw}'"),
            })?,
            None => LogFormat::default(),
        };

        Ok(Self {
            idp,
            app_url: trim_url(or_default(APP_URL_ENV, DEFAULT_APP_URL)),
            frontend_url: trim_url(or_default(FRONTEND_URL_ENV, DEFAULT_FRONTEND_URL)),
            host: or_default(HOST_ENV, DEFAULT_HOST),
            port,
            log_format,
        })
    }

    /// OAuth redirect target registered with the identity provider.
    pub fn callback_url(&self) -> String {
        format!("{}/api/auth/callback", self.app_url)
    }

    /// Where the browser lands after a successful login.
    pub fn landing_url(&self) -> String {
        format!("{}/landing", self.frontend_url)
    }
}

fn parse_secs(raw: Option<String>, name: &str, default: Duration) -> Result<Duration, ConfigError> {
    match raw {
        Some(value) => value
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::Invalid {
                name: name.to_string(),
                reason: e.to_string(),
            }),
        None => Ok(default),
    }
}

fn trim_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    const REQUIRED: [(&str, &str); 4] = [
        (AUTH0_DOMAIN_ENV, "tenant.auth0.com"),
        (AUTH0_AUDIENCE_ENV, "https://api.example.com"),
        (AUTH0_CLIENT_ID_ENV, "client-123"),
        (AUTH0_CLIENT_SECRET_ENV, "s3cret"),
    ];

    #[test]
    fn defaults_apply_when_only_required_vars_set() {
        let settings = Settings::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(settings.idp.roles_claim, "permissions");
        assert_eq!(settings.idp.http_timeout, DEFAULT_IDP_TIMEOUT);
        assert_eq!(settings.idp.clock_skew_secs, 0);
        assert_eq!(settings.idp.access_token_max_age, Duration::from_secs(3600));
        assert_eq!(settings.idp.refresh_token_max_age, Duration::from_secs(2_592_000));
        assert_eq!(settings.port, 8000);
        assert_eq!(settings.log_format, LogFormat::Pretty);
        assert_eq!(settings.callback_url(), "http://localhost:8000/api/auth/callback");
        assert_eq!(settings.landing_url(), "http://localhost:5173/landing");
    }

    #[test]
    fn missing_required_var_is_reported_by_name() {
        let vars: Vec<_> = REQUIRED
            .iter()
            .copied()
            .filter(|(k, _)| *k != AUTH0_CLIENT_SECRET_ENV)
            .collect();
        let err = Settings::from_lookup(lookup(&vars)).unwrap_err();
        assert_eq!(err, ConfigError::Missing(AUTH0_CLIENT_SECRET_ENV.to_string()));
    }

    #[test]
    fn blank_values_count_as_missing() {
        let mut vars = REQUIRED.to_vec();
        vars[1] = (AUTH0_AUDIENCE_ENV, "   ");
        let err = Settings::from_lookup(lookup(&vars)).unwrap_err();
        assert_eq!(err, ConfigError::Missing(AUTH0_AUDIENCE_ENV.to_string()));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut vars = REQUIRED.to_vec();
        vars.push((IDP_HTTP_TIMEOUT_ENV, "0"));
        let err = Settings::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name, .. } if name == IDP_HTTP_TIMEOUT_ENV));
    }

    #[test]
    fn invalid_log_format_is_rejected() {
        let mut vars = REQUIRED.to_vec();
        vars.push((LOG_FORMAT_ENV, "xml"));
        assert!(Settings::from_lookup(lookup(&vars)).is_err());
    }

    #[test]
    fn urls_lose_trailing_slash() {
        let mut vars = REQUIRED.to_vec();
        vars.push((APP_URL_ENV, "https://api.example.com/"));
        vars.push((FRONTEND_URL_ENV, "https://app.example.com/"));
        let settings = Settings::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(settings.callback_url(), "https://api.example.com/api/auth/callback");
        assert_eq!(settings.landing_url(), "https://app.example.com/landing");
    }

    #[test]
    fn debug_output_redacts_client_secret() {
        let settings = Settings::from_lookup(lookup(&REQUIRED)).unwrap();
        let rendered = format!("{:?}", settings.idp);
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("<redacted>"));
    }
}
