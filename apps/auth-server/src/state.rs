// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{
    idp, AuthError, CookiePolicy, DecodedClaims, KeySetCache, SessionBootstrap, TokenVerifier,
};
use crate::config::{ConfigError, Settings};

/// Expected token audience and issuer.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub audience: String,
    pub issuer: String,
}

/// Shared components, built once at startup and cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub keys: Arc<KeySetCache>,
    pub verifier: TokenVerifier,
    pub session: Arc<SessionBootstrap>,
    pub auth_config: AuthConfig,
    pub cookies: CookiePolicy,
    /// OAuth callback registered with the provider
    pub callback_url: String,
    /// Frontend origin (CORS and post-logout target)
    pub frontend_url: String,
    /// Post-login browser target
    pub landing_url: String,
}

impl AppState {
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let client =
            idp::http_client(settings.idp.http_timeout).map_err(|e| ConfigError::Invalid {
                name: crate::config::IDP_HTTP_TIMEOUT_ENV.to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        let endpoints = settings.idp.endpoints();

        let keys = Arc::new(KeySetCache::new(endpoints.jwks_url(), client.clone()));
        let verifier = TokenVerifier::new(keys.clone(), settings.idp.roles_claim.clone())
            .with_leeway(settings.idp.clock_skew_secs);
        let session = SessionBootstrap::new(&settings.idp, &settings.frontend_url, client)?;

        Ok(Self {
            keys,
            verifier,
            session: Arc::new(session),
            auth_config: AuthConfig {
                audience: settings.idp.audience.clone(),
                issuer: endpoints.issuer(),
            },
            cookies: CookiePolicy {
                access_max_age: settings.idp.access_token_max_age,
                refresh_max_age: settings.idp.refresh_token_max_age,
            },
            callback_url: settings.callback_url(),
            frontend_url: settings.frontend_url.clone(),
            landing_url: settings.landing_url(),
        })
    }

    /// Verify a bearer token against the configured audience and issuer.
    pub async fn verify_token(&self, token: &str) -> Result<DecodedClaims, AuthError> {
        self.verifier
            .verify(token, &self.auth_config.audience, &self.auth_config.issuer)
            .await
    }
}
