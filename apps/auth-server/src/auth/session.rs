// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! OAuth session bootstrap against the identity provider.
//!
//! [`SessionBootstrap`] exchanges authorization codes and refresh tokens at
//! `{base}/oauth/token`, looks up the caller's profile at `{base}/userinfo`
//! and builds the authorize and logout URLs. It never stores tokens: the
//! caller decides where they go (see [`super::cookies`]). Failed calls are
//! not retried.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use super::cookies::is_cookie_safe;
use crate::config::{ConfigError, IdpSettings, AUTH0_DOMAIN_ENV};

const LOGIN_SCOPE: &str = "openid profile email offline_access";

/// Which side of the exchange was at fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The provider rejected what we sent (bad code, revoked token).
    Client,
    /// The provider failed, timed out, or answered with garbage.
    Provider,
}

impl Fault {
    fn status_code(self) -> StatusCode {
        match self {
            Fault::Client => StatusCode::BAD_REQUEST,
            Fault::Provider => StatusCode::BAD_GATEWAY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Authorization code exchange failed: {description}")]
    Exchange { fault: Fault, description: String },

    #[error("Token refresh failed: {description}")]
    Refresh { fault: Fault, description: String },

    #[error("User profile lookup failed: {description}")]
    Profile { fault: Fault, description: String },
}

impl SessionError {
    pub fn fault(&self) -> Fault {
        match self {
            SessionError::Exchange { fault, .. }
            | SessionError::Refresh { fault, .. }
            | SessionError::Profile { fault, .. } => *fault,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            SessionError::Exchange { .. } => "exchange_failed",
            SessionError::Refresh { .. } => "refresh_failed",
            SessionError::Profile { .. } => "userinfo_failed",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.fault().status_code()
    }
}

#[derive(Serialize)]
struct SessionErrorBody {
    error: String,
    error_code: String,
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(SessionErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}

/// Tokens issued by the provider, with the validity windows applied.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub access_expires_at: DateTime<Utc>,
    /// Set only when a refresh token was issued
    pub refresh_expires_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokens")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("access_expires_at", &self.access_expires_at)
            .field("refresh_expires_at", &self.refresh_expires_at)
            .finish()
    }
}

/// Profile fields published at the provider's `/userinfo` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect_uri: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Deserialize, Default)]
struct ProviderErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Clone, Copy)]
enum Grant {
    Exchange,
    Refresh,
}

impl Grant {
    fn name(self) -> &'static str {
        match self {
            Grant::Exchange => "authorization_code",
            Grant::Refresh => "refresh_token",
        }
    }

    fn error(self, fault: Fault, description: impl Into<String>) -> SessionError {
        let description = description.into();
        match self {
            Grant::Exchange => SessionError::Exchange { fault, description },
            Grant::Refresh => SessionError::Refresh { fault, description },
        }
    }
}

/// Code exchange, token refresh and logout URL construction.
pub struct SessionBootstrap {
    client: reqwest::Client,
    token_url: String,
    userinfo_url: String,
    authorize_endpoint: Url,
    logout_url: Url,
    client_id: String,
    client_secret: String,
    audience: String,
    access_token_max_age: Duration,
    refresh_token_max_age: Duration,
}

impl SessionBootstrap {
    /// `logout_return_to` is where the provider sends the browser after logout.
    pub fn new(
        idp: &IdpSettings,
        logout_return_to: &str,
        client: reqwest::Client,
    ) -> Result<Self, ConfigError> {
        let endpoints = idp.endpoints();
        let invalid_domain = |e: url::ParseError| ConfigError::Invalid {
            name: AUTH0_DOMAIN_ENV.to_string(),
            reason: e.to_string(),
        };

        let authorize_endpoint = Url::parse(&endpoints.authorize_url()).map_err(invalid_domain)?;
        let logout_url = Url::parse_with_params(
            &endpoints.logout_url(),
            &[
                ("client_id", idp.client_id.as_str()),
                ("returnTo", logout_return_to),
            ],
        )
        .map_err(invalid_domain)?;

        Ok(Self {
            client,
            token_url: endpoints.token_url(),
            userinfo_url: endpoints.userinfo_url(),
            authorize_endpoint,
            logout_url,
            client_id: idp.client_id.clone(),
            client_secret: idp.client_secret.clone(),
            audience: idp.audience.clone(),
            access_token_max_age: idp.access_token_max_age,
            refresh_token_max_age: idp.refresh_token_max_age,
        })
    }

    /// Provider login page URL for the authorization code flow.
    pub fn authorize_url(&self, redirect_uri: &str, state: &str) -> String {
        let mut url = self.authorize_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("audience", &self.audience)
            .append_pair("scope", LOGIN_SCOPE)
            .append_pair("state", state);
        url.into()
    }

    /// Exchange an authorization code for session tokens.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<SessionTokens, SessionError> {
        let request = TokenRequest {
            grant_type: Grant::Exchange.name(),
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            code: Some(code),
            redirect_uri: Some(redirect_uri),
            refresh_token: None,
        };
        self.request_tokens(Grant::Exchange, &request).await
    }

    /// Obtain a new access token with a refresh token.
    ///
    /// `refresh_token` in the result is `Some` only if the provider rotated it.
    pub async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens, SessionError> {
        let request = TokenRequest {
            grant_type: Grant::Refresh.name(),
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            code: None,
            redirect_uri: None,
            refresh_token: Some(refresh_token),
        };
        self.request_tokens(Grant::Refresh, &request).await
    }

    /// Fetch the profile behind `access_token` from the provider.
    pub async fn user_profile(&self, access_token: &str) -> Result<UserProfile, SessionError> {
        let profile_error = |fault, description: &str| SessionError::Profile {
            fault,
            description: description.to_string(),
        };

        let response = self
            .client
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Userinfo request failed");
                profile_error(Fault::Provider, "Identity provider is unreachable")
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "Userinfo endpoint rejected request");
            let fault = if status.is_client_error() {
                Fault::Client
            } else {
                Fault::Provider
            };
            return Err(profile_error(fault, "Failed to fetch user info"));
        }

        response.json().await.map_err(|e| {
            warn!(error = %e, "Userinfo endpoint returned an invalid body");
            profile_error(Fault::Provider, "Identity provider returned an invalid response")
        })
    }

    /// Provider logout URL. Built, never called.
    pub fn logout_url(&self) -> String {
        self.logout_url.to_string()
    }

    async fn request_tokens(
        &self,
        grant: Grant,
        request: &TokenRequest<'_>,
    ) -> Result<SessionTokens, SessionError> {
        let response = self
            .client
            .post(&self.token_url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                warn!(grant = grant.name(), error = %e, "Token endpoint request failed");
                grant.error(Fault::Provider, "Identity provider is unreachable")
            })?;

        let status = response.status();
        if !status.is_success() {
            let body: ProviderErrorBody = response.json().await.unwrap_or_default();
            warn!(
                grant = grant.name(),
                status = %status,
                provider_error = body.error.as_deref().unwrap_or("unknown"),
                "Token endpoint rejected request"
            );
            let fault = if status.is_client_error() {
                Fault::Client
            } else {
                Fault::Provider
            };
            let description = body
                .error_description
                .or(body.error)
                .unwrap_or_else(|| format!("Identity provider returned HTTP {}", status.as_u16()));
            return Err(grant.error(fault, description));
        }

        let tokens: TokenResponse = response.json().await.map_err(|e| {
            warn!(grant = grant.name(), error = %e, "Token endpoint returned an invalid body");
            grant.error(Fault::Provider, "Identity provider returned an invalid response")
        })?;

        if tokens.access_token.is_empty() {
            warn!(grant = grant.name(), "Token endpoint returned an empty access token");
            return Err(grant.error(
                Fault::Provider,
                "Identity provider returned an invalid response",
            ));
        }

        let refresh_token = tokens.refresh_token.filter(|t| !t.is_empty());
        // Tokens end up in Set-Cookie headers.
        let unsafe_token = !is_cookie_safe(&tokens.access_token)
            || refresh_token.as_deref().is_some_and(|t| !is_cookie_safe(t));
        if unsafe_token {
            warn!(grant = grant.name(), "Token endpoint returned a token unfit for a cookie");
            return Err(grant.error(
                Fault::Provider,
                "Identity provider returned an invalid response",
            ));
        }

        let now = Utc::now();
        let refresh_expires_at = refresh_token
            .as_ref()
            .map(|_| expires_after(now, self.refresh_token_max_age));
        Ok(SessionTokens {
            access_token: tokens.access_token,
            refresh_token,
            access_expires_at: expires_after(now, self.access_token_max_age),
            refresh_expires_at,
        })
    }
}

impl std::fmt::Debug for SessionBootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBootstrap")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish_non_exhaustive()
    }
}

fn expires_after(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(window)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
