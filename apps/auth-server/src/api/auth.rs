// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Login, callback, refresh, logout and current-user handlers.
//!
//! Handlers only move tokens between [`SessionBootstrap`](crate::auth::SessionBootstrap)
//! and the session cookies; all verification lives in [`crate::auth`].

use axum::{
    extract::{Query, State},
    http::{header::SET_COOKIE, HeaderMap, HeaderName},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::cookies::{
    clear_cookie, clear_session_cookies, read_cookie, set_cookie, AUTH_STATE_COOKIE,
    AUTH_STATE_MAX_AGE, REFRESH_TOKEN_COOKIE,
};
use crate::auth::extractor::bearer_token;
use crate::auth::{Auth, AuthError};
use crate::error::{ApiError, ErrorBody};
use crate::state::AppState;

/// Query parameters the provider appends to the callback URL.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set instead of `code` when the login failed at the provider
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LogoutResponse {
    pub status: String,
    /// Provider logout URL; the browser should navigate here next
    pub logout_url: String,
}

/// Identity of the verified caller, merged with the provider profile.
#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Display name; falls back to the email address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    pub email_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    pub roles: Vec<String>,
    /// Token expiry (Unix timestamp)
    pub expires_at: i64,
}

fn set_cookies(cookies: impl IntoIterator<Item = String>) -> AppendHeaders<Vec<(HeaderName, String)>> {
    AppendHeaders(cookies.into_iter().map(|c| (SET_COOKIE, c)).collect())
}

/// Redirect to the provider's login page.
#[utoipa::path(
    get,
    path = "/api/auth/login",
    tag = "Auth",
    responses(
        (status = 307, description = "Redirect to the identity provider")
    )
)]
pub async fn login(State(state): State<AppState>) -> Response {
    let login_state = Uuid::new_v4().to_string();
    let url = state.session.authorize_url(&state.callback_url, &login_state);

    (
        set_cookies([set_cookie(AUTH_STATE_COOKIE, &login_state, AUTH_STATE_MAX_AGE)]),
        Redirect::temporary(&url),
    )
        .into_response()
}

/// Complete the login: exchange the code, store the session cookies and send
/// the browser to the landing page.
#[utoipa::path(
    get,
    path = "/api/auth/callback",
    tag = "Auth",
    params(CallbackParams),
    responses(
        (status = 307, description = "Session established, redirect to landing page"),
        (status = 400, description = "Invalid state or rejected code", body = ErrorBody),
        (status = 502, description = "Identity provider failure", body = ErrorBody)
    )
)]
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
    headers: HeaderMap,
) -> Response {
    match complete_login(&state, params, &headers).await {
        Ok(response) => response,
        // The pending login is over either way.
        Err(e) => (set_cookies([clear_cookie(AUTH_STATE_COOKIE)]), e).into_response(),
    }
}

async fn complete_login(
    state: &AppState,
    params: CallbackParams,
    headers: &HeaderMap,
) -> Result<Response, ApiError> {
    if let Some(error) = params.error {
        warn!(provider_error = %error, "Login failed at identity provider");
        return Err(ApiError::bad_request(
            "login_failed",
            params
                .error_description
                .unwrap_or_else(|| "Login failed at the identity provider".to_string()),
        ));
    }

    let expected = read_cookie(headers, AUTH_STATE_COOKIE);
    match (expected, params.state.as_deref()) {
        (Some(expected), Some(received)) if expected == received => {}
        _ => return Err(ApiError::invalid_login_state()),
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::bad_request("missing_code", "Authorization code is missing"))?;

    let tokens = state.session.exchange_code(&code, &state.callback_url).await?;
    info!("User logged in");

    let mut cookies = state.cookies.session_cookies(&tokens);
    cookies.push(clear_cookie(AUTH_STATE_COOKIE));

    Ok((set_cookies(cookies), Redirect::temporary(&state.landing_url)).into_response())
}

/// Exchange the refresh token cookie for a new access token.
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "Auth",
    responses(
        (status = 200, description = "Session refreshed", body = StatusResponse),
        (status = 400, description = "Refresh token rejected", body = ErrorBody),
        (status = 401, description = "No refresh token", body = ErrorBody),
        (status = 502, description = "Identity provider failure", body = ErrorBody)
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let refresh_token = read_cookie(&headers, REFRESH_TOKEN_COOKIE).ok_or(AuthError::MissingToken)?;
    let tokens = state.session.refresh(refresh_token).await?;

    Ok((
        set_cookies(state.cookies.session_cookies(&tokens)),
        Json(StatusResponse {
            status: "success".to_string(),
        }),
    )
        .into_response())
}

/// Clear the session cookies and return the provider logout URL.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    responses(
        (status = 200, description = "Session cleared", body = LogoutResponse)
    )
)]
pub async fn logout(State(state): State<AppState>) -> Response {
    (
        set_cookies(clear_session_cookies()),
        Json(LogoutResponse {
            status: "success".to_string(),
            logout_url: state.session.logout_url(),
        }),
    )
        .into_response()
}

/// Current caller's verified identity and provider profile.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Verified identity", body = MeResponse),
        (status = 400, description = "Profile lookup rejected", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 502, description = "Identity provider failure", body = ErrorBody)
    ),
    security(("bearer_auth" = []))
)]
pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
    Auth(claims): Auth,
) -> Result<Json<MeResponse>, ApiError> {
    let token = bearer_token(&headers)?;
    let profile = state.session.user_profile(token).await?;

    let email = claims.email().map(str::to_string).or(profile.email);
    Ok(Json(MeResponse {
        subject: claims.subject().to_string(),
        name: profile.name.or_else(|| email.clone()),
        email,
        picture: profile.picture,
        email_verified: profile.email_verified,
        updated_at: profile.updated_at,
        roles: claims.roles().to_vec(),
        expires_at: claims.expires_at(),
    }))
}
