// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Local identity provider for tests.
//!
//! Serves a swappable JWKS (with a fetch counter), a scripted `/oauth/token`
//! endpoint and `/userinfo` on `127.0.0.1:0`, and mints RS256 tokens with the
//! fixture keys under `testdata/`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use super::jwks::KeySetCache;
use crate::config::{
    IdpSettings, DEFAULT_ACCESS_TOKEN_MAX_AGE, DEFAULT_IDP_TIMEOUT, DEFAULT_REFRESH_TOKEN_MAX_AGE,
};

pub(crate) const KEY_A_PEM: &str = include_str!("testdata/key_a.pem");
pub(crate) const KEY_A_N: &str = include_str!("testdata/key_a.n");
pub(crate) const KEY_B_PEM: &str = include_str!("testdata/key_b.pem");
pub(crate) const KEY_B_N: &str = include_str!("testdata/key_b.n");
pub(crate) const RSA_E: &str = "AQAB";

pub(crate) const AUDIENCE: &str = "https://accounts.example.com/api";
pub(crate) const SUBJECT: &str = "auth0|user-1";
pub(crate) const CLIENT_ID: &str = "test-client";
pub(crate) const CLIENT_SECRET: &str = "test-secret";

/// Authorization code the stub exchanges successfully.
pub(crate) const VALID_CODE: &str = "valid-code";
/// Authorization code that succeeds without a refresh token.
pub(crate) const CODE_WITHOUT_REFRESH: &str = "no-refresh-code";
/// Authorization code that makes the stub answer 500.
pub(crate) const CODE_SERVER_ERROR: &str = "server-error";
/// Authorization code answered with a refresh token unfit for a cookie.
pub(crate) const CODE_UNSAFE_REFRESH: &str = "unsafe-refresh-code";
/// Refresh token accepted without rotation.
pub(crate) const VALID_REFRESH: &str = "refresh-1";
/// Refresh token accepted and rotated to [`ROTATED_REFRESH`].
pub(crate) const ROTATING_REFRESH: &str = "refresh-rotating";
pub(crate) const ROTATED_REFRESH: &str = "refresh-2";

pub(crate) fn jwk(kid: &str, n: &str) -> Value {
    json!({ "kty": "RSA", "kid": kid, "use": "sig", "alg": "RS256", "n": n, "e": RSA_E })
}

pub(crate) fn jwks(keys: &[(&str, &str)]) -> Value {
    json!({ "keys": keys.iter().map(|(kid, n)| jwk(kid, n)).collect::<Vec<_>>() })
}

pub(crate) fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Claims for a token that passes every check against `issuer`.
pub(crate) fn standard_claims(issuer: &str, roles: &[&str]) -> Value {
    let now = now();
    json!({
        "iss": issuer,
        "sub": SUBJECT,
        "aud": [AUDIENCE, format!("{issuer}userinfo")],
        "iat": now,
        "exp": now + 300,
        "email": "user-1@example.com",
        "permissions": roles,
    })
}

pub(crate) fn mint(pem: &str, kid: Option<&str>, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    encode(
        &header,
        claims,
        &EncodingKey::from_rsa_pem(pem.as_bytes()).expect("fixture key"),
    )
    .expect("token")
}

/// Replace the header segment of `token` with `header`, keeping the rest.
pub(crate) fn with_header(token: &str, header: &Value) -> String {
    let (_, rest) = token.split_once('.').expect("jwt");
    let encoded = URL_SAFE_NO_PAD.encode(serde_json::to_vec(header).expect("header"));
    format!("{encoded}.{rest}")
}

#[derive(Clone)]
struct StubState {
    issuer: String,
    jwks: Arc<Mutex<(StatusCode, Value)>>,
    jwks_fetches: Arc<AtomicUsize>,
    jwks_delay: Arc<Mutex<Duration>>,
    token_requests: Arc<Mutex<Vec<Value>>>,
    userinfo_status: Arc<Mutex<StatusCode>>,
    userinfo_requests: Arc<AtomicUsize>,
}

pub(crate) struct StubIdp {
    addr: SocketAddr,
    state: StubState,
    _handle: JoinHandle<()>,
}

impl StubIdp {
    pub(crate) async fn start(jwks: Value) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let state = StubState {
            issuer: format!("http://{addr}/"),
            jwks: Arc::new(Mutex::new((StatusCode::OK, jwks))),
            jwks_fetches: Arc::new(AtomicUsize::new(0)),
            jwks_delay: Arc::new(Mutex::new(Duration::ZERO)),
            token_requests: Arc::new(Mutex::new(Vec::new())),
            userinfo_status: Arc::new(Mutex::new(StatusCode::OK)),
            userinfo_requests: Arc::new(AtomicUsize::new(0)),
        };

        let app = Router::new()
            .route("/.well-known/jwks.json", get(serve_jwks))
            .route("/oauth/token", post(serve_token))
            .route("/userinfo", get(serve_userinfo))
            .with_state(state.clone());
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            state,
            _handle: handle,
        }
    }

    /// Value to configure as the identity provider domain.
    pub(crate) fn domain(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub(crate) fn issuer(&self) -> String {
        self.state.issuer.clone()
    }

    pub(crate) fn jwks_url(&self) -> String {
        format!("http://{}/.well-known/jwks.json", self.addr)
    }

    pub(crate) fn key_set_cache(&self) -> KeySetCache {
        KeySetCache::new(self.jwks_url(), reqwest::Client::new())
    }

    /// Settings pointing every identity provider URL at this stub.
    pub(crate) fn idp_settings(&self) -> IdpSettings {
        IdpSettings {
            domain: self.domain(),
            audience: AUDIENCE.to_string(),
            client_id: CLIENT_ID.to_string(),
            client_secret: CLIENT_SECRET.to_string(),
            roles_claim: "permissions".to_string(),
            http_timeout: DEFAULT_IDP_TIMEOUT,
            clock_skew_secs: 0,
            access_token_max_age: DEFAULT_ACCESS_TOKEN_MAX_AGE,
            refresh_token_max_age: DEFAULT_REFRESH_TOKEN_MAX_AGE,
        }
    }

    pub(crate) fn jwks_fetches(&self) -> usize {
        self.state.jwks_fetches.load(Ordering::SeqCst)
    }

    pub(crate) fn set_jwks(&self, jwks: Value) {
        *self.state.jwks.lock().unwrap() = (StatusCode::OK, jwks);
    }

    pub(crate) fn fail_jwks(&self, status: StatusCode) {
        *self.state.jwks.lock().unwrap() = (status, json!({ "error": "unavailable" }));
    }

    /// Hold every JWKS response for `delay` before answering.
    pub(crate) fn delay_jwks(&self, delay: Duration) {
        *self.state.jwks_delay.lock().unwrap() = delay;
    }

    /// Bodies received by `/oauth/token`, in order.
    pub(crate) fn token_requests(&self) -> Vec<Value> {
        self.state.token_requests.lock().unwrap().clone()
    }

    pub(crate) fn fail_userinfo(&self, status: StatusCode) {
        *self.state.userinfo_status.lock().unwrap() = status;
    }

    pub(crate) fn userinfo_requests(&self) -> usize {
        self.state.userinfo_requests.load(Ordering::SeqCst)
    }
}

async fn serve_jwks(State(state): State<StubState>) -> (StatusCode, Json<Value>) {
    state.jwks_fetches.fetch_add(1, Ordering::SeqCst);
    let delay = *state.jwks_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    let (status, body) = state.jwks.lock().unwrap().clone();
    (status, Json(body))
}

async fn serve_userinfo(
    State(state): State<StubState>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    state.userinfo_requests.fetch_add(1, Ordering::SeqCst);

    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if bearer.is_none_or(str::is_empty) {
        return oauth_error(StatusCode::UNAUTHORIZED, "invalid_token", "Missing access token");
    }

    let status = *state.userinfo_status.lock().unwrap();
    if status != StatusCode::OK {
        return oauth_error(status, "server_error", "Profile lookup failed");
    }

    (
        StatusCode::OK,
        Json(json!({
            "sub": SUBJECT,
            "email": "user-1@example.com",
            "email_verified": true,
            "picture": "https://cdn.example.com/user-1.png",
            "updated_at": "2026-01-02T03:04:05.000Z"
        })),
    )
}

async fn serve_token(
    State(state): State<StubState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.token_requests.lock().unwrap().push(body.clone());

    if body["client_id"] != CLIENT_ID || body["client_secret"] != CLIENT_SECRET {
        return oauth_error(StatusCode::UNAUTHORIZED, "access_denied", "Unauthorized");
    }

    let access_token = || {
        mint(
            KEY_A_PEM,
            Some("A"),
            &standard_claims(&state.issuer, &["read:profile"]),
        )
    };

    match (body["grant_type"].as_str(), body["code"].as_str(), body["refresh_token"].as_str()) {
        (Some("authorization_code"), Some(VALID_CODE), _) => (
            StatusCode::OK,
            Json(json!({
                "access_token": access_token(),
                "refresh_token": VALID_REFRESH,
                "expires_in": 86400,
                "token_type": "Bearer"
            })),
        ),
        (Some("authorization_code"), Some(CODE_WITHOUT_REFRESH), _) => (
            StatusCode::OK,
            Json(json!({ "access_token": access_token(), "expires_in": 86400, "token_type": "Bearer" })),
        ),
        (Some("authorization_code"), Some(CODE_UNSAFE_REFRESH), _) => (
            StatusCode::OK,
            Json(json!({
                "access_token": access_token(),
                "refresh_token": "r1; Domain=evil.example.com",
                "expires_in": 86400,
                "token_type": "Bearer"
            })),
        ),
        (Some("authorization_code"), Some(CODE_SERVER_ERROR), _) => oauth_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "server_error",
            "Upstream exploded",
        ),
        (Some("authorization_code"), _, _) => oauth_error(
            StatusCode::FORBIDDEN,
            "invalid_grant",
            "Invalid authorization code",
        ),
        (Some("refresh_token"), _, Some(VALID_REFRESH)) => (
            StatusCode::OK,
            Json(json!({ "access_token": access_token(), "expires_in": 86400, "token_type": "Bearer" })),
        ),
        (Some("refresh_token"), _, Some(ROTATING_REFRESH)) => (
            StatusCode::OK,
            Json(json!({
                "access_token": access_token(),
                "refresh_token": ROTATED_REFRESH,
                "expires_in": 86400,
                "token_type": "Bearer"
            })),
        ),
        (Some("refresh_token"), _, _) => oauth_error(
            StatusCode::FORBIDDEN,
            "invalid_grant",
            "Unknown or invalid refresh token.",
        ),
        _ => oauth_error(
            StatusCode::BAD_REQUEST,
            "unsupported_grant_type",
            "Unsupported grant type",
        ),
    }
}

fn oauth_error(status: StatusCode, error: &str, description: &str) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({ "error": error, "error_description": description })),
    )
}
