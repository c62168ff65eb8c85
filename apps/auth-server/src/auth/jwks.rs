// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS (JSON Web Key Set) fetching and caching.
//!
//! ## Behaviour
//!
//! - The key set is fetched from `https://{domain}/.well-known/jwks.json`
//!   at startup ([`KeySetCache::initialize`]) or on first use.
//! - A lookup miss triggers exactly one refresh before failing with
//!   [`AuthError::KeyNotFound`]; this picks up keys the provider published
//!   after the last fetch.
//! - A failed fetch leaves the cache empty: every lookup fails with
//!   [`AuthError::KeySetUnavailable`] until a later refresh succeeds.
//! - There is no TTL. A key revoked after it was cached stays trusted until
//!   a miss causes a refresh.
//!
//! ## Concurrency
//!
//! The current set lives behind an [`ArcSwapOption`]. Readers take a
//! lock-free snapshot; a refresh builds a complete [`SigningKeySet`] first and
//! publishes it with a single store, so no reader ever observes a partially
//! populated set.
//!
//! Refreshes are single-flight. Misses that arrive while a fetch is in
//! progress wait for it and use its result instead of fetching again, and
//! refreshes publish in the order they started.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::error::AuthError;

/// Raw JWKS document as published by the provider.
#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<RawJwk>,
}

/// The subset of JWK fields needed for RS256 verification.
#[derive(Debug, Deserialize)]
struct RawJwk {
    #[serde(default)]
    kid: Option<String>,
    #[serde(default)]
    kty: Option<String>,
    #[serde(default, rename = "use")]
    use_: Option<String>,
    #[serde(default)]
    alg: Option<String>,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
}

#[derive(Debug, thiserror::Error)]
enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("HTTP {0} from JWKS endpoint")]
    Status(reqwest::StatusCode),

    #[error("invalid JWKS body: {0}")]
    Body(#[source] reqwest::Error),
}

/// Immutable mapping from key identifier to RSA verification key.
#[derive(Clone, Default)]
pub struct SigningKeySet {
    keys: HashMap<String, DecodingKey>,
}

impl SigningKeySet {
    fn from_document(document: JwksDocument) -> Self {
        let mut keys = HashMap::with_capacity(document.keys.len());
        for jwk in document.keys {
            let Some(kid) = jwk.kid else {
                continue;
            };
            if jwk.kty.as_deref() != Some("RSA") {
                continue;
            }
            if jwk.use_.as_deref().is_some_and(|u| u != "sig") {
                continue;
            }
            if jwk.alg.as_deref().is_some_and(|a| a != "RS256") {
                continue;
            }
            let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
                warn!(kid = %kid, "JWK is missing RSA components, skipping");
                continue;
            };
            match DecodingKey::from_rsa_components(n, e) {
                Ok(key) => {
                    keys.insert(kid, key);
                }
                Err(e) => warn!(kid = %kid, error = %e, "JWK has invalid RSA components, skipping"),
            }
        }
        Self { keys }
    }

    pub fn get(&self, kid: &str) -> Option<&DecodingKey> {
        self.keys.get(kid)
    }

    pub fn contains(&self, kid: &str) -> bool {
        self.keys.contains_key(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn key_ids(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for SigningKeySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeySet")
            .field("kids", &self.keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Process-wide cache of the identity provider's signing keys.
///
/// Construct once at startup and share through `AppState`.
pub struct KeySetCache {
    /// JWKS URL (identity provider endpoint)
    jwks_url: String,
    /// Current key set; `None` until the first successful fetch
    current: ArcSwapOption<SigningKeySet>,
    /// HTTP client (carries the configured timeout)
    client: reqwest::Client,
    /// Held for the duration of a fetch
    refresh_lock: Mutex<()>,
    /// Completed refresh attempts, successful or not
    generation: AtomicU64,
}

impl KeySetCache {
    /// Create an empty cache. No network call happens until
    /// [`initialize`](Self::initialize) or the first [`resolve`](Self::resolve).
    pub fn new(jwks_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            jwks_url: jwks_url.into(),
            current: ArcSwapOption::empty(),
            client,
            refresh_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// Get the JWKS URL.
    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Perform the initial fetch and return the number of usable keys.
    pub async fn initialize(&self) -> Result<usize, AuthError> {
        self.refresh().await.map(|set| set.len())
    }

    /// Whether a key set is currently held.
    pub fn is_populated(&self) -> bool {
        self.current.load().is_some()
    }

    /// Snapshot of the current key set.
    pub fn snapshot(&self) -> Option<Arc<SigningKeySet>> {
        self.current.load_full()
    }

    /// Re-fetch the full key set and swap it in.
    ///
    /// On failure the cache is emptied and `KeySetUnavailable` is returned.
    pub async fn refresh(&self) -> Result<Arc<SigningKeySet>, AuthError> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// Caller must hold `refresh_lock`.
    async fn refresh_locked(&self) -> Result<Arc<SigningKeySet>, AuthError> {
        let result = match self.fetch().await {
            Ok(set) => {
                info!(url = %self.jwks_url, keys = set.len(), "Fetched signing key set");
                let set = Arc::new(set);
                self.current.store(Some(Arc::clone(&set)));
                Ok(set)
            }
            Err(e) => {
                warn!(url = %self.jwks_url, error = %e, "Failed to fetch signing key set");
                self.current.store(None);
                Err(AuthError::KeySetUnavailable)
            }
        };
        self.generation.fetch_add(1, Ordering::AcqRel);
        result
    }

    /// Resolve the verification key for `kid`.
    ///
    /// A miss (or an empty cache) triggers one refresh; a second miss is final.
    /// If another refresh completes while this call waits for the lock, its
    /// result counts as this call's refresh.
    pub async fn resolve(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        let seen = self.generation.load(Ordering::Acquire);
        if let Some(set) = self.current.load_full() {
            if let Some(key) = set.get(kid) {
                return Ok(key.clone());
            }
        }

        let _guard = self.refresh_lock.lock().await;
        let set = if self.generation.load(Ordering::Acquire) == seen {
            info!(kid = %kid, "Signing key not in cached set, refreshing");
            self.refresh_locked().await?
        } else {
            debug!(kid = %kid, "Key set refreshed while waiting, reusing it");
            self.current.load_full().ok_or(AuthError::KeySetUnavailable)?
        };
        set.get(kid).cloned().ok_or(AuthError::KeyNotFound)
    }

    async fn fetch(&self) -> Result<SigningKeySet, FetchError> {
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(FetchError::Transport)?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }

        let document: JwksDocument = response.json().await.map_err(FetchError::Body)?;
        Ok(SigningKeySet::from_document(document))
    }
}
