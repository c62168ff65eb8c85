// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account Auth Server - identity verification for the account backend
//!
//! Verifies Auth0-issued bearer tokens against the provider's published
//! signing keys, gates requests on role claims, and bootstraps browser
//! sessions through the OAuth authorization-code and refresh flows.
//!
//! ## Modules
//!
//! - `auth` - Key set cache, token verifier, authorization gate, session bootstrap
//! - `api` - HTTP handlers (Axum) for login, callback, refresh, logout and health
//! - `config` - Environment configuration
//! - `logging` - Tracing subscriber setup

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod state;
