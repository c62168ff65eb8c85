// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use tokio::net::TcpListener;
use tracing::{info, warn};

use account_auth_server::{api::router, config::Settings, logging::init_logging, state::AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    init_logging(settings.log_format);

    let state = AppState::from_settings(&settings)?;

    // Startup fetch is best-effort; the cache retries on first use.
    match state.keys.initialize().await {
        Ok(count) => info!(keys = count, jwks_url = %state.keys.jwks_url(), "Signing keys loaded"),
        Err(e) => warn!(error = %e, jwks_url = %state.keys.jwks_url(), "Signing keys unavailable at startup"),
    }

    let listener = TcpListener::bind((settings.host.as_str(), settings.port)).await?;
    info!(
        addr = %listener.local_addr()?,
        "Account auth server listening (docs at /docs)"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
