// yo9gag - Yo a random hot 9GAG link back to whoever Yos the account
//
// Two components share one Redis:
// - Server: answers Yo webhook callbacks with a random link from the
//   candidate set, records subscribers and daily statistics
// - Uploader: one-shot refresh of the candidate set from the 9GAG hot
//   listing, broadcasting links that cross the vote threshold
//
// Features:
// - Axum HTTP server with graceful shutdown
// - Redis or in-memory store
// - Structured logging with tracing

use anyhow::{Context, Result};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use yo9gag_config::RuntimeConfig;

pub mod error;
mod handlers;
mod init;
pub mod notify;
pub mod popular;
pub mod ranking;
pub mod refresh;
pub mod stats;
pub mod store;

pub use handlers::normalize_username;
pub use init::{init_store, init_tracing, log_config_warnings};

use handlers::{handle_yo, health_check};
use notify::{Notifier, YoClient};
use ranking::RankingFetcher;
use refresh::run_refresh;
use store::LinkStore;

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    pub store: LinkStore,
    pub notifier: Arc<dyn Notifier>,
    /// Expected candidate set size, used as a diagnostic cross-check
    pub target_count: usize,
}

impl AppState {
    pub fn new(store: LinkStore, notifier: Arc<dyn Notifier>, target_count: usize) -> Self {
        Self {
            store,
            notifier,
            target_count,
        }
    }
}

/// Error type that implements IntoResponse
pub(crate) struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("Request error: {:?}", self.error);
        (
            self.status,
            Json(json!({
                "error": self.error.to_string(),
            })),
        )
            .into_response()
    }
}

impl AppError {
    pub fn bad_request<E>(error: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: error.into(),
        }
    }
}

/// Build the webhook router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/yo", get(handle_yo))
        .route("/yo/", get(handle_yo))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}

/// Run the webhook server until Ctrl+C or SIGTERM
pub async fn run_server(config: RuntimeConfig) -> Result<()> {
    init_tracing(&config.log);
    log_config_warnings(&config);

    let addr = config
        .server
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("server config required"))?
        .listen_addr
        .clone();
    info!(listen_addr = %addr, "Webhook server starting");

    // A bad token is fatal before anything else is touched
    let notifier: Arc<dyn Notifier> =
        Arc::new(YoClient::new(&config.yo).context("Invalid Yo API configuration")?);
    let store = init_store(&config.store).await?;

    let state = AppState::new(store.clone(), notifier, config.ranking.target_count);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context(format!("Failed to bind to {}", addr))?;

    info!("Yo webhook endpoint listening on http://{}", addr);
    info!("Routes:");
    info!("  GET http://{}/yo/    - Yo callback", addr);
    info!("  GET http://{}/health - Health check", addr);
    info!("Press Ctrl+C or send SIGTERM to stop");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Err(e) = store.close().await {
        warn!(error = %e, "Failed to disconnect from the store");
    }
    info!("Server shutdown complete");

    Ok(())
}

/// Run a single refresh cycle, disconnect, and return its outcome
pub async fn run_uploader(config: RuntimeConfig) -> Result<()> {
    init_tracing(&config.log);
    log_config_warnings(&config);
    info!("Uploader starts");

    let notifier: Arc<dyn Notifier> =
        Arc::new(YoClient::new(&config.yo).context("Invalid Yo API configuration")?);
    let fetcher = RankingFetcher::new(&config.ranking)?;
    let store = init_store(&config.store).await?;

    info!(
        ranking_api = %config.ranking.api_url,
        target_count = config.ranking.target_count,
        popular_votes = config.ranking.popular_votes,
        "Refreshing candidate links"
    );

    let result = run_refresh(&fetcher, &store, notifier, config.yo.broadcast_delay()).await;

    if let Err(e) = store.close().await {
        warn!(error = %e, "Failed to disconnect from the store");
    }

    match result {
        Ok(report) => {
            info!(
                links = report.links.len(),
                cardinality = report.replace.cardinality,
                broadcasts = report.broadcasts.sent,
                "Uploader done"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Refresh cycle failed");
            Err(e).context("Refresh cycle failed")
        }
    }
}
