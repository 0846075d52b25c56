//! HTTP trigger surface for the reviewer.
//!
//! Routes:
//! - `POST /webhook/github`: GitHub deliveries, reviews run in the background
//! - `POST /webhook/manual-review`: `{"prNumber": n}`, waits for the review
//! - `GET /health`, `GET /health/ollama`

pub mod health;
pub mod signature;
pub mod webhook;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use lgtm_core::{LgtmConfig, LgtmError, ServerConfig};
use lgtm_review::pipeline::ReviewOrchestrator;
use tracing::info;

/// Static facts about the configured integrations, reported by `/health`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceInfo {
    /// A GitHub token is available.
    pub github_configured: bool,
    /// Slack token and channel are set.
    pub slack_configured: bool,
    /// Ollama server URL.
    pub ollama_base_url: String,
    /// Ollama model.
    pub ollama_model: String,
}

impl ServiceInfo {
    /// Derive the service facts from configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use lgtm_core::LgtmConfig;
    /// use lgtm_server::ServiceInfo;
    ///
    /// let info = ServiceInfo::from_config(&LgtmConfig::default());
    /// assert!(!info.slack_configured);
    /// assert_eq!(info.ollama_model, "llama2");
    /// ```
    pub fn from_config(config: &LgtmConfig) -> Self {
        Self {
            github_configured: config.github.token.is_some(),
            slack_configured: config.slack.is_configured(),
            ollama_base_url: config.llm.base_url.clone(),
            ollama_model: config.llm.model.clone(),
        }
    }
}

/// Shared state for all HTTP handlers.
pub struct AppState {
    /// Runs reviews.
    pub orchestrator: Arc<ReviewOrchestrator>,
    /// Listener and webhook settings.
    pub server: ServerConfig,
    /// Integration facts for health reports.
    pub services: ServiceInfo,
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook/github", post(webhook::github_webhook))
        .route("/webhook/manual-review", post(webhook::manual_review))
        .route("/health", get(health::health))
        .route("/health/ollama", get(health::ollama_health))
        .with_state(state)
}

/// Serve on `state.server.address` until Ctrl+C.
///
/// # Errors
///
/// Returns [`LgtmError::Io`] if the address cannot be bound or the server
/// fails.
pub async fn run_server(state: Arc<AppState>) -> Result<(), LgtmError> {
    let address = state.server.address.clone();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(address = %address, "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
