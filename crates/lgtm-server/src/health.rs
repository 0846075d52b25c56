use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AppState;

/// `GET /health` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Always `ok` while the server is up.
    pub status: String,
    /// When the report was produced.
    pub timestamp: DateTime<Utc>,
    /// Per-integration status.
    pub services: ServiceStatus,
}

/// Status of each integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    /// `healthy` or `unhealthy`.
    pub ollama: String,
    /// `configured` or `not configured`.
    pub github: String,
    /// `configured` or `not configured`.
    pub slack: String,
}

/// `GET /health/ollama` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OllamaHealth {
    /// Always `ollama`.
    pub service: String,
    /// `healthy` or `unhealthy`.
    pub status: String,
    /// Configured server URL.
    pub base_url: String,
    /// Configured model.
    pub model: String,
}

fn healthy(ok: bool) -> String {
    if ok { "healthy" } else { "unhealthy" }.to_string()
}

fn configured(ok: bool) -> String {
    if ok { "configured" } else { "not configured" }.to_string()
}

/// `GET /health`
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthReport> {
    let ollama_ok = state.orchestrator.llm().check_health().await;
    Json(HealthReport {
        status: "ok".into(),
        timestamp: Utc::now(),
        services: ServiceStatus {
            ollama: healthy(ollama_ok),
            github: configured(state.services.github_configured),
            slack: configured(state.services.slack_configured),
        },
    })
}

/// `GET /health/ollama`
pub async fn ollama_health(State(state): State<Arc<AppState>>) -> Json<OllamaHealth> {
    let ok = state.orchestrator.llm().check_health().await;
    Json(OllamaHealth {
        service: "ollama".into(),
        status: healthy(ok),
        base_url: state.services.ollama_base_url.clone(),
        model: state.services.ollama_model.clone(),
    })
}
