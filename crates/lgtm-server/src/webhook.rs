use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use lgtm_core::LgtmError;
use lgtm_review::pipeline::ReviewOrchestrator;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::signature::{check_delivery, SIGNATURE_HEADER};
use crate::AppState;

/// Header naming the GitHub event type.
pub const EVENT_HEADER: &str = "x-github-event";

/// Pull request actions that start a review.
pub const REVIEW_ACTIONS: [&str; 3] = ["opened", "synchronize", "reopened"];

/// Body of every webhook response. The HTTP status is always 200.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookResponse {
    /// `success` or `error`.
    pub status: String,
    /// Human-readable detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl WebhookResponse {
    fn success(message: Option<String>) -> Self {
        Self {
            status: "success".into(),
            message,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".into(),
            message: Some(message.into()),
        }
    }
}

/// Body of `POST /webhook/manual-review`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualReviewRequest {
    /// Pull request to review.
    pub pr_number: u64,
}

#[derive(Debug, Deserialize)]
struct PullRequestEvent {
    #[serde(default)]
    action: String,
    pull_request: Option<EventPullRequest>,
}

#[derive(Debug, Deserialize)]
struct EventPullRequest {
    number: u64,
}

/// Whether a `pull_request` action should trigger a review.
///
/// # Examples
///
/// ```
/// use lgtm_server::webhook::should_review;
///
/// assert!(should_review("synchronize"));
/// assert!(!should_review("closed"));
/// ```
pub fn should_review(action: &str) -> bool {
    REVIEW_ACTIONS.contains(&action)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// `POST /webhook/github`
///
/// Verifies the delivery (per `server.verify_signatures`) and starts a
/// background review for qualifying pull request events. Responds before the
/// review finishes.
#[instrument(skip_all)]
pub async fn github_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<WebhookResponse> {
    let event = header_str(&headers, EVENT_HEADER).unwrap_or_default();
    info!(event, "received GitHub webhook");

    match handle_delivery(&state, event, header_str(&headers, SIGNATURE_HEADER), &body) {
        Ok(()) => Json(WebhookResponse::success(None)),
        Err(e) => {
            error!(error = %e, "failed to handle webhook");
            Json(WebhookResponse::error(e.to_string()))
        }
    }
}

fn handle_delivery(
    state: &AppState,
    event: &str,
    signature: Option<&str>,
    body: &[u8],
) -> Result<(), LgtmError> {
    check_delivery(&state.server, body, signature)?;
    if event != "pull_request" {
        return Ok(());
    }

    let payload: PullRequestEvent = serde_json::from_slice(body)?;
    let number = payload.pull_request.map(|pr| pr.number);
    info!(action = %payload.action, pr = ?number, "pull request event");

    if should_review(&payload.action) {
        let number = number.ok_or_else(|| {
            LgtmError::Webhook("pull_request event without a pull request number".into())
        })?;
        spawn_review(state.orchestrator.clone(), number);
    }
    Ok(())
}

fn spawn_review(orchestrator: Arc<ReviewOrchestrator>, number: u64) {
    info!(pr = number, "triggering review");
    tokio::spawn(async move {
        // Failures are already logged by the orchestrator.
        let _ = orchestrator.review_pull_request(number).await;
    });
}

/// `POST /webhook/manual-review`
///
/// Runs a review and waits for it to finish.
#[instrument(skip_all)]
pub async fn manual_review(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ManualReviewRequest>, JsonRejection>,
) -> Json<WebhookResponse> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            error!(error = %rejection, "invalid manual review request");
            return Json(WebhookResponse::error(rejection.body_text()));
        }
    };
    let number = request.pr_number;
    info!(pr = number, "manual review triggered");

    match state.orchestrator.review_pull_request(number).await {
        Ok(_) => Json(WebhookResponse::success(Some(format!(
            "Review completed for PR #{number}"
        )))),
        Err(e) => Json(WebhookResponse::error(e.to_string())),
    }
}
