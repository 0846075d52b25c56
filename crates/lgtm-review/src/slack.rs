use std::fmt::Write as _;

use async_trait::async_trait;
use lgtm_core::{Assessment, LgtmError, PullRequestData, ReviewResult, SlackConfig};
use serde::Deserialize;
use tracing::info;

use crate::pipeline::ReviewNotifier;

/// Slack `chat.postMessage` answers 200 even on failure; `ok` tells.
#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    error: Option<String>,
}

/// Posts review summaries to a Slack channel through the Web API.
pub struct SlackNotifier {
    client: reqwest::Client,
    token: String,
    channel: String,
    api_base: String,
}

impl SlackNotifier {
    /// Create a notifier from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LgtmError::Config`] if the bot token or channel is missing.
    ///
    /// # Examples
    ///
    /// ```
    /// use lgtm_core::SlackConfig;
    /// use lgtm_review::slack::SlackNotifier;
    ///
    /// assert!(SlackNotifier::new(&SlackConfig::default()).is_err());
    ///
    /// let config = SlackConfig {
    ///     bot_token: Some("xoxb-test".into()),
    ///     channel: Some("#code-review".into()),
    ///     ..SlackConfig::default()
    /// };
    /// assert!(SlackNotifier::new(&config).is_ok());
    /// ```
    pub fn new(config: &SlackConfig) -> Result<Self, LgtmError> {
        let token = config.bot_token.clone().ok_or_else(|| {
            LgtmError::Config("Slack bot token not set. Set slack.bot_token or SLACK_BOT_TOKEN".into())
        })?;
        let channel = config.channel.clone().ok_or_else(|| {
            LgtmError::Config("Slack channel not set. Set slack.channel or SLACK_CHANNEL".into())
        })?;
        Ok(Self {
            client: reqwest::Client::new(),
            token,
            channel,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Post the review of `pr` to the configured channel.
    ///
    /// # Errors
    ///
    /// Returns [`LgtmError::Notify`] on transport errors or when Slack
    /// answers `ok: false`.
    pub async fn post_review(
        &self,
        pr: &PullRequestData,
        review: &ReviewResult,
    ) -> Result<(), LgtmError> {
        let url = format!("{}/chat.postMessage", self.api_base);
        let message = build_review_message(&self.channel, pr, review);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&message)
            .send()
            .await
            .map_err(|e| LgtmError::Notify(format!("Slack request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LgtmError::Notify(format!("Slack API error {status}: {body}")));
        }

        let body: SlackResponse = response
            .json()
            .await
            .map_err(|e| LgtmError::Notify(format!("failed to parse Slack response: {e}")))?;
        if !body.ok {
            return Err(LgtmError::Notify(format!(
                "Slack rejected the message: {}",
                body.error.as_deref().unwrap_or("unknown error")
            )));
        }

        info!(pr = pr.number, channel = %self.channel, "review posted to Slack");
        Ok(())
    }
}

#[async_trait]
impl ReviewNotifier for SlackNotifier {
    async fn send_review(
        &self,
        pr: &PullRequestData,
        review: &ReviewResult,
    ) -> Result<(), LgtmError> {
        self.post_review(pr, review).await
    }
}

fn assessment_emoji(assessment: Assessment) -> &'static str {
    match assessment {
        Assessment::Approve => ":white_check_mark:",
        Assessment::RequestChanges => ":x:",
        Assessment::Comment => ":speech_balloon:",
    }
}

/// Build the `chat.postMessage` payload for a review.
///
/// `text` carries a plain fallback for notifications; `blocks` holds the
/// formatted message.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use lgtm_core::{Assessment, PullRequestData, ReviewResult};
/// use lgtm_review::slack::build_review_message;
///
/// let pr = PullRequestData {
///     id: 1,
///     number: 12,
///     title: "Add retries".into(),
///     body: String::new(),
///     author: "dev".into(),
///     branch: "retries".into(),
///     base_branch: "main".into(),
///     state: "open".into(),
///     url: "https://github.com/acme/api/pull/12".into(),
///     created_at: Utc::now(),
///     updated_at: Utc::now(),
/// };
/// let review = ReviewResult {
///     summary: "Adds retries".into(),
///     findings: vec![],
///     recommendations: vec![],
///     assessment: Assessment::Approve,
///     raw_review: String::new(),
/// };
/// let msg = build_review_message("#reviews", &pr, &review);
/// assert_eq!(msg["channel"], "#reviews");
/// assert!(msg["text"].as_str().unwrap().contains("PR #12"));
/// ```
pub fn build_review_message(
    channel: &str,
    pr: &PullRequestData,
    review: &ReviewResult,
) -> serde_json::Value {
    let text = format!(
        "Code review for PR #{}: {} ({})",
        pr.number, pr.title, review.assessment
    );

    let mut blocks = vec![
        serde_json::json!({
            "type": "header",
            "text": { "type": "plain_text", "text": format!("PR #{}: {}", pr.number, pr.title) },
        }),
        serde_json::json!({
            "type": "section",
            "fields": [
                { "type": "mrkdwn", "text": format!("*Author:*\n{}", pr.author) },
                { "type": "mrkdwn", "text": format!("*Branch:*\n{} → {}", pr.branch, pr.base_branch) },
                {
                    "type": "mrkdwn",
                    "text": format!("*Assessment:*\n{} {}", assessment_emoji(review.assessment), review.assessment),
                },
                { "type": "mrkdwn", "text": format!("*Findings:*\n{}", review.findings.len()) },
            ],
        }),
        serde_json::json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": format!("*Summary*\n{}", review.summary) },
        }),
    ];

    if !review.recommendations.is_empty() {
        let mut list = String::from("*Recommendations*\n");
        for rec in &review.recommendations {
            let _ = writeln!(list, "• {rec}");
        }
        blocks.push(serde_json::json!({
            "type": "section",
            "text": { "type": "mrkdwn", "text": list.trim_end() },
        }));
    }

    blocks.push(serde_json::json!({
        "type": "context",
        "elements": [{ "type": "mrkdwn", "text": format!("<{}|View pull request>", pr.url) }],
    }));

    serde_json::json!({
        "channel": channel,
        "text": text,
        "blocks": blocks,
    })
}
