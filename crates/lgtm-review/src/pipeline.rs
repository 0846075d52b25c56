//! Review orchestration: fetch, prompt, generate, parse, publish.

use std::sync::Arc;

use async_trait::async_trait;
use lgtm_core::{FileChange, LgtmError, PullRequestData, ReviewConfig, ReviewResult};
use tracing::{error, info, instrument, warn};

use crate::assessment::review_label;
use crate::llm::GenerateOptions;
use crate::parser::{parse_review_response, ParseOptions};
use crate::prompt::{build_review_prompt, truncate_diff, PromptFields, REVIEW_PROMPT_TEMPLATE};

/// Where pull requests come from and where review output goes back to.
#[async_trait]
pub trait PullRequestSource: Send + Sync {
    /// Pull request metadata.
    async fn fetch_pull_request(&self, number: u64) -> Result<PullRequestData, LgtmError>;
    /// Files touched by the pull request.
    async fn fetch_changed_files(&self, number: u64) -> Result<Vec<FileChange>, LgtmError>;
    /// Unified diff of the pull request.
    async fn fetch_diff(&self, number: u64) -> Result<String, LgtmError>;
    /// Publish the review text on the pull request.
    async fn post_review_comment(&self, number: u64, body: &str) -> Result<(), LgtmError>;
    /// Attach a label to the pull request.
    async fn add_label(&self, number: u64, label: &str) -> Result<(), LgtmError>;
}

/// A text-completion model.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Complete `prompt`.
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, LgtmError>;
    /// Whether the model server is reachable. Never fails.
    async fn check_health(&self) -> bool;
}

/// Receives finished reviews, e.g. a chat channel.
#[async_trait]
pub trait ReviewNotifier: Send + Sync {
    /// Announce `review` of `pr`.
    async fn send_review(&self, pr: &PullRequestData, review: &ReviewResult)
        -> Result<(), LgtmError>;
}

/// Notifier that only writes a log line; used when Slack is not configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl ReviewNotifier for LogNotifier {
    async fn send_review(
        &self,
        pr: &PullRequestData,
        review: &ReviewResult,
    ) -> Result<(), LgtmError> {
        info!(
            pr = pr.number,
            title = %pr.title,
            assessment = %review.assessment,
            findings = review.findings.len(),
            "review complete (no notifier configured)"
        );
        Ok(())
    }
}

/// Runs one review end to end.
///
/// Steps run strictly in sequence: fetch pull request, changed files and
/// diff; build the prompt; generate; parse; post the raw review as a
/// comment; notify; label. Any failure before labelling aborts the review
/// and is returned. Label failures are logged and ignored.
pub struct ReviewOrchestrator {
    source: Arc<dyn PullRequestSource>,
    llm: Arc<dyn TextGenerator>,
    notifier: Arc<dyn ReviewNotifier>,
    config: ReviewConfig,
    temperature: f32,
}

impl ReviewOrchestrator {
    /// Wire the orchestrator to its collaborators.
    pub fn new(
        source: Arc<dyn PullRequestSource>,
        llm: Arc<dyn TextGenerator>,
        notifier: Arc<dyn ReviewNotifier>,
        config: ReviewConfig,
        temperature: f32,
    ) -> Self {
        Self {
            source,
            llm,
            notifier,
            config,
            temperature,
        }
    }

    /// The model used for reviews.
    pub fn llm(&self) -> &Arc<dyn TextGenerator> {
        &self.llm
    }

    /// Review pull request `number` and publish the outcome.
    ///
    /// # Errors
    ///
    /// Returns the first failure among fetching, generation, posting the
    /// comment and notifying. Nothing already published is rolled back.
    #[instrument(skip(self), fields(pr = number))]
    pub async fn review_pull_request(&self, number: u64) -> Result<ReviewResult, LgtmError> {
        match self.run(number).await {
            Ok(review) => {
                info!(assessment = %review.assessment, findings = review.findings.len(), "review finished");
                Ok(review)
            }
            Err(e) => {
                error!(error = %e, "review failed");
                Err(e)
            }
        }
    }

    async fn run(&self, number: u64) -> Result<ReviewResult, LgtmError> {
        info!("starting review");
        let pr = self.source.fetch_pull_request(number).await?;
        let files = self.source.fetch_changed_files(number).await?;
        let diff = self.source.fetch_diff(number).await?;

        let review = self.generate_review(&pr, &files, &diff).await?;

        self.source
            .post_review_comment(number, &review.raw_review)
            .await?;
        self.notifier.send_review(&pr, &review).await?;

        let label = review_label(review.assessment);
        if let Err(e) = self.source.add_label(number, label).await {
            warn!(label, error = %e, "failed to apply review label");
        }

        Ok(review)
    }

    /// Prompt the model about `pr` and parse its answer. Publishes nothing.
    ///
    /// # Errors
    ///
    /// Returns the generator's error.
    pub async fn generate_review(
        &self,
        pr: &PullRequestData,
        files: &[FileChange],
        diff: &str,
    ) -> Result<ReviewResult, LgtmError> {
        let template = self
            .config
            .prompt_template
            .as_deref()
            .unwrap_or(REVIEW_PROMPT_TEMPLATE);
        let fields = PromptFields::from_pull_request(pr, files.len());
        let prompt = build_review_prompt(
            template,
            &fields,
            &truncate_diff(diff, self.config.max_diff_chars),
        );

        let raw = self
            .llm
            .generate(&prompt, &GenerateOptions::with_temperature(self.temperature))
            .await?;
        Ok(parse_review_response(&raw, &ParseOptions::from(&self.config)))
    }
}
