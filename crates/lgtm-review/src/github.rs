use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lgtm_core::{FileChange, GitHubConfig, LgtmError, PullRequestData};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::pipeline::PullRequestSource;

const DIFF_MEDIA_TYPE: &str = "application/vnd.github.v3.diff";
const USER_AGENT: &str = "lgtm";
const FILES_PER_PAGE: u8 = 100;

/// Pull request as returned by `GET /repos/{owner}/{repo}/pulls/{number}`.
#[derive(Debug, Deserialize)]
struct ApiPullRequest {
    id: u64,
    number: u64,
    title: String,
    body: Option<String>,
    user: Option<ApiUser>,
    head: ApiRef,
    base: ApiRef,
    state: String,
    html_url: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ApiRef {
    #[serde(rename = "ref")]
    name: String,
}

impl From<ApiPullRequest> for PullRequestData {
    fn from(pr: ApiPullRequest) -> Self {
        Self {
            id: pr.id,
            number: pr.number,
            title: pr.title,
            body: pr.body.unwrap_or_default(),
            author: pr
                .user
                .map(|u| u.login)
                .unwrap_or_else(|| "unknown".to_string()),
            branch: pr.head.name,
            base_branch: pr.base.name,
            state: pr.state,
            url: pr.html_url,
            created_at: pr.created_at,
            updated_at: pr.updated_at,
        }
    }
}

#[derive(Serialize)]
struct PageParams {
    per_page: u8,
}

/// GitHub client bound to one repository.
///
/// JSON routes go through octocrab; the unified diff needs a custom media type
/// and is fetched with reqwest.
pub struct GitHubClient {
    octocrab: octocrab::Octocrab,
    http: reqwest::Client,
    token: String,
    owner: String,
    repo: String,
    api_base: String,
}

impl GitHubClient {
    /// Create a client for the configured repository.
    ///
    /// The token comes from the configuration, falling back to the
    /// `GITHUB_TOKEN` environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`LgtmError::Config`] if the token, owner or repository is
    /// missing, or [`LgtmError::GitHub`] if the client cannot be built.
    ///
    /// # Examples
    ///
    /// ```
    /// use lgtm_core::GitHubConfig;
    /// use lgtm_review::github::GitHubClient;
    ///
    /// let config = GitHubConfig {
    ///     token: Some("ghp_xxxx".into()),
    ///     ..GitHubConfig::default()
    /// };
    /// assert!(GitHubClient::new(&config).is_err()); // owner and repo missing
    /// ```
    pub fn new(config: &GitHubConfig) -> Result<Self, LgtmError> {
        let token = match &config.token {
            Some(t) => t.clone(),
            None => std::env::var("GITHUB_TOKEN").map_err(|_| {
                LgtmError::Config(
                    "GitHub token not set. Set github.token or the GITHUB_TOKEN env var".into(),
                )
            })?,
        };
        let owner = config.owner.clone().ok_or_else(|| {
            LgtmError::Config("GitHub owner not set. Set github.owner or GITHUB_OWNER".into())
        })?;
        let repo = config.repo.clone().ok_or_else(|| {
            LgtmError::Config("GitHub repository not set. Set github.repo or GITHUB_REPO".into())
        })?;
        let api_base = config.api_base.trim_end_matches('/').to_string();

        let octocrab = octocrab::Octocrab::builder()
            .personal_token(token.clone())
            .base_uri(api_base.as_str())
            .map_err(|e| LgtmError::Config(format!("invalid GitHub API base '{api_base}': {e}")))?
            .build()
            .map_err(|e| LgtmError::GitHub(format!("failed to create GitHub client: {e}")))?;

        Ok(Self {
            octocrab,
            http: reqwest::Client::new(),
            token,
            owner,
            repo,
            api_base,
        })
    }

    /// `owner/repo` this client is bound to.
    pub fn repository(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    fn pull_route(&self, number: u64) -> String {
        format!("/repos/{}/{}/pulls/{number}", self.owner, self.repo)
    }

    /// Fetch pull request metadata.
    ///
    /// # Errors
    ///
    /// Returns [`LgtmError::GitHub`] on network or API errors.
    pub async fn get_pull_request(&self, number: u64) -> Result<PullRequestData, LgtmError> {
        let pr: ApiPullRequest = self
            .octocrab
            .get(self.pull_route(number), None::<&()>)
            .await
            .map_err(|e| LgtmError::GitHub(format!("failed to fetch PR #{number}: {e}")))?;
        Ok(pr.into())
    }

    /// List the files changed by a pull request.
    ///
    /// # Errors
    ///
    /// Returns [`LgtmError::GitHub`] on network or API errors.
    pub async fn get_pull_request_files(&self, number: u64) -> Result<Vec<FileChange>, LgtmError> {
        let route = format!("{}/files", self.pull_route(number));
        let params = PageParams {
            per_page: FILES_PER_PAGE,
        };
        self.octocrab
            .get(route, Some(&params))
            .await
            .map_err(|e| LgtmError::GitHub(format!("failed to list files of PR #{number}: {e}")))
    }

    /// Fetch the unified diff of a pull request.
    ///
    /// # Errors
    ///
    /// Returns [`LgtmError::GitHub`] on network or API errors.
    pub async fn get_diff(&self, number: u64) -> Result<String, LgtmError> {
        let url = format!("{}{}", self.api_base, self.pull_route(number));

        let response = self
            .http
            .get(&url)
            .header("Accept", DIFF_MEDIA_TYPE)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .map_err(|e| LgtmError::GitHub(format!("failed to fetch PR diff: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LgtmError::GitHub(format!("GitHub API error {status}: {body}")));
        }

        response
            .text()
            .await
            .map_err(|e| LgtmError::GitHub(format!("failed to read diff response: {e}")))
    }

    /// Post `body` as a `COMMENT` review on the pull request.
    ///
    /// # Errors
    ///
    /// Returns [`LgtmError::GitHub`] on API errors.
    pub async fn create_review_comment(&self, number: u64, body: &str) -> Result<(), LgtmError> {
        let route = format!("{}/reviews", self.pull_route(number));
        let payload = serde_json::json!({
            "body": body,
            "event": "COMMENT",
        });

        let _response: serde_json::Value = self
            .octocrab
            .post(route, Some(&payload))
            .await
            .map_err(|e| LgtmError::GitHub(format!("failed to post review: {e}")))?;
        debug!(pr = number, repo = %self.repository(), "review comment posted");
        Ok(())
    }

    /// Add a label to the pull request.
    ///
    /// # Errors
    ///
    /// Returns [`LgtmError::GitHub`] on API errors.
    pub async fn add_label(&self, number: u64, label: &str) -> Result<(), LgtmError> {
        let route = format!("/repos/{}/{}/issues/{number}/labels", self.owner, self.repo);
        let payload = serde_json::json!({ "labels": [label] });

        let _response: serde_json::Value = self
            .octocrab
            .post(route, Some(&payload))
            .await
            .map_err(|e| LgtmError::GitHub(format!("failed to add label '{label}': {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl PullRequestSource for GitHubClient {
    async fn fetch_pull_request(&self, number: u64) -> Result<PullRequestData, LgtmError> {
        self.get_pull_request(number).await
    }

    async fn fetch_changed_files(&self, number: u64) -> Result<Vec<FileChange>, LgtmError> {
        self.get_pull_request_files(number).await
    }

    async fn fetch_diff(&self, number: u64) -> Result<String, LgtmError> {
        self.get_diff(number).await
    }

    async fn post_review_comment(&self, number: u64, body: &str) -> Result<(), LgtmError> {
        self.create_review_comment(number, body).await
    }

    async fn add_label(&self, number: u64, label: &str) -> Result<(), LgtmError> {
        GitHubClient::add_label(self, number, label).await
    }
}
