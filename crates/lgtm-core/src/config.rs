use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::LgtmError;

/// Top-level configuration loaded from `.lgtm.toml`.
///
/// Supports layered resolution: CLI flags > env vars > local config > defaults.
///
/// # Examples
///
/// ```
/// use lgtm_core::LgtmConfig;
///
/// let config = LgtmConfig::default();
/// assert_eq!(config.review.max_diff_chars, 4000);
/// assert_eq!(config.llm.model, "llama2");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LgtmConfig {
    /// GitHub repository and credentials.
    #[serde(default)]
    pub github: GitHubConfig,
    /// Ollama inference server settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Slack notification settings.
    #[serde(default)]
    pub slack: SlackConfig,
    /// Review behavior settings.
    #[serde(default)]
    pub review: ReviewConfig,
    /// HTTP server and webhook settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Registered tool servers.
    #[serde(default)]
    pub mcp: McpConfig,
}

impl LgtmConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`LgtmError::FileNotFound`] if the file does not exist,
    /// [`LgtmError::Io`] if it cannot be read, or [`LgtmError::Toml`] if the
    /// content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use lgtm_core::LgtmConfig;
    /// use std::path::Path;
    ///
    /// let config = LgtmConfig::from_file(Path::new(".lgtm.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, LgtmError> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => LgtmError::FileNotFound(path.to_path_buf()),
            _ => LgtmError::Io(e),
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`LgtmError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use lgtm_core::LgtmConfig;
    ///
    /// let toml = r#"
    /// [llm]
    /// model = "codellama:13b"
    /// "#;
    /// let config = LgtmConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.llm.model, "codellama:13b");
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, LgtmError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Overlay values from an arbitrary variable lookup.
    ///
    /// Empty values are ignored so an exported-but-blank variable does not
    /// erase a value from the config file.
    ///
    /// # Examples
    ///
    /// ```
    /// use lgtm_core::LgtmConfig;
    ///
    /// let mut config = LgtmConfig::default();
    /// config.apply_env_from(|key| match key {
    ///     "OLLAMA_MODEL" => Some("mistral".to_string()),
    ///     _ => None,
    /// });
    /// assert_eq!(config.llm.model, "mistral");
    /// ```
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("GITHUB_TOKEN") {
            self.github.token = Some(v);
        }
        if let Some(v) = get("GITHUB_OWNER") {
            self.github.owner = Some(v);
        }
        if let Some(v) = get("GITHUB_REPO") {
            self.github.repo = Some(v);
        }
        if let Some(v) = get("OLLAMA_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Some(v) = get("OLLAMA_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = get("SLACK_BOT_TOKEN") {
            self.slack.bot_token = Some(v);
        }
        if let Some(v) = get("SLACK_CHANNEL") {
            self.slack.channel = Some(v);
        }
        if let Some(v) = get("WEBHOOK_SECRET") {
            self.server.webhook_secret = Some(v);
        }
        if let Some(v) = get("LGTM_ADDRESS") {
            self.server.address = v;
        }
        for (id, key) in [
            ("github", "GITHUB_MCP_SERVER_URL"),
            ("slack", "SLACK_MCP_SERVER_URL"),
            ("ollama", "OLLAMA_MCP_SERVER_URL"),
        ] {
            if let (Some(v), Some(server)) = (get(key), self.mcp.servers.get_mut(id)) {
                server.base_url = v;
            }
        }
    }
}

/// GitHub repository and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// Personal access or app token.
    pub token: Option<String>,
    /// Repository owner (user or organisation).
    pub owner: Option<String>,
    /// Repository name.
    pub repo: Option<String>,
    /// REST API base URL, override for GitHub Enterprise.
    #[serde(default = "default_github_api_base")]
    pub api_base: String,
}

fn default_github_api_base() -> String {
    "https://api.github.com".into()
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            owner: None,
            repo: None,
            api_base: default_github_api_base(),
        }
    }
}

/// Ollama inference server configuration.
///
/// # Examples
///
/// ```
/// use lgtm_core::LlmConfig;
///
/// let config = LlmConfig::default();
/// assert_eq!(config.base_url, "http://localhost:11434");
/// assert_eq!(config.temperature, 0.3);
/// assert_eq!(config.timeout_secs, 120);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the Ollama server.
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// Sampling temperature used for reviews.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Request timeout; generation on local hardware is slow.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_llm_base_url() -> String {
    "http://localhost:11434".into()
}

fn default_model() -> String {
    "llama2".into()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Slack notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Bot token (`xoxb-...`).
    pub bot_token: Option<String>,
    /// Channel ID or name to post reviews to.
    pub channel: Option<String>,
    /// Web API base URL.
    #[serde(default = "default_slack_api_base")]
    pub api_base: String,
}

fn default_slack_api_base() -> String {
    "https://slack.com/api".into()
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            channel: None,
            api_base: default_slack_api_base(),
        }
    }
}

impl SlackConfig {
    /// `true` when both a token and a channel are set.
    pub fn is_configured(&self) -> bool {
        self.bot_token.is_some() && self.channel.is_some()
    }
}

/// Review behavior configuration.
///
/// # Examples
///
/// ```
/// use lgtm_core::ReviewConfig;
///
/// let config = ReviewConfig::default();
/// assert_eq!(config.max_diff_chars, 4000);
/// assert_eq!(config.min_recommendation_len, 10);
/// assert!(config.prompt_template.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Diffs longer than this many characters are truncated (default: 4000).
    #[serde(default = "default_max_diff_chars")]
    pub max_diff_chars: usize,
    /// Recommendations must be longer than this many characters (default: 10).
    #[serde(default = "default_min_recommendation_len")]
    pub min_recommendation_len: usize,
    /// Replacement for the built-in review prompt template.
    pub prompt_template: Option<String>,
}

fn default_max_diff_chars() -> usize {
    4000
}

fn default_min_recommendation_len() -> usize {
    10
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            max_diff_chars: default_max_diff_chars(),
            min_recommendation_len: default_min_recommendation_len(),
            prompt_template: None,
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on.
    #[serde(default = "default_address")]
    pub address: String,
    /// Shared secret configured on the GitHub webhook.
    pub webhook_secret: Option<String>,
    /// Reject deliveries whose `x-hub-signature-256` does not match.
    #[serde(default)]
    pub verify_signatures: bool,
}

fn default_address() -> String {
    "0.0.0.0:3000".into()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            webhook_secret: None,
            verify_signatures: false,
        }
    }
}

impl ServerConfig {
    /// The webhook secret, if one is set and non-empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use lgtm_core::ServerConfig;
    ///
    /// let mut server = ServerConfig::default();
    /// server.webhook_secret = Some(String::new());
    /// assert_eq!(server.signing_secret(), None);
    /// ```
    pub fn signing_secret(&self) -> Option<&str> {
        self.webhook_secret.as_deref().filter(|s| !s.is_empty())
    }
}

/// Tool servers reachable over HTTP, keyed by server id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    /// Server definitions. Defaults to github, slack and ollama; any declared
    /// `[mcp.servers.<id>]` table replaces the whole default set.
    #[serde(default = "default_mcp_servers")]
    pub servers: BTreeMap<String, McpServerConfig>,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            servers: default_mcp_servers(),
        }
    }
}

/// A single tool server.
///
/// # Examples
///
/// ```
/// use lgtm_core::McpServerConfig;
///
/// let server = McpServerConfig {
///     name: "Jira MCP Server".into(),
///     base_url: "http://localhost:3005".into(),
///     timeout_ms: 5_000,
/// };
/// assert_eq!(server.timeout_ms, 5_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Display name used in logs.
    pub name: String,
    /// Base URL exposing `/tools/call` and `/tools/list`.
    pub base_url: String,
    /// Request timeout in milliseconds (default: 30000).
    #[serde(default = "default_mcp_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_mcp_timeout_ms() -> u64 {
    30_000
}

fn default_mcp_servers() -> BTreeMap<String, McpServerConfig> {
    let mut servers = BTreeMap::new();
    servers.insert(
        "github".to_string(),
        McpServerConfig {
            name: "GitHub MCP Server".into(),
            base_url: "http://localhost:3001".into(),
            timeout_ms: 30_000,
        },
    );
    servers.insert(
        "slack".to_string(),
        McpServerConfig {
            name: "Slack MCP Server".into(),
            base_url: "http://localhost:3002".into(),
            timeout_ms: 30_000,
        },
    );
    servers.insert(
        "ollama".to_string(),
        McpServerConfig {
            name: "Ollama MCP Server".into(),
            base_url: "http://localhost:11434".into(),
            timeout_ms: 60_000,
        },
    );
    servers
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_has_expected_values() {
        let config = LgtmConfig::default();
        assert_eq!(config.github.api_base, "https://api.github.com");
        assert!(config.github.token.is_none());
        assert_eq!(config.llm.base_url, "http://localhost:11434");
        assert_eq!(config.llm.model, "llama2");
        assert_eq!(config.llm.timeout_secs, 120);
        assert_eq!(config.slack.api_base, "https://slack.com/api");
        assert!(!config.slack.is_configured());
        assert_eq!(config.review.max_diff_chars, 4000);
        assert_eq!(config.review.min_recommendation_len, 10);
        assert_eq!(config.server.address, "0.0.0.0:3000");
        assert!(!config.server.verify_signatures);
        assert_eq!(config.mcp.servers.len(), 3);
        assert_eq!(config.mcp.servers["ollama"].timeout_ms, 60_000);
    }

    #[test]
    fn parse_full_toml() {
        let toml = r##"
[github]
token = "ghp_test"
owner = "acme"
repo = "api"

[llm]
base_url = "http://gpu-box:11434"
model = "codellama:13b"
temperature = 0.2

[slack]
bot_token = "xoxb-1"
channel = "#reviews"

[review]
max_diff_chars = 8000
min_recommendation_len = 5
prompt_template = "Review {{title}}"

[server]
address = "127.0.0.1:8080"
webhook_secret = "s3cret"
verify_signatures = true

[mcp.servers.jira]
name = "Jira"
base_url = "http://localhost:3005"
"##;
        let config = LgtmConfig::from_toml(toml).unwrap();
        assert_eq!(config.github.owner.as_deref(), Some("acme"));
        assert_eq!(config.github.api_base, "https://api.github.com");
        assert_eq!(config.llm.model, "codellama:13b");
        assert_eq!(config.llm.timeout_secs, 120);
        assert!(config.slack.is_configured());
        assert_eq!(config.slack.channel.as_deref(), Some("#reviews"));
        assert_eq!(config.review.max_diff_chars, 8000);
        assert_eq!(config.review.min_recommendation_len, 5);
        assert_eq!(
            config.review.prompt_template.as_deref(),
            Some("Review {{title}}")
        );
        assert!(config.server.verify_signatures);
        assert_eq!(config.mcp.servers.len(), 1);
        assert_eq!(config.mcp.servers["jira"].timeout_ms, 30_000);
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = LgtmConfig::from_toml("").unwrap();
        assert_eq!(config.review.max_diff_chars, 4000);
        assert_eq!(config.llm.model, "llama2");
        assert!(config.mcp.servers.contains_key("github"));
    }

    #[test]
    fn declared_servers_replace_defaults() {
        let toml = r#"
[mcp.servers.github]
name = "GitHub"
base_url = "http://gh-tools:3001"

[mcp.servers.jira]
name = "Jira"
base_url = "http://localhost:3005"
"#;
        let config = LgtmConfig::from_toml(toml).unwrap();
        let ids: Vec<&str> = config.mcp.servers.keys().map(String::as_str).collect();
        assert_eq!(ids, ["github", "jira"]);
        assert!(!config.mcp.servers.contains_key("ollama"));
    }

    #[test]
    fn blank_webhook_secret_is_not_a_signing_secret() {
        let mut server = ServerConfig {
            webhook_secret: Some("hook".into()),
            ..ServerConfig::default()
        };
        assert_eq!(server.signing_secret(), Some("hook"));

        server.webhook_secret = Some(String::new());
        assert_eq!(server.signing_secret(), None);
        server.webhook_secret = None;
        assert_eq!(server.signing_secret(), None);
    }

    #[test]
    fn missing_file_is_reported_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let err = LgtmConfig::from_file(&path).unwrap_err();
        assert!(matches!(&err, LgtmError::FileNotFound(p) if p == &path));
    }

    #[test]
    fn invalid_toml_returns_error() {
        let result = LgtmConfig::from_toml("{{invalid}}");
        assert!(result.is_err());
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = LgtmConfig::from_toml(
            r#"
[github]
owner = "from-file"
[llm]
model = "from-file"
"#,
        )
        .unwrap();

        let env: HashMap<&str, &str> = HashMap::from([
            ("GITHUB_OWNER", "from-env"),
            ("GITHUB_TOKEN", "ghp_env"),
            ("OLLAMA_BASE_URL", "http://ollama:11434"),
            ("SLACK_BOT_TOKEN", "xoxb-env"),
            ("SLACK_CHANNEL", "C123"),
            ("WEBHOOK_SECRET", "hook"),
            ("LGTM_ADDRESS", "127.0.0.1:9000"),
        ]);
        config.apply_env_from(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.github.owner.as_deref(), Some("from-env"));
        assert_eq!(config.github.token.as_deref(), Some("ghp_env"));
        assert_eq!(config.llm.model, "from-file");
        assert_eq!(config.llm.base_url, "http://ollama:11434");
        assert!(config.slack.is_configured());
        assert_eq!(config.server.webhook_secret.as_deref(), Some("hook"));
        assert_eq!(config.server.address, "127.0.0.1:9000");
    }

    #[test]
    fn tool_server_urls_follow_env() {
        let mut config = LgtmConfig::default();
        config.apply_env_from(|key| {
            (key == "SLACK_MCP_SERVER_URL").then(|| "http://slack-mcp:8080".to_string())
        });
        assert_eq!(config.mcp.servers["slack"].base_url, "http://slack-mcp:8080");
        assert_eq!(config.mcp.servers["github"].base_url, "http://localhost:3001");
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut config = LgtmConfig::default();
        config.apply_env_from(|key| (key == "OLLAMA_MODEL").then(|| "  ".to_string()));
        assert_eq!(config.llm.model, "llama2");
    }
}
