use std::path::PathBuf;

/// Errors that can occur across the lgtm reviewer.
///
/// Transport failures towards GitHub, Ollama, Slack and tool servers each get
/// their own variant so callers can log which step of a review failed. Library
/// crates use this type directly; the binary turns it into a `miette`
/// diagnostic at the boundary.
///
/// # Examples
///
/// ```
/// use lgtm_core::LgtmError;
///
/// let err = LgtmError::Config("missing GitHub token".into());
/// assert!(err.to_string().contains("missing GitHub token"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum LgtmError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(help("check .lgtm.toml or the matching environment variable"))]
    Config(String),

    /// GitHub API failure (network, auth, rate limit, unexpected payload).
    #[error("GitHub error: {0}")]
    GitHub(String),

    /// LLM inference server failure.
    #[error("LLM error: {0}")]
    Llm(String),

    /// Chat notification failure.
    #[error("notification error: {0}")]
    Notify(String),

    /// Tool server transport failure.
    #[error("tool server error: {0}")]
    ToolServer(String),

    /// A tool server was referenced before being registered.
    #[error("tool server '{0}' is not registered")]
    #[diagnostic(help("add it under [mcp.servers] in .lgtm.toml"))]
    NotRegistered(String),

    /// Rejected webhook delivery (bad signature or malformed payload).
    #[error("webhook error: {0}")]
    Webhook(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
}
