//! Core types, configuration, and error handling for the lgtm reviewer.
//!
//! This crate provides the shared foundation used by all other lgtm crates:
//! - [`LgtmError`]: unified error type using `thiserror`
//! - [`LgtmConfig`]: configuration loaded from `.lgtm.toml` plus env overrides
//! - Shared types: [`PullRequestData`], [`FileChange`], [`ReviewFinding`],
//!   [`ReviewResult`], [`Assessment`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{
    GitHubConfig, LgtmConfig, LlmConfig, McpConfig, McpServerConfig, ReviewConfig, ServerConfig,
    SlackConfig,
};
pub use error::LgtmError;
pub use types::{
    Assessment, FileChange, FindingType, OutputFormat, PullRequestData, ReviewFinding,
    ReviewResult, Severity,
};

/// A convenience `Result` type for lgtm operations.
pub type Result<T> = std::result::Result<T, LgtmError>;
