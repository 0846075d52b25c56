//! LLM-assisted pull request review.
//!
//! Provides the review pipeline: prompt construction, the heuristic response
//! parser and assessment rules, the Ollama, GitHub and Slack clients, the
//! orchestrator that ties them together, and a registry of HTTP tool servers.

pub mod assessment;
pub mod github;
pub mod llm;
pub mod mcp;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod slack;
