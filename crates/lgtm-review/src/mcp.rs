use std::collections::BTreeMap;
use std::time::Duration;

use lgtm_core::{LgtmError, McpConfig, McpServerConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

/// Outcome of a tool-server request.
///
/// Transport and HTTP failures are reported here rather than as errors so
/// callers can relay them verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    /// Whether the server answered with a success status.
    pub success: bool,
    /// Response body on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResponse {
    fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

#[derive(Debug)]
struct ToolServer {
    name: String,
    base_url: String,
    client: reqwest::Client,
}

/// Registry of HTTP tool servers exposing `/tools/call` and `/tools/list`.
///
/// # Examples
///
/// ```
/// use lgtm_core::McpServerConfig;
/// use lgtm_review::mcp::ToolServerRegistry;
///
/// let mut registry = ToolServerRegistry::new();
/// registry
///     .register("jira", &McpServerConfig {
///         name: "Jira".into(),
///         base_url: "http://localhost:3005".into(),
///         timeout_ms: 5_000,
///     })
///     .unwrap();
/// assert!(registry.is_registered("jira"));
/// assert!(registry.base_url("slack").is_err());
/// ```
#[derive(Debug, Default)]
pub struct ToolServerRegistry {
    servers: BTreeMap<String, ToolServer>,
}

impl ToolServerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every server in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`LgtmError::ToolServer`] if an HTTP client cannot be built.
    pub fn from_config(config: &McpConfig) -> Result<Self, LgtmError> {
        let mut registry = Self::new();
        for (id, server) in &config.servers {
            registry.register(id, server)?;
        }
        Ok(registry)
    }

    /// Register (or replace) server `id`.
    ///
    /// # Errors
    ///
    /// Returns [`LgtmError::ToolServer`] if the HTTP client cannot be built.
    pub fn register(&mut self, id: &str, config: &McpServerConfig) -> Result<(), LgtmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| {
                LgtmError::ToolServer(format!("failed to create client for '{id}': {e}"))
            })?;

        self.servers.insert(
            id.to_string(),
            ToolServer {
                name: config.name.clone(),
                base_url: config.base_url.trim_end_matches('/').to_string(),
                client,
            },
        );
        info!(server = id, name = %config.name, "registered tool server");
        Ok(())
    }

    /// Whether `id` has been registered.
    pub fn is_registered(&self, id: &str) -> bool {
        self.servers.contains_key(id)
    }

    /// Registered ids in sorted order.
    pub fn server_ids(&self) -> impl Iterator<Item = &str> {
        self.servers.keys().map(String::as_str)
    }

    /// Base URL of server `id`.
    ///
    /// # Errors
    ///
    /// Returns [`LgtmError::NotRegistered`] for unknown ids.
    pub fn base_url(&self, id: &str) -> Result<&str, LgtmError> {
        self.server(id).map(|s| s.base_url.as_str())
    }

    fn server(&self, id: &str) -> Result<&ToolServer, LgtmError> {
        self.servers
            .get(id)
            .ok_or_else(|| LgtmError::NotRegistered(id.to_string()))
    }

    /// Invoke tool `name` on server `id` with `arguments`.
    ///
    /// # Errors
    ///
    /// Returns [`LgtmError::NotRegistered`] for unknown ids. Request failures
    /// are reported in the returned [`ToolResponse`].
    pub async fn call_tool(
        &self,
        id: &str,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolResponse, LgtmError> {
        let server = self.server(id)?;
        debug!(server = id, tool = name, %arguments, "calling tool");

        let body = serde_json::json!({
            "name": name,
            "arguments": arguments,
        });
        let request = server
            .client
            .post(format!("{}/tools/call", server.base_url))
            .json(&body);

        let response = send(server, request).await;
        if let Some(e) = &response.error {
            error!(server = id, tool = name, error = %e, "tool call failed");
        }
        Ok(response)
    }

    /// List the tools offered by server `id`.
    ///
    /// # Errors
    ///
    /// Returns [`LgtmError::NotRegistered`] for unknown ids. Request failures
    /// are reported in the returned [`ToolResponse`].
    pub async fn list_tools(&self, id: &str) -> Result<ToolResponse, LgtmError> {
        let server = self.server(id)?;
        let request = server
            .client
            .get(format!("{}/tools/list", server.base_url));

        let response = send(server, request).await;
        if let Some(e) = &response.error {
            error!(server = id, error = %e, "failed to list tools");
        }
        Ok(response)
    }
}

async fn send(server: &ToolServer, request: reqwest::RequestBuilder) -> ToolResponse {
    let response = match request.send().await {
        Ok(r) => r,
        Err(e) => return ToolResponse::failed(format!("{}: {e}", server.name)),
    };

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return ToolResponse::failed(format!("{}: HTTP {status}: {body}", server.name));
    }

    match response.json::<serde_json::Value>().await {
        Ok(data) => ToolResponse::ok(data),
        Err(e) => ToolResponse::failed(format!("{}: invalid JSON response: {e}", server.name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_registers_three_servers() {
        let registry = ToolServerRegistry::from_config(&McpConfig::default()).unwrap();
        let ids: Vec<&str> = registry.server_ids().collect();
        assert_eq!(ids, vec!["github", "ollama", "slack"]);
        assert_eq!(registry.base_url("ollama").unwrap(), "http://localhost:11434");
    }

    #[tokio::test]
    async fn unregistered_server_is_an_error() {
        let registry = ToolServerRegistry::new();
        let err = registry
            .call_tool("nope", "x", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, LgtmError::NotRegistered(ref id) if id == "nope"));
        assert!(registry.list_tools("nope").await.is_err());
    }

    #[test]
    fn response_omits_empty_fields() {
        let json = serde_json::to_value(ToolResponse::failed("boom".into())).unwrap();
        assert_eq!(json, serde_json::json!({ "success": false, "error": "boom" }));
    }
}
