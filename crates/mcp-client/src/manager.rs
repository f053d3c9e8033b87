//! MCP manager — holds all MCP server connections and orchestrates tool
//! discovery and dispatch.
//!
//! Servers are held behind a `parking_lot::RwLock` so a config reload can
//! prune a disabled server's tools from every agent without blocking
//! in-flight `call_tool` invocations: the reload takes the write lock just
//! long enough to swap the map, never while awaiting a server.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use beto_domain::config::{McpConfig, McpServerConfig, McpTransportKind};
use beto_domain::trace::TraceEvent;

use crate::protocol::{self, McpToolDef, ToolCallResult, ToolsListResult};
use crate::transport::{McpTransport, SseTransport, StdioTransport, TransportError};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// McpServer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An MCP server connection (one per configured, enabled server).
pub struct McpServer {
    /// Server ID from config.
    pub id: String,
    /// Tools discovered via `tools/list`.
    pub tools: Vec<McpToolDef>,
    /// Handle to the running process or SSE connection.
    transport: Box<dyn McpTransport>,
}

impl McpServer {
    /// Initialize a server: spawn the process (or connect via SSE),
    /// perform the MCP handshake, and discover tools.
    async fn initialize(config: &McpServerConfig) -> Result<Self, McpError> {
        let transport: Box<dyn McpTransport> = match config.transport {
            McpTransportKind::Stdio => {
                let t = StdioTransport::spawn(config).map_err(McpError::Transport)?;
                Box::new(t)
            }
            McpTransportKind::Sse => {
                tracing::warn!(
                    server_id = %config.id,
                    "SSE transport is not yet implemented, server will be non-functional"
                );
                Box::new(SseTransport)
            }
        };

        let init_params = protocol::initialize_params();
        let params_value = serde_json::to_value(&init_params)
            .map_err(|e| McpError::Protocol(format!("failed to serialize initialize params: {e}")))?;

        let resp = transport
            .send_request("initialize", Some(params_value))
            .await
            .map_err(McpError::Transport)?;

        if resp.is_error() {
            let err = resp.error.unwrap();
            return Err(McpError::Protocol(format!("initialize failed: {err}")));
        }

        tracing::debug!(server_id = %config.id, "MCP initialize response received");

        transport
            .send_notification("notifications/initialized")
            .await
            .map_err(McpError::Transport)?;

        tracing::debug!(server_id = %config.id, "sent notifications/initialized");

        let tools_resp = transport
            .send_request("tools/list", None)
            .await
            .map_err(McpError::Transport)?;

        let tools = if tools_resp.is_error() {
            tracing::warn!(server_id = %config.id, "tools/list returned error, server will have no tools");
            Vec::new()
        } else {
            let result_value = tools_resp.result.unwrap_or(Value::Null);
            match serde_json::from_value::<ToolsListResult>(result_value) {
                Ok(r) => r.tools,
                Err(e) => {
                    tracing::warn!(server_id = %config.id, error = %e, "failed to parse tools/list result");
                    Vec::new()
                }
            }
        };

        tracing::info!(server_id = %config.id, tool_count = tools.len(), "MCP server initialized");

        Ok(Self {
            id: config.id.clone(),
            tools,
            transport,
        })
    }

    pub fn is_alive(&self) -> bool {
        self.transport.is_alive()
    }

    pub async fn call_tool(&self, tool_name: &str, arguments: Value) -> Result<ToolCallResult, McpError> {
        if !self.transport.is_alive() {
            return Err(McpError::ServerDown(self.id.clone()));
        }

        let params = serde_json::json!({ "name": tool_name, "arguments": arguments });

        let resp = self
            .transport
            .send_request("tools/call", Some(params))
            .await
            .map_err(McpError::Transport)?;

        if resp.is_error() {
            let err = resp.error.unwrap();
            return Err(McpError::Protocol(format!("tools/call failed: {err}")));
        }

        let result_value = resp.result.unwrap_or(Value::Null);
        serde_json::from_value::<ToolCallResult>(result_value)
            .map_err(|e| McpError::Protocol(format!("failed to parse tools/call result: {e}")))
    }

    async fn shutdown(&self) {
        tracing::info!(server_id = %self.id, "shutting down MCP server");
        self.transport.shutdown().await;
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// McpManager
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Manager that holds all live MCP server connections.
pub struct McpManager {
    servers: RwLock<HashMap<String, Arc<McpServer>>>,
}

impl McpManager {
    pub fn empty() -> Self {
        Self {
            servers: RwLock::new(HashMap::new()),
        }
    }

    /// Initialize from config: spawn processes for every enabled server,
    /// send initialize, discover tools. Disabled servers are skipped
    /// outright. Servers that fail to initialize are logged and skipped
    /// (not fatal).
    pub async fn from_config(config: &McpConfig) -> Self {
        let manager = Self::empty();
        manager.reload(config).await;
        manager
    }

    /// Reconcile live connections against `config`: start newly-enabled
    /// servers, and prune any server that is now disabled or absent.
    /// Initialization happens before the lock is taken, so connecting a
    /// new server never blocks an in-flight tool call.
    pub async fn reload(&self, config: &McpConfig) {
        let enabled: HashMap<&str, &McpServerConfig> = config
            .servers
            .iter()
            .filter(|s| s.enabled)
            .map(|s| (s.id.as_str(), s))
            .collect();

        let to_remove: Vec<String> = {
            let servers = self.servers.read();
            servers
                .keys()
                .filter(|id| !enabled.contains_key(id.as_str()))
                .cloned()
                .collect()
        };
        for id in to_remove {
            self.prune_server(&id).await;
        }

        let to_add: Vec<&McpServerConfig> = {
            let servers = self.servers.read();
            enabled
                .values()
                .filter(|c| !servers.contains_key(c.id.as_str()))
                .copied()
                .collect()
        };
        for server_config in to_add {
            tracing::info!(
                server_id = %server_config.id,
                command = %server_config.command,
                transport = ?server_config.transport,
                "initializing MCP server"
            );
            match McpServer::initialize(server_config).await {
                Ok(server) => {
                    self.servers.write().insert(server_config.id.clone(), Arc::new(server));
                }
                Err(e) => {
                    tracing::warn!(server_id = %server_config.id, error = %e, "failed to initialize MCP server, skipping");
                }
            }
        }
    }

    /// Remove a server and prune its tools from every agent's view.
    /// Idempotent: pruning an unknown server id is a no-op. In-flight
    /// invocations against the removed server complete normally since
    /// callers hold their own `Arc<McpServer>`.
    pub async fn prune_server(&self, server_id: &str) {
        let removed = self.servers.write().remove(server_id);
        let Some(server) = removed else { return };
        let tools_removed = server.tools.len();
        server.shutdown().await;
        TraceEvent::McpServerPruned {
            server_id: server_id.to_owned(),
            tools_removed,
        }
        .emit();
    }

    /// Get all discovered tools across all servers, as `(server_id, tool_def)`.
    pub fn list_tools(&self) -> Vec<(String, McpToolDef)> {
        self.servers
            .read()
            .values()
            .filter(|s| s.is_alive())
            .flat_map(|server| {
                server
                    .tools
                    .iter()
                    .map(move |tool| (server.id.clone(), tool.clone()))
            })
            .collect()
    }

    pub async fn call_tool(
        &self,
        server_id: &str,
        tool_name: &str,
        arguments: Value,
    ) -> Result<ToolCallResult, McpError> {
        let server = {
            let servers = self.servers.read();
            servers
                .get(server_id)
                .cloned()
                .ok_or_else(|| McpError::ServerNotFound(server_id.to_string()))?
        };
        server.call_tool(tool_name, arguments).await
    }

    pub fn server_count(&self) -> usize {
        self.servers.read().len()
    }

    pub fn tool_count(&self) -> usize {
        self.servers.read().values().filter(|s| s.is_alive()).map(|s| s.tools.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.read().is_empty()
    }

    /// Gracefully shut down all servers concurrently.
    pub async fn shutdown(&self) {
        let servers: Vec<Arc<McpServer>> = self.servers.read().values().cloned().collect();
        let futs: Vec<_> = servers.iter().map(|s| s.shutdown()).collect();
        futures_util::future::join_all(futs).await;
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error type
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("MCP transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("MCP protocol error: {0}")]
    Protocol(String),

    #[error("MCP server not found: {0}")]
    ServerNotFound(String),

    #[error("MCP server is down: {0}")]
    ServerDown(String),
}

impl From<McpError> for beto_domain::error::Error {
    fn from(e: McpError) -> Self {
        beto_domain::error::Error::Other(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_manager_has_no_servers() {
        let manager = McpManager::empty();
        assert!(manager.is_empty());
        assert_eq!(manager.tool_count(), 0);
    }

    #[tokio::test]
    async fn pruning_unknown_server_is_a_noop() {
        let manager = McpManager::empty();
        manager.prune_server("nonexistent").await;
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn reload_with_no_servers_configured_stays_empty() {
        let manager = McpManager::empty();
        manager.reload(&McpConfig::default()).await;
        assert!(manager.is_empty());
    }
}
