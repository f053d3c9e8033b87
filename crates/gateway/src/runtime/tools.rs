//! Tool Registry (§4.A): built-in tools (`exec`, `process`, file ops) plus
//! MCP-discovered tools, filtered per agent by [`beto_domain::config::ToolPolicy`].
//!
//! `transfer_to_agent` is not a built-in here — it is synthesized per agent
//! from the registry's live `allowed_transfers` and dispatched by the Runner
//! directly against the [`beto_agents::TransferController`].

use beto_domain::agent::AgentInfo;
use beto_domain::error::{Error, ToolError};
use beto_domain::tool::ToolDefinition;
use serde_json::Value;

use crate::state::AppState;

pub const TRANSFER_TOOL_NAME: &str = "transfer_to_agent";

fn exec_tool_def() -> ToolDefinition {
    ToolDefinition {
        name: "exec".into(),
        description: "Run a shell command. Long-running commands auto-background.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "command": {"type": "string"},
                "background": {"type": "boolean"},
                "yield_ms": {"type": "integer"},
                "timeout_sec": {"type": "integer"},
                "workdir": {"type": "string"},
            },
            "required": ["command"],
        }),
    }
}

fn process_tool_def() -> ToolDefinition {
    ToolDefinition {
        name: "process".into(),
        description: "Manage background exec sessions: list, poll, log, write, kill, clear, remove.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "action": {"type": "string", "enum": ["list", "poll", "log", "write", "kill", "clear", "remove"]},
                "session_id": {"type": "string"},
                "offset": {"type": "integer"},
                "limit": {"type": "integer"},
                "tail_lines": {"type": "integer"},
                "data": {"type": "string"},
                "eof": {"type": "boolean"},
            },
            "required": ["action"],
        }),
    }
}

fn file_read_def() -> ToolDefinition {
    ToolDefinition {
        name: "file_read".into(),
        description: "Read a file under the workspace root, with optional line offset/limit.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {"path": {"type": "string"}, "offset": {"type": "integer"}, "limit": {"type": "integer"}},
            "required": ["path"],
        }),
    }
}

fn file_write_def() -> ToolDefinition {
    ToolDefinition {
        name: "file_write".into(),
        description: "Write (create or overwrite) a file under the workspace root.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {"path": {"type": "string"}, "content": {"type": "string"}},
            "required": ["path", "content"],
        }),
    }
}

fn file_list_def() -> ToolDefinition {
    ToolDefinition {
        name: "file_list".into(),
        description: "List directory contents under the workspace root.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {"path": {"type": "string"}},
        }),
    }
}

fn file_append_def() -> ToolDefinition {
    ToolDefinition {
        name: "file_append".into(),
        description: "Append content to an existing file under the workspace root, creating it if absent.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {"path": {"type": "string"}, "content": {"type": "string"}},
            "required": ["path", "content"],
        }),
    }
}

fn file_move_def() -> ToolDefinition {
    ToolDefinition {
        name: "file_move".into(),
        description: "Move or rename a file or directory within the workspace root.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {"source": {"type": "string"}, "destination": {"type": "string"}},
            "required": ["source", "destination"],
        }),
    }
}

fn file_delete_def() -> ToolDefinition {
    ToolDefinition {
        name: "file_delete".into(),
        description: "Delete a file or empty directory under the workspace root.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {"path": {"type": "string"}},
            "required": ["path"],
        }),
    }
}

fn transfer_tool_def(allowed_transfers: &[String]) -> ToolDefinition {
    ToolDefinition {
        name: TRANSFER_TOOL_NAME.into(),
        description: "Hand the conversation off to another agent in the graph.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "agent_name": {"type": "string", "enum": allowed_transfers},
            },
            "required": ["agent_name"],
        }),
    }
}

/// Build the tool definitions visible to `agent`, applying its
/// [`beto_domain::config::ToolPolicy`] deny-first filter and appending MCP
/// tools discovered since the last reload.
pub fn build_tool_definitions(state: &AppState, agent: &AgentInfo) -> Vec<ToolDefinition> {
    let policy = state
        .config
        .agents
        .definitions
        .get(&agent.name)
        .map(|def| &def.tool_policy);

    let allows = |name: &str| policy.map(|p| p.allows(name)).unwrap_or(true);

    let mut defs = Vec::new();
    for (name, def) in [
        ("exec", exec_tool_def()),
        ("process", process_tool_def()),
        ("file_read", file_read_def()),
        ("file_write", file_write_def()),
        ("file_list", file_list_def()),
        ("file_append", file_append_def()),
        ("file_move", file_move_def()),
        ("file_delete", file_delete_def()),
    ] {
        if allows(name) {
            defs.push(def);
        }
    }

    for (server_id, tool) in state.mcp.list_tools() {
        let qualified = format!("mcp:{server_id}:{}", tool.name);
        if allows(&qualified) {
            defs.push(ToolDefinition {
                name: qualified,
                description: tool.description,
                parameters: tool.input_schema,
            });
        }
    }

    if agent.is_transfer_node {
        defs.push(transfer_tool_def(&agent.allowed_transfers));
    }

    defs
}

/// Dispatch a non-transfer tool call. `transfer_to_agent` is handled by the
/// Runner directly, since it needs the [`beto_agents::TransferController`]
/// rather than a `Result<String, ToolError>`.
pub async fn dispatch_tool(state: &AppState, tool_name: &str, arguments: Value) -> Result<String, ToolError> {
    match tool_name {
        "exec" => {
            let req: beto_tools::exec::ExecRequest =
                serde_json::from_value(arguments).map_err(|e| ToolError::Upstream("exec".into(), e.to_string()))?;
            if state.denied_commands.is_match(&req.command) {
                return Err(ToolError::PermissionDenied("exec".into(), "command matches denylist".into()));
            }
            let resp = beto_tools::exec::exec(&state.process_manager, req).await;
            serde_json::to_string(&resp).map_err(|e| ToolError::Upstream("exec".into(), e.to_string()))
        }
        "process" => {
            let req: beto_tools::process::ProcessRequest = serde_json::from_value(arguments)
                .map_err(|e| ToolError::Upstream("process".into(), e.to_string()))?;
            let resp = beto_tools::process::handle_process(&state.process_manager, req).await;
            serde_json::to_string(&resp).map_err(|e| ToolError::Upstream("process".into(), e.to_string()))
        }
        "file_read" => {
            let req: beto_tools::file_ops::FileReadRequest = serde_json::from_value(arguments)
                .map_err(|e| ToolError::Upstream("file_read".into(), e.to_string()))?;
            beto_tools::file_ops::file_read(&state.workspace_root, req)
                .await
                .map(|v| v.to_string())
                .map_err(|e| ToolError::Upstream("file_read".into(), e))
        }
        "file_write" => {
            let req: beto_tools::file_ops::FileWriteRequest = serde_json::from_value(arguments)
                .map_err(|e| ToolError::Upstream("file_write".into(), e.to_string()))?;
            beto_tools::file_ops::file_write(&state.workspace_root, req)
                .await
                .map(|v| v.to_string())
                .map_err(|e| ToolError::Upstream("file_write".into(), e))
        }
        "file_list" => {
            let req: beto_tools::file_ops::FileListRequest = serde_json::from_value(arguments)
                .map_err(|e| ToolError::Upstream("file_list".into(), e.to_string()))?;
            beto_tools::file_ops::file_list(&state.workspace_root, req)
                .await
                .map(|v| v.to_string())
                .map_err(|e| ToolError::Upstream("file_list".into(), e))
        }
        "file_append" => {
            let req: beto_tools::file_ops::FileAppendRequest = serde_json::from_value(arguments)
                .map_err(|e| ToolError::Upstream("file_append".into(), e.to_string()))?;
            beto_tools::file_ops::file_append(&state.workspace_root, req)
                .await
                .map(|v| v.to_string())
                .map_err(|e| ToolError::Upstream("file_append".into(), e))
        }
        "file_move" => {
            let req: beto_tools::file_ops::FileMoveRequest = serde_json::from_value(arguments)
                .map_err(|e| ToolError::Upstream("file_move".into(), e.to_string()))?;
            beto_tools::file_ops::file_move(&state.workspace_root, req)
                .await
                .map(|v| v.to_string())
                .map_err(|e| ToolError::Upstream("file_move".into(), e))
        }
        "file_delete" => {
            let req: beto_tools::file_ops::FileDeleteRequest = serde_json::from_value(arguments)
                .map_err(|e| ToolError::Upstream("file_delete".into(), e.to_string()))?;
            beto_tools::file_ops::file_delete(&state.workspace_root, req)
                .await
                .map(|v| v.to_string())
                .map_err(|e| ToolError::Upstream("file_delete".into(), e))
        }
        name if name.starts_with("mcp:") => dispatch_mcp_tool(state, name, arguments).await,
        other => Err(ToolError::Unknown(other.to_string())),
    }
}

async fn dispatch_mcp_tool(state: &AppState, qualified: &str, arguments: Value) -> Result<String, ToolError> {
    let mut parts = qualified.splitn(3, ':');
    let _prefix = parts.next();
    let server_id = parts.next().ok_or_else(|| ToolError::Unknown(qualified.to_string()))?;
    let tool_name = parts.next().ok_or_else(|| ToolError::Unknown(qualified.to_string()))?;

    let result = state
        .mcp
        .call_tool(server_id, tool_name, arguments)
        .await
        .map_err(|e: beto_mcp_client::McpError| {
            let err: Error = e.into();
            ToolError::Upstream(qualified.to_string(), err.to_string())
        })?;

    let text: String = result.content.into_iter().map(|c| c.text).collect::<Vec<_>>().join("\n");
    if result.is_error {
        Err(ToolError::Upstream(qualified.to_string(), text))
    } else {
        Ok(text)
    }
}
