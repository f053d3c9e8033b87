//! `GET /api/tools` — per-agent tool visibility, as computed by the Tool
//! Registry's policy filter.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;

use beto_domain::tool::ToolDefinition;

use crate::runtime::tools::build_tool_definitions;
use crate::state::AppState;

pub async fn list_tools(State(state): State<Arc<AppState>>) -> Json<HashMap<String, Vec<ToolDefinition>>> {
    let tree = state.agents.tree();
    let mut by_agent = HashMap::new();
    if let Some(agents) = tree["agents"].as_array() {
        for entry in agents {
            let Some(name) = entry["name"].as_str() else { continue };
            if let Some(info) = state.agents.get(name) {
                by_agent.insert(name.to_string(), build_tool_definitions(&state, &info));
            }
        }
    }
    Json(by_agent)
}

#[cfg(test)]
mod tests {
    use axum::extract::State;

    use super::*;
    use crate::bootstrap::test_support::test_state;

    #[tokio::test]
    async fn lists_tools_for_every_registered_agent() {
        let (state, _dir) = test_state().await;
        let Json(by_agent) = list_tools(State(state)).await;
        assert!(by_agent.contains_key("beto"));
        assert!(by_agent.contains_key("scout"));
    }

    #[tokio::test]
    async fn transfer_node_exposes_the_transfer_tool() {
        let (state, _dir) = test_state().await;
        let Json(by_agent) = list_tools(State(state)).await;
        let beto_tools = &by_agent["beto"];
        assert!(beto_tools.iter().any(|t| t.name == crate::runtime::tools::TRANSFER_TOOL_NAME));
    }
}
