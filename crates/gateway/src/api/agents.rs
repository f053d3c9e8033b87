//! `GET /api/agent-info` — the agent registry's JSON introspection tree.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;

use crate::state::AppState;

pub async fn agent_info(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(state.agents.tree())
}

#[cfg(test)]
mod tests {
    use axum::extract::State;

    use super::*;
    use crate::bootstrap::test_support::test_state;

    #[tokio::test]
    async fn tree_lists_every_registered_agent() {
        let (state, _dir) = test_state().await;
        let Json(tree) = agent_info(State(state)).await;
        let names: Vec<&str> = tree["agents"].as_array().unwrap().iter().filter_map(|a| a["name"].as_str()).collect();
        assert!(names.contains(&"beto"));
        assert!(names.contains(&"scout"));
    }
}
