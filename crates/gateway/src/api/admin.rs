//! Admin surface (§4.K): health check and the encrypted credential /
//! config-override store. Every route here is gated by
//! [`crate::api::auth::require_admin_token`].

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Json;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "agents": state.agents.len(),
        "providers": state.providers.len(),
        "sessions": state.sessions.list().len(),
        "mcp_servers": state.mcp.server_count(),
        "mcp_tools": state.mcp.tool_count(),
        "scheduled_tasks": state.schedules.list().len(),
        "reminders": state.reminders.list().len(),
        "webhooks": state.webhooks.list().len(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct SetCredentialRequest {
    pub value: String,
}

/// Set `cred:<name>`, the namespace credentials live under in the shared
/// encrypted key-value store (config overrides use `config:<section>`).
pub async fn set_credential(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(req): Json<SetCredentialRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.credentials.set(&format!("cred:{name}"), &req.value).map_err(|e| ApiError {
        status: axum::http::StatusCode::BAD_REQUEST,
        message: e.to_string(),
    })?;
    Ok(Json(serde_json::json!({ "stored": true })))
}

pub async fn delete_credential(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> Result<Json<serde_json::Value>, ApiError> {
    state.credentials.delete(&format!("cred:{name}"))?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// List stored credential names. Values are never returned — the store
/// has no "get" surface on the admin API by design, only set/delete/list.
pub async fn list_credentials(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    let names = state
        .credentials
        .list_keys("cred:")
        .into_iter()
        .map(|k| k.trim_start_matches("cred:").to_string())
        .collect();
    Json(names)
}

#[cfg(test)]
mod tests {
    use axum::extract::{Path, State};

    use super::*;
    use crate::bootstrap::test_support::test_state;

    #[tokio::test]
    async fn health_reports_registered_agent_count() {
        let (state, _dir) = test_state().await;
        let Json(body) = health(State(state)).await;
        assert_eq!(body["agents"], 2);
    }

    #[tokio::test]
    async fn set_list_delete_credential_roundtrip() {
        let (state, _dir) = test_state().await;
        set_credential(State(state.clone()), Path("github_token".into()), Json(SetCredentialRequest { value: "ghp_xxx".into() }))
            .await
            .unwrap();

        let Json(names) = list_credentials(State(state.clone())).await;
        assert_eq!(names, vec!["github_token".to_string()]);

        delete_credential(State(state.clone()), Path("github_token".into())).await.unwrap();
        let Json(names) = list_credentials(State(state)).await;
        assert!(names.is_empty());
    }
}
