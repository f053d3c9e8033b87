//! Session introspection and control: list/get/transcript/cancel/reset.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub user_id: String,
    pub active_agent: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_active: chrono::DateTime<chrono::Utc>,
    pub event_count: usize,
}

impl From<beto_domain::session::Session> for SessionSummary {
    fn from(s: beto_domain::session::Session) -> Self {
        Self {
            id: s.id,
            user_id: s.user_id,
            active_agent: s.active_agent,
            created_at: s.created_at,
            last_active: s.last_active,
            event_count: s.events.len(),
        }
    }
}

pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<Vec<SessionSummary>> {
    let mut sessions: Vec<SessionSummary> = state.sessions.list().into_iter().map(Into::into).collect();
    sessions.sort_by(|a, b| b.last_active.cmp(&a.last_active));
    Json(sessions)
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<beto_domain::session::Session>, ApiError> {
    state.sessions.get(session_id).map(Json).ok_or_else(|| ApiError::not_found(format!("no session \"{session_id}\"")))
}

pub async fn get_transcript(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Vec<beto_domain::event::Event>>, ApiError> {
    if state.sessions.get(session_id).is_none() {
        return Err(ApiError::not_found(format!("no session \"{session_id}\"")));
    }
    let events = state.transcripts.read(&session_id.to_string())?;
    Ok(Json(events))
}

pub async fn cancel_session(State(state): State<Arc<AppState>>, Path(session_id): Path<Uuid>) -> Json<serde_json::Value> {
    let cancelled = state.cancel_tokens.cancel(&session_id.to_string());
    Json(serde_json::json!({ "cancelled": cancelled }))
}

pub async fn reset_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<beto_domain::session::Session>, ApiError> {
    state
        .sessions
        .reset_session(session_id, state.agents.root_name(), "reset via API")
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("no session \"{session_id}\"")))
}

#[cfg(test)]
mod tests {
    use axum::extract::{Path, State};

    use super::*;
    use crate::bootstrap::test_support::test_state;

    #[tokio::test]
    async fn list_includes_newly_created_session() {
        let (state, _dir) = test_state().await;
        let created = state.sessions.create("alice", state.agents.root_name());

        let Json(sessions) = list_sessions(State(state)).await;
        assert!(sessions.iter().any(|s| s.id == created.id && s.user_id == "alice"));
    }

    #[tokio::test]
    async fn get_session_unknown_id_is_not_found() {
        let (state, _dir) = test_state().await;
        let err = get_session(State(state), Path(Uuid::new_v4())).await.unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn transcript_for_untranscribed_session_is_empty() {
        let (state, _dir) = test_state().await;
        let session = state.sessions.create("bob", state.agents.root_name());
        let Json(events) = get_transcript(State(state), Path(session.id)).await.unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn reset_session_restores_root_agent() {
        let (state, _dir) = test_state().await;
        let session = state.sessions.create("carol", "scout");
        let Json(reset) = reset_session(State(state.clone()), Path(session.id)).await.unwrap();
        assert_eq!(reset.active_agent, state.agents.root_name());
    }
}
