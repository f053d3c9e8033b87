//! `POST /api/chat` — the synchronous HTTP entry point to the Runner.
//! Resolves or creates a session for the caller, acquires the per-session
//! run lock, and drives one turn to completion.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Caller-chosen identity used to find or create a session when
    /// `session_id` is absent. Ignored when `session_id` is present.
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<Uuid>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: Uuid,
    pub active_agent: String,
    pub response: String,
}

pub async fn chat(State(state): State<Arc<AppState>>, Json(req): Json<ChatRequest>) -> Result<Json<ChatResponse>, ApiError> {
    if req.message.trim().is_empty() {
        return Err(ApiError::bad_request("message must not be empty"));
    }

    let session = match req.session_id {
        Some(id) => state.sessions.get(id).ok_or_else(|| ApiError::not_found(format!("no session \"{id}\"")))?,
        None => {
            let user_id = req.user_id.as_deref().unwrap_or("anonymous");
            state.sessions.create(user_id, state.agents.root_name())
        }
    };

    if let Some(reason) = state.lifecycle.should_reset(&session, chrono::Utc::now()) {
        state.sessions.reset_session(session.id, state.agents.root_name(), &reason.to_string());
    }

    let session_key = session.id.to_string();
    let _permit = state
        .session_locks
        .acquire(&session_key)
        .await
        .map_err(|_| ApiError { status: axum::http::StatusCode::CONFLICT, message: "session is busy".into() })?;

    let cancel_token = state.cancel_tokens.register(&session_key);
    let outcome = crate::runtime::turn::run_turn(state.clone(), session.id, req.message, cancel_token).await;
    state.cancel_tokens.remove(&session_key);

    let outcome = outcome?;
    Ok(Json(ChatResponse { session_id: session.id, active_agent: outcome.active_agent, response: outcome.response }))
}

#[cfg(test)]
mod tests {
    use axum::extract::State;
    use axum::response::Json;

    use super::*;
    use crate::bootstrap::test_support::test_state;

    #[tokio::test]
    async fn empty_message_is_rejected_before_touching_the_runner() {
        let (state, _dir) = test_state().await;
        let req = ChatRequest { user_id: None, session_id: None, message: "   ".into() };
        let err = chat(State(state), Json(req)).await.unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_session_id_is_not_found() {
        let (state, _dir) = test_state().await;
        let req = ChatRequest { user_id: None, session_id: Some(Uuid::new_v4()), message: "hi".into() };
        let err = chat(State(state), Json(req)).await.unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::NOT_FOUND);
    }
}
