//! `/api/reminders` CRUD over the one-shot [`Reminder`] heap.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use beto_domain::reminder::Reminder;

use crate::api::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateReminderRequest {
    pub fire_at: chrono::DateTime<chrono::Utc>,
    pub prompt: String,
    pub target_agent: String,
}

pub async fn list_reminders(State(state): State<Arc<AppState>>) -> Json<Vec<Reminder>> {
    Json(state.reminders.list())
}

pub async fn create_reminder(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateReminderRequest>,
) -> Result<Json<Reminder>, ApiError> {
    if state.agents.get(&req.target_agent).is_none() {
        return Err(ApiError::bad_request(format!("unknown target_agent \"{}\"", req.target_agent)));
    }
    let reminder = Reminder::new(req.fire_at, req.prompt, req.target_agent);
    Ok(Json(state.reminders.create(reminder)?))
}

pub async fn delete_reminder(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Result<Json<serde_json::Value>, ApiError> {
    let removed = state.reminders.delete(id)?;
    if !removed {
        return Err(ApiError::not_found(format!("no reminder \"{id}\"")));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[cfg(test)]
mod tests {
    use axum::extract::{Path, State};

    use super::*;
    use crate::bootstrap::test_support::test_state;

    fn req() -> CreateReminderRequest {
        CreateReminderRequest { fire_at: chrono::Utc::now(), prompt: "stand up".into(), target_agent: "beto".into() }
    }

    #[tokio::test]
    async fn create_rejects_unknown_target_agent() {
        let (state, _dir) = test_state().await;
        let mut r = req();
        r.target_agent = "nonexistent".into();
        let err = create_reminder(State(state), Json(r)).await.unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_then_list_then_delete() {
        let (state, _dir) = test_state().await;
        let Json(created) = create_reminder(State(state.clone()), Json(req())).await.unwrap();

        let Json(listed) = list_reminders(State(state.clone())).await;
        assert!(listed.iter().any(|r| r.id == created.id));

        let Json(result) = delete_reminder(State(state.clone()), Path(created.id)).await.unwrap();
        assert_eq!(result["deleted"], true);

        let err = delete_reminder(State(state), Path(created.id)).await.unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::NOT_FOUND);
    }
}
