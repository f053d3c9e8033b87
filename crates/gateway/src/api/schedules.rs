//! `/api/scheduler/tasks` CRUD over the durable [`ScheduledTask`] table.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use beto_domain::schedule::ScheduledTask;

use crate::api::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateScheduleRequest {
    pub name: String,
    pub cron_expression: String,
    pub prompt: String,
    pub target_agent: String,
}

pub async fn list_schedules(State(state): State<Arc<AppState>>) -> Json<Vec<ScheduledTask>> {
    Json(state.schedules.list())
}

pub async fn create_schedule(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateScheduleRequest>,
) -> Result<Json<ScheduledTask>, ApiError> {
    if state.agents.get(&req.target_agent).is_none() {
        return Err(ApiError::bad_request(format!("unknown target_agent \"{}\"", req.target_agent)));
    }
    let task = ScheduledTask::new(req.name, req.cron_expression, req.prompt, req.target_agent);
    Ok(Json(state.schedules.create(task)?))
}

pub async fn delete_schedule(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Result<Json<serde_json::Value>, ApiError> {
    let removed = state.schedules.delete(id)?;
    if !removed {
        return Err(ApiError::not_found(format!("no scheduled task \"{id}\"")));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[derive(Debug, Deserialize)]
pub struct SetEnabledRequest {
    pub enabled: bool,
}

pub async fn set_enabled(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetEnabledRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let found = state.schedules.set_enabled(id, req.enabled)?;
    if !found {
        return Err(ApiError::not_found(format!("no scheduled task \"{id}\"")));
    }
    Ok(Json(serde_json::json!({ "enabled": req.enabled })))
}

#[cfg(test)]
mod tests {
    use axum::extract::{Path, State};

    use super::*;
    use crate::bootstrap::test_support::test_state;

    fn req() -> CreateScheduleRequest {
        CreateScheduleRequest { name: "nightly digest".into(), cron_expression: "0 9 * * *".into(), prompt: "summarize".into(), target_agent: "beto".into() }
    }

    #[tokio::test]
    async fn create_rejects_unknown_target_agent() {
        let (state, _dir) = test_state().await;
        let mut r = req();
        r.target_agent = "nonexistent".into();
        let err = create_schedule(State(state), Json(r)).await.unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_then_list_then_delete() {
        let (state, _dir) = test_state().await;
        let Json(created) = create_schedule(State(state.clone()), Json(req())).await.unwrap();

        let Json(listed) = list_schedules(State(state.clone())).await;
        assert!(listed.iter().any(|t| t.id == created.id));

        let Json(result) = delete_schedule(State(state.clone()), Path(created.id)).await.unwrap();
        assert_eq!(result["deleted"], true);

        let err = delete_schedule(State(state), Path(created.id)).await.unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn set_enabled_toggles_existing_task() {
        let (state, _dir) = test_state().await;
        let Json(created) = create_schedule(State(state.clone()), Json(req())).await.unwrap();
        let Json(result) = set_enabled(State(state), Path(created.id), Json(SetEnabledRequest { enabled: false })).await.unwrap();
        assert_eq!(result["enabled"], false);
    }
}
