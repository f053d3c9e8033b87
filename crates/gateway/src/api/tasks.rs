//! Axel worker-pool entry point and result introspection. Not a generic
//! task-queue CRUD surface — every run is a decompose → parallel-execute
//! → aggregate cycle scoped to one session.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use beto_domain::event::{Event, EventKind};
use beto_domain::task::TaskResult;

use crate::api::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RunTasksRequest {
    pub specification: String,
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct RunTasksResponse {
    pub session_id: Uuid,
}

/// Kick off a worker-pool run against `specification`, returning
/// immediately with the session id the run's progress and results are
/// published to. The run itself completes in the background.
pub async fn run_tasks(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RunTasksRequest>,
) -> Result<Json<RunTasksResponse>, ApiError> {
    if req.specification.trim().is_empty() {
        return Err(ApiError::bad_request("specification must not be empty"));
    }

    let session = match req.session_id {
        Some(id) => state.sessions.get(id).ok_or_else(|| ApiError::not_found(format!("no session \"{id}\"")))?,
        None => state.sessions.create("system:tasks", state.agents.root_name()),
    };

    let session_id = session.id;
    let specification = req.specification;
    let state_bg = state.clone();
    tokio::spawn(async move {
        let summary = crate::runtime::worker_pool::run(state_bg.clone(), session_id, specification).await;
        let seq = state_bg.sessions.get(session_id).map(|s| s.next_seq()).unwrap_or(0);
        let event = Event::new(session_id, seq, EventKind::System { message: summary });
        state_bg.sessions.append_event(session_id, event.clone());
        state_bg.fanout.publish(session_id, &event);
    });

    Ok(Json(RunTasksResponse { session_id }))
}

/// List every `TaskResult` recorded under `session.state["result:<id>"]`
/// for a worker-pool run.
pub async fn list_task_results(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Vec<TaskResult>>, ApiError> {
    let session = state.sessions.get(session_id).ok_or_else(|| ApiError::not_found(format!("no session \"{session_id}\"")))?;

    let mut results: Vec<TaskResult> = session
        .state
        .iter()
        .filter(|(key, _)| key.starts_with("result:"))
        .filter_map(|(_, value)| serde_json::from_value(value.clone()).ok())
        .collect();
    results.sort_by_key(|r| r.task_id);
    Ok(Json(results))
}

#[cfg(test)]
mod tests {
    use axum::extract::{Path, State};
    use beto_domain::task::TaskType;

    use super::*;
    use crate::bootstrap::test_support::test_state;

    #[tokio::test]
    async fn empty_specification_is_rejected() {
        let (state, _dir) = test_state().await;
        let req = RunTasksRequest { specification: "  ".into(), session_id: None };
        let err = run_tasks(State(state), Json(req)).await.unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_session_id_is_not_found() {
        let (state, _dir) = test_state().await;
        let req = RunTasksRequest { specification: "build something".into(), session_id: Some(Uuid::new_v4()) };
        let err = run_tasks(State(state), Json(req)).await.unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn results_are_read_back_sorted_by_task_id() {
        let (state, _dir) = test_state().await;
        let session = state.sessions.create("system:tasks", state.agents.root_name());
        let a = TaskResult::failed(Uuid::new_v4(), TaskType::Testing, "write tests", "boom");
        let b = TaskResult::failed(Uuid::new_v4(), TaskType::Documentation, "write docs", "boom");
        state.sessions.set_state(session.id, &format!("result:{}", a.task_id), serde_json::to_value(&a).unwrap());
        state.sessions.set_state(session.id, &format!("result:{}", b.task_id), serde_json::to_value(&b).unwrap());

        let Json(results) = list_task_results(State(state), Path(session.id)).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.windows(2).all(|w| w[0].task_id <= w[1].task_id));
    }
}
