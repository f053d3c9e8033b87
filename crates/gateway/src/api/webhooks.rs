//! Webhook Dispatcher (§4.J): admin CRUD over [`WebhookDefinition`] plus
//! the public dispatch endpoint `POST /webhooks/{slug}`.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use uuid::Uuid;

use beto_domain::webhook::WebhookDefinition;

use crate::api::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateWebhookRequest {
    pub slug: String,
    pub target_agent: String,
    pub prompt_template: String,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub fire_and_forget: bool,
}

pub async fn list_webhooks(State(state): State<Arc<AppState>>) -> Json<Vec<WebhookDefinition>> {
    Json(state.webhooks.list())
}

pub async fn create_webhook(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateWebhookRequest>,
) -> Result<Json<WebhookDefinition>, ApiError> {
    if state.agents.get(&req.target_agent).is_none() {
        return Err(ApiError::bad_request(format!("unknown target_agent \"{}\"", req.target_agent)));
    }
    if state.webhooks.find_by_slug(&req.slug).is_some() {
        return Err(ApiError::bad_request(format!("slug \"{}\" is already in use", req.slug)));
    }
    let def = WebhookDefinition {
        id: Uuid::new_v4(),
        slug: req.slug,
        target_agent: req.target_agent,
        prompt_template: req.prompt_template,
        secret: req.secret,
        fire_and_forget: req.fire_and_forget,
    };
    Ok(Json(state.webhooks.create(def)?))
}

pub async fn delete_webhook(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Result<Json<serde_json::Value>, ApiError> {
    let removed = state.webhooks.delete(id)?;
    if !removed {
        return Err(ApiError::not_found(format!("no webhook \"{id}\"")));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// Public dispatch endpoint. 401s on signature mismatch without running
/// anything; otherwise synthesizes a system-owned session and runs one
/// turn, returning 200 with the response or 202 immediately in
/// fire-and-forget mode.
pub async fn dispatch_webhook(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(def) = state.webhooks.find_by_slug(&slug) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let signature = headers.get("X-Signature").and_then(|v| v.to_str().ok());
    if !def.verify_signature(&body, signature) {
        return (StatusCode::UNAUTHORIZED, Json(serde_json::json!({ "error": "signature mismatch" }))).into_response();
    }

    let payload: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    let prompt = def.render_prompt(&payload);
    let session = state.sessions.create(&format!("webhook:{}", def.slug), &def.target_agent);

    if def.fire_and_forget {
        let state = state.clone();
        let session_id = session.id;
        tokio::spawn(async move {
            let cancel = crate::runtime::cancel::CancelToken::new();
            let _ = crate::runtime::turn::run_turn(state, session_id, prompt, cancel).await;
        });
        return (StatusCode::ACCEPTED, Json(serde_json::json!({ "session_id": session.id }))).into_response();
    }

    let cancel = crate::runtime::cancel::CancelToken::new();
    match crate::runtime::turn::run_turn(state.clone(), session.id, prompt, cancel).await {
        Ok(outcome) => Json(serde_json::json!({
            "session_id": session.id,
            "active_agent": outcome.active_agent,
            "response": outcome.response,
        }))
        .into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use axum::extract::{Path, State};

    use super::*;
    use crate::bootstrap::test_support::test_state;

    fn req(slug: &str) -> CreateWebhookRequest {
        CreateWebhookRequest {
            slug: slug.into(),
            target_agent: "beto".into(),
            prompt_template: "event: {{kind}}".into(),
            secret: None,
            fire_and_forget: true,
        }
    }

    #[tokio::test]
    async fn create_rejects_unknown_target_agent() {
        let (state, _dir) = test_state().await;
        let mut r = req("github");
        r.target_agent = "nonexistent".into();
        let err = create_webhook(State(state), Json(r)).await.unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_rejects_duplicate_slug() {
        let (state, _dir) = test_state().await;
        create_webhook(State(state.clone()), Json(req("github"))).await.unwrap();
        let err = create_webhook(State(state), Json(req("github"))).await.unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn dispatch_unknown_slug_is_not_found() {
        let (state, _dir) = test_state().await;
        let resp = dispatch_webhook(State(state), Path("missing".into()), HeaderMap::new(), Bytes::new()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn dispatch_unsigned_fire_and_forget_accepted() {
        let (state, _dir) = test_state().await;
        create_webhook(State(state.clone()), Json(req("github"))).await.unwrap();
        let body = Bytes::from(serde_json::json!({"kind": "push"}).to_string());
        let resp = dispatch_webhook(State(state), Path("github".into()), HeaderMap::new(), body).await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn dispatch_rejects_bad_signature() {
        let (state, _dir) = test_state().await;
        let mut r = req("secure");
        r.secret = Some("topsecret".into());
        create_webhook(State(state.clone()), Json(r)).await.unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("X-Signature", "sha256=deadbeef".parse().unwrap());
        let resp = dispatch_webhook(State(state), Path("secure".into()), headers, Bytes::from("{}")).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn delete_then_list_empty() {
        let (state, _dir) = test_state().await;
        let Json(created) = create_webhook(State(state.clone()), Json(req("github"))).await.unwrap();
        let Json(result) = delete_webhook(State(state.clone()), Path(created.id)).await.unwrap();
        assert_eq!(result["deleted"], true);
        let Json(listed) = list_webhooks(State(state)).await;
        assert!(listed.is_empty());
    }
}
