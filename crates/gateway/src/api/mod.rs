pub mod admin;
pub mod agents;
pub mod auth;
pub mod chat;
pub mod error;
pub mod reminders;
pub mod schedules;
pub mod sessions;
pub mod tasks;
pub mod tools;
pub mod webhooks;
pub mod ws;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router: a public group (webhook dispatch, health
/// probe), an API-token-gated group, and an admin-token-gated group.
pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let public = Router::new().route("/webhooks/:slug", post(webhooks::dispatch_webhook));

    let protected = Router::new()
        .route("/api/chat", post(chat::chat))
        .route("/api/sessions", get(sessions::list_sessions))
        .route("/api/sessions/:id", get(sessions::get_session))
        .route("/api/sessions/:id/transcript", get(sessions::get_transcript))
        .route("/api/sessions/:id/cancel", post(sessions::cancel_session))
        .route("/api/sessions/:id/reset", post(sessions::reset_session))
        .route("/api/tasks", post(tasks::run_tasks))
        .route("/api/tasks/:session_id", get(tasks::list_task_results))
        .route("/api/scheduler/tasks", get(schedules::list_schedules))
        .route("/api/scheduler/tasks", post(schedules::create_schedule))
        .route("/api/scheduler/tasks/:id", delete(schedules::delete_schedule))
        .route("/api/scheduler/tasks/:id/enabled", post(schedules::set_enabled))
        .route("/api/reminders", get(reminders::list_reminders))
        .route("/api/reminders", post(reminders::create_reminder))
        .route("/api/reminders/:id", delete(reminders::delete_reminder))
        .route("/api/webhooks", get(webhooks::list_webhooks))
        .route("/api/webhooks", post(webhooks::create_webhook))
        .route("/api/webhooks/:id", delete(webhooks::delete_webhook))
        .route("/api/tools", get(tools::list_tools))
        .route("/api/agent-info", get(agents::agent_info))
        .route("/ws/:session_id", get(ws::ws_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_api_token));

    let admin = Router::new()
        .route("/admin/health", get(admin::health))
        .route("/admin/credentials", get(admin::list_credentials))
        .route("/admin/credentials/:name", post(admin::set_credential))
        .route("/admin/credentials/:name", delete(admin::delete_credential))
        .route_layer(middleware::from_fn_with_state(state, auth::require_admin_token));

    public.merge(protected).merge(admin).layer(tower_http::trace::TraceLayer::new_for_http())
}
