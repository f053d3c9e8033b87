//! Shared application state — one [`AppState`] built at startup and handed
//! to every HTTP handler and background task behind `Arc`.

use std::path::PathBuf;
use std::sync::Arc;

use regex::RegexSet;

use beto_agents::{AgentRegistry, TransferController};
use beto_domain::config::Config;
use beto_mcp_client::McpManager;
use beto_providers::ProviderRegistry;
use beto_sessions::{LifecycleManager, SessionStore, TranscriptWriter};
use beto_tools::ProcessManager;

use crate::runtime::cancel::CancelMap;
use crate::runtime::credentials::CredentialStore;
use crate::runtime::fanout::EventBus;
use crate::runtime::notify::NtfyIntegration;
use crate::runtime::reminders::ReminderQueue;
use crate::runtime::schedules::ScheduleStore;
use crate::runtime::session_lock::SessionLockMap;
use crate::runtime::webhooks::WebhookStore;

pub struct AppState {
    pub config: Arc<Config>,
    pub workspace_root: PathBuf,

    pub providers: Arc<ProviderRegistry>,
    pub agents: Arc<AgentRegistry>,
    pub transfers: Arc<TransferController>,

    pub sessions: Arc<SessionStore>,
    pub lifecycle: Arc<LifecycleManager>,
    pub transcripts: Arc<TranscriptWriter>,

    pub process_manager: Arc<ProcessManager>,
    pub mcp: Arc<McpManager>,
    pub denied_commands: Arc<RegexSet>,

    pub schedules: Arc<ScheduleStore>,
    pub reminders: Arc<ReminderQueue>,
    pub webhooks: Arc<WebhookStore>,
    pub credentials: Arc<CredentialStore>,

    pub fanout: Arc<EventBus>,
    pub cancel_tokens: Arc<CancelMap>,
    pub session_locks: Arc<SessionLockMap>,

    pub http_client: reqwest::Client,
    pub admin_token_hash: Option<String>,
    pub api_token_hashes: Vec<String>,
}

impl AppState {
    /// Push a notification to the default ntfy integration, when one is
    /// configured under `config.integrations["ntfy"]`. No-ops (with a
    /// warning) when absent or malformed — a missing sink must never fail
    /// the scheduler/reminder/worker-pool run that triggered it.
    pub async fn notify_default(&self, title: &str, body: &str) {
        let Some(raw) = self.config.integrations.get("ntfy") else { return };
        match serde_json::from_value::<NtfyIntegration>(raw.clone()) {
            Ok(integration) => crate::runtime::notify::notify(&self.http_client, &integration, title, body).await,
            Err(e) => tracing::warn!(error = %e, "malformed ntfy integration config"),
        }
    }
}
