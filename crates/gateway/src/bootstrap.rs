//! [`AppState`] construction and background-task spawning, shared by the
//! `serve` binary entrypoint in `main.rs`.

use std::sync::Arc;

use anyhow::Context;
use regex::RegexSet;
use sha2::{Digest, Sha256};

use beto_agents::{AgentRegistry, AgentSpec, TransferController};
use beto_domain::config::{Config, ConfigSeverity};
use beto_mcp_client::McpManager;
use beto_providers::ProviderRegistry;
use beto_sessions::{LifecycleManager, SessionStore, TranscriptWriter};
use beto_tools::ProcessManager;

use crate::runtime::cancel::CancelMap;
use crate::runtime::credentials::CredentialStore;
use crate::runtime::fanout::EventBus;
use crate::runtime::reminders::ReminderQueue;
use crate::runtime::schedules::ScheduleStore;
use crate::runtime::session_lock::SessionLockMap;
use crate::runtime::webhooks::WebhookStore;
use crate::state::AppState;

/// Validate config, initialize every subsystem and return a fully-wired
/// [`AppState`] wrapped in an `Arc`. This is the shared boot path used by
/// the server entrypoint.
pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<Arc<AppState>> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    let state_dir = config
        .credentials
        .database_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| std::path::PathBuf::from("."));
    std::fs::create_dir_all(&state_dir).context("creating state directory")?;

    let workspace_root = std::env::current_dir().context("resolving workspace root")?;

    // ── Agent graph ──────────────────────────────────────────────────
    let agents = Arc::new(AgentRegistry::new(config.agents.coordinator.clone()));
    for (name, def) in &config.agents.definitions {
        agents
            .register(AgentSpec {
                name: name.clone(),
                description: def.description.clone(),
                instruction: def.instruction.clone(),
                model_id: def.model.clone(),
                tool_names: Vec::new(),
                allowed_transfers: def.allowed_transfers.clone(),
            })
            .with_context(|| format!("registering agent \"{name}\""))?;
    }
    agents.validate_graph().context("validating agent transfer graph")?;
    tracing::info!(
        agents = config.agents.definitions.len(),
        coordinator = %config.agents.coordinator,
        "agent registry ready"
    );
    let transfers = Arc::new(TransferController::new(agents.clone()));

    // ── LLM providers ────────────────────────────────────────────────
    let providers = Arc::new(ProviderRegistry::from_config(&config.llm));
    if providers.is_empty() {
        tracing::warn!("no LLM providers initialized — configure llm.providers to enable chat");
    } else {
        tracing::info!(providers = providers.len(), "LLM provider registry ready");
    }

    // ── Sessions ─────────────────────────────────────────────────────
    let sessions = Arc::new(SessionStore::new(&state_dir).context("initializing session store")?);
    let lifecycle = Arc::new(LifecycleManager::new(config.sessions.clone()));
    let transcripts = Arc::new(TranscriptWriter::new(&state_dir.join("transcripts")));
    tracing::info!("session management ready");

    // ── Tools ────────────────────────────────────────────────────────
    let process_manager = Arc::new(ProcessManager::new(config.tools.exec.clone()));
    let denied_commands = Arc::new(
        RegexSet::new(&config.tools.exec_security.denied_patterns)
            .context("invalid regex in tools.exec_security.denied_patterns")?,
    );
    tracing::info!(
        patterns = config.tools.exec_security.denied_patterns.len(),
        "exec denied-patterns compiled"
    );

    // ── MCP servers ──────────────────────────────────────────────────
    let mcp = if config.mcp.servers.is_empty() {
        tracing::info!("no MCP servers configured");
        Arc::new(McpManager::empty())
    } else {
        tracing::info!(count = config.mcp.servers.len(), "initializing MCP servers");
        Arc::new(McpManager::from_config(&config.mcp).await)
    };
    if mcp.tool_count() > 0 {
        tracing::info!(servers = mcp.server_count(), tools = mcp.tool_count(), "MCP tools discovered");
    }

    // ── Scheduler / reminders / credentials ─────────────────────────
    let schedules = Arc::new(ScheduleStore::open(&state_dir)?);
    let reminders = Arc::new(ReminderQueue::open(&state_dir)?);
    let webhooks = Arc::new(WebhookStore::open(&state_dir)?);
    let credentials = Arc::new(CredentialStore::open(
        &config.credentials.database_path,
        &config.credentials.credential_key_env,
    )?);
    tracing::info!("scheduler, reminder queue and credential store ready");

    // ── Event bus / cancellation / locking ──────────────────────────
    let fanout = Arc::new(EventBus::new());
    let cancel_tokens = Arc::new(CancelMap::new());
    let session_locks = Arc::new(SessionLockMap::new());

    // ── Auth tokens (hashed once at startup) ─────────────────────────
    let admin_token_hash = match std::env::var(&config.admin.token_env) {
        Ok(token) if !token.is_empty() => {
            tracing::info!(env_var = %config.admin.token_env, "admin bearer-token auth enabled");
            Some(hex::encode(Sha256::digest(token.as_bytes())))
        }
        _ => {
            tracing::warn!(
                env_var = %config.admin.token_env,
                "admin bearer-token auth DISABLED — set it to enable /admin/* routes"
            );
            None
        }
    };

    let mut api_token_hashes = Vec::new();
    for (label, env_var) in &config.api_keys {
        match std::env::var(env_var) {
            Ok(token) if !token.is_empty() => {
                api_token_hashes.push(hex::encode(Sha256::digest(token.as_bytes())));
            }
            _ => tracing::warn!(label = %label, env_var = %env_var, "configured API key env var is unset"),
        }
    }
    if api_token_hashes.is_empty() {
        tracing::warn!("no API bearer tokens configured — inbound HTTP auth is DISABLED");
    } else {
        tracing::info!(count = api_token_hashes.len(), "API bearer-token auth enabled");
    }

    Ok(Arc::new(AppState {
        config,
        workspace_root,
        providers,
        agents,
        transfers,
        sessions,
        lifecycle,
        transcripts,
        process_manager,
        mcp,
        denied_commands,
        schedules,
        reminders,
        webhooks,
        credentials,
        fanout,
        cancel_tokens,
        session_locks,
        http_client: reqwest::Client::new(),
        admin_token_hash,
        api_token_hashes,
    }))
}

/// Spawn the long-running background tokio tasks: the scheduler and
/// reminder scan loops. Call after [`build_app_state`] before the HTTP
/// listener starts accepting connections.
pub fn spawn_background_tasks(state: &Arc<AppState>) {
    tokio::spawn(crate::runtime::schedules::run_scan_loop(state.clone()));
    tokio::spawn(crate::runtime::reminders::run_scan_loop(state.clone()));
    {
        let sessions = state.sessions.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));
            loop {
                interval.tick().await;
                if let Err(e) = sessions.flush() {
                    tracing::warn!(error = %e, "session store flush failed");
                }
            }
        });
    }
    {
        let state = state.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                interval.tick().await;
                state.session_locks.prune_idle();
                state.process_manager.cleanup_stale();
            }
        });
    }
    tracing::info!("background tasks spawned (scheduler, reminders, session flush, lock/process GC)");
}

/// Test-only helpers for building a fully-wired [`AppState`] without a real
/// config file on disk. Shared by the `api` handler test modules.
#[cfg(test)]
pub mod test_support {
    use std::collections::HashMap;
    use std::sync::Arc;

    use beto_domain::config::{AgentConfig, Config, ToolPolicy};

    use super::build_app_state;
    use crate::state::AppState;

    /// A minimal two-agent config (`beto` coordinator with a single
    /// transfer to `scout`) rooted at a fresh temp directory, so every test
    /// run gets its own session/schedule/credential files.
    pub async fn test_state() -> (Arc<AppState>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();

        let mut definitions = HashMap::new();
        definitions.insert(
            "beto".to_string(),
            AgentConfig {
                description: "coordinator".into(),
                instruction: "You are beto.".into(),
                model: None,
                tool_policy: ToolPolicy::default(),
                allowed_transfers: vec!["scout".into()],
            },
        );
        definitions.insert(
            "scout".to_string(),
            AgentConfig {
                description: "research".into(),
                instruction: "You are scout.".into(),
                model: None,
                tool_policy: ToolPolicy::default(),
                allowed_transfers: vec!["beto".into()],
            },
        );

        let mut config = Config::default();
        config.agents.coordinator = "beto".into();
        config.agents.definitions = definitions;
        config.credentials.database_path = dir.path().join("beto-state.db");

        // Same passphrase every call — harmless under parallel test threads
        // since the value never varies.
        std::env::set_var(&config.credentials.credential_key_env, "test-state passphrase");

        let state = build_app_state(Arc::new(config)).await.expect("test state builds");
        (state, dir)
    }
}
