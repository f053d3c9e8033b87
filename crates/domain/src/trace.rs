use serde::Serialize;

/// Structured trace events emitted across all beto crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionResolved {
        session_key: String,
        session_id: String,
        is_new: bool,
    },
    SessionReset {
        session_key: String,
        old_session_id: String,
        new_session_id: String,
        reason: String,
    },
    AgentTransfer {
        session_id: String,
        from_agent: String,
        to_agent: String,
    },
    TransferDenied {
        session_id: String,
        from_agent: String,
        to_agent: String,
        reason: String,
    },
    ToolDispatched {
        session_id: String,
        tool_name: String,
        agent: String,
    },
    ToolCompleted {
        session_id: String,
        tool_name: String,
        duration_ms: u64,
        is_error: bool,
    },
    LlmRequest {
        provider: String,
        model: String,
        streaming: bool,
        duration_ms: u64,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
    },
    ScheduleFired {
        schedule_id: String,
        session_key: String,
    },
    ScheduleSkipped {
        schedule_id: String,
        reason: String,
    },
    ReminderFired {
        reminder_id: String,
        session_key: String,
    },
    WebhookReceived {
        slug: String,
        signature_verified: bool,
    },
    McpServerPruned {
        server_id: String,
        tools_removed: usize,
    },
    TranscriptAppended {
        session_id: String,
        events: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "beto_event");
    }
}
