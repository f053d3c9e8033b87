use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tool::{Message, ToolCall};

/// A single entry in a session's append-only event log.
///
/// Events are strictly ordered by `seq` within a session — the log is the
/// source of truth for everything the Runner replays into a turn's context
/// and everything the event bus fans out to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub session_id: Uuid,
    /// Monotonically increasing sequence number within the session.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// The payload of a session event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// A message from the user, addressed to whichever agent currently
    /// owns the session.
    UserMessage { agent: String, message: Message },
    /// A model-generated response from the named agent.
    ModelResponse { agent: String, message: Message },
    /// A tool invocation requested by the named agent.
    ToolCall { agent: String, call: ToolCall },
    /// The result of a tool invocation.
    ToolResponse {
        agent: String,
        call_id: String,
        result: String,
        is_error: bool,
    },
    /// The session's active agent changed via `transfer_to_agent`.
    AgentTransfer { from_agent: String, to_agent: String },
    /// A system-generated event not directly produced by the model
    /// (session reset, schedule fire, reminder fire, webhook delivery).
    System { message: String },
}

impl Event {
    pub fn new(session_id: Uuid, seq: u64, kind: EventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            seq,
            timestamp: Utc::now(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_with_flattened_kind() {
        let session_id = Uuid::new_v4();
        let ev = Event::new(
            session_id,
            0,
            EventKind::System {
                message: "session started".into(),
            },
        );
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "system");
        assert_eq!(json["message"], "session started");
        assert_eq!(json["seq"], 0);
    }

    #[test]
    fn event_roundtrips_through_json() {
        let session_id = Uuid::new_v4();
        let ev = Event::new(
            session_id,
            5,
            EventKind::AgentTransfer {
                from_agent: "beto".into(),
                to_agent: "scout".into(),
            },
        );
        let json = serde_json::to_string(&ev).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back.seq, 5);
        match back.kind {
            EventKind::AgentTransfer { from_agent, to_agent } => {
                assert_eq!(from_agent, "beto");
                assert_eq!(to_agent, "scout");
            }
            _ => panic!("expected AgentTransfer"),
        }
    }
}
