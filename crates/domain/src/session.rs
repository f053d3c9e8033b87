use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::Event;

/// Per-session conversation state. Owned exclusively by the session store;
/// the Runner holds only a short-lived borrow while driving a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    /// The agent currently holding the session, following any transfers.
    pub active_agent: String,
    /// Append-only, ordered by `Event::seq`. Never mutated in place.
    pub events: Vec<Event>,
    #[serde(default)]
    pub state: HashMap<String, serde_json::Value>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, root_agent: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            created_at: now,
            last_active: now,
            active_agent: root_agent.into(),
            events: Vec::new(),
            state: HashMap::new(),
        }
    }

    /// Next sequence number for an event appended to this session.
    pub fn next_seq(&self) -> u64 {
        self.events.last().map(|e| e.seq + 1).unwrap_or(0)
    }

    pub fn append(&mut self, event: Event) {
        self.last_active = event.timestamp;
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    #[test]
    fn new_session_has_no_events() {
        let s = Session::new("u1", "beto");
        assert_eq!(s.next_seq(), 0);
        assert!(s.events.is_empty());
        assert_eq!(s.active_agent, "beto");
    }

    #[test]
    fn append_assigns_increasing_seq() {
        let mut s = Session::new("u1", "beto");
        let e0 = Event::new(s.id, s.next_seq(), EventKind::System { message: "a".into() });
        s.append(e0);
        let e1 = Event::new(s.id, s.next_seq(), EventKind::System { message: "b".into() });
        s.append(e1);
        assert_eq!(s.events[0].seq, 0);
        assert_eq!(s.events[1].seq, 1);
    }
}
