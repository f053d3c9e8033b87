//! Gateway-owned session store.
//!
//! Persists session state in `sessions.json` under the configured state
//! path. Each session is a [`Session`] with an append-only `events` log;
//! the Runner holds only a short-lived borrow while driving one turn.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use uuid::Uuid;

use beto_domain::error::{Error, Result};
use beto_domain::event::Event;
use beto_domain::session::Session;
use beto_domain::trace::TraceEvent;

/// Gateway-owned session store backed by a JSON file.
pub struct SessionStore {
    sessions_path: PathBuf,
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl SessionStore {
    /// Load or create the session store at `state_path/sessions/sessions.json`.
    pub fn new(state_path: &Path) -> Result<Self> {
        let dir = state_path.join("sessions");
        std::fs::create_dir_all(&dir).map_err(Error::Io)?;

        let sessions_path = dir.join("sessions.json");
        let sessions = if sessions_path.exists() {
            let raw = std::fs::read_to_string(&sessions_path).map_err(Error::Io)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            HashMap::new()
        };

        tracing::info!(
            sessions = sessions.len(),
            path = %sessions_path.display(),
            "session store loaded"
        );

        Ok(Self {
            sessions_path,
            sessions: RwLock::new(sessions),
        })
    }

    /// Look up a session by id.
    pub fn get(&self, session_id: Uuid) -> Option<Session> {
        self.sessions.read().get(&session_id).cloned()
    }

    /// Create a new session for `user_id`, rooted at `root_agent`.
    pub fn create(&self, user_id: &str, root_agent: &str) -> Session {
        let session = Session::new(user_id, root_agent);
        self.sessions.write().insert(session.id, session.clone());

        TraceEvent::SessionResolved {
            session_key: user_id.to_owned(),
            session_id: session.id.to_string(),
            is_new: true,
        }
        .emit();

        session
    }

    /// Append an event to a session's log, returning the updated session.
    pub fn append_event(&self, session_id: Uuid, event: Event) -> Option<Session> {
        let mut sessions = self.sessions.write();
        let session = sessions.get_mut(&session_id)?;
        session.append(event);
        Some(session.clone())
    }

    /// Reset a session: discard its event log and mint a fresh active agent.
    pub fn reset_session(&self, session_id: Uuid, root_agent: &str, reason: &str) -> Option<Session> {
        let mut sessions = self.sessions.write();
        let session = sessions.get_mut(&session_id)?;

        let old_id = session.id.to_string();
        session.events.clear();
        session.active_agent = root_agent.to_owned();
        session.last_active = chrono::Utc::now();

        TraceEvent::SessionReset {
            session_key: session.user_id.clone(),
            old_session_id: old_id,
            new_session_id: session.id.to_string(),
            reason: reason.to_owned(),
        }
        .emit();

        Some(session.clone())
    }

    /// Update the session's active agent after a successful transfer.
    pub fn set_active_agent(&self, session_id: Uuid, agent: &str) {
        let mut sessions = self.sessions.write();
        if let Some(session) = sessions.get_mut(&session_id) {
            session.active_agent = agent.to_owned();
            session.last_active = chrono::Utc::now();
        }
    }

    /// Set a key in the session's free-form state map, used by the worker
    /// pool to persist per-task results and by the scheduler/reminder queue
    /// to persist bookkeeping keyed by session.
    pub fn set_state(&self, session_id: Uuid, key: &str, value: serde_json::Value) {
        let mut sessions = self.sessions.write();
        if let Some(session) = sessions.get_mut(&session_id) {
            session.state.insert(key.to_owned(), value);
        }
    }

    /// List all sessions.
    pub fn list(&self) -> Vec<Session> {
        self.sessions.read().values().cloned().collect()
    }

    /// Persist the current session state to disk.
    pub fn flush(&self) -> Result<()> {
        let sessions = self.sessions.read();
        let json = serde_json::to_string_pretty(&*sessions)
            .map_err(|e| Error::Other(format!("serializing sessions: {e}")))?;
        std::fs::write(&self.sessions_path, json).map_err(Error::Io)?;
        Ok(())
    }

    /// Directory backing this store, used by the transcript writer.
    pub fn state_dir(&self) -> PathBuf {
        self.sessions_path
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_get_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        let session = store.create("alice", "beto");
        let fetched = store.get(session.id).unwrap();
        assert_eq!(fetched.user_id, "alice");
        assert_eq!(fetched.active_agent, "beto");
    }

    #[test]
    fn reset_clears_events_and_resets_active_agent() {
        use beto_domain::event::EventKind;

        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        let session = store.create("alice", "beto");
        store.append_event(
            session.id,
            Event::new(session.id, 0, EventKind::System { message: "hi".into() }),
        );
        store.set_active_agent(session.id, "scout");

        let reset = store.reset_session(session.id, "beto", "user requested").unwrap();
        assert!(reset.events.is_empty());
        assert_eq!(reset.active_agent, "beto");
    }

    #[test]
    fn set_state_inserts_into_session_state_map() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        let session = store.create("alice", "beto");
        store.set_state(session.id, "result:abc", serde_json::json!({"status": "completed"}));
        let fetched = store.get(session.id).unwrap();
        assert_eq!(fetched.state["result:abc"]["status"], "completed");
    }

    #[test]
    fn flush_writes_valid_json() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        store.create("alice", "beto");
        store.flush().unwrap();
        assert!(dir.path().join("sessions").join("sessions.json").exists());
    }
}
