//! Append-only JSONL event transcripts — the durable half of a session's
//! event log. The in-memory [`crate::store::SessionStore`] is the ground
//! truth during a turn; this writer is the recovery path across restarts.
//!
//! Each session gets a `<sessionId>.jsonl` file under the sessions
//! directory, one [`Event`] per line.

use std::path::{Path, PathBuf};

use beto_domain::error::{Error, Result};
use beto_domain::event::Event;
use beto_domain::trace::TraceEvent;

pub struct TranscriptWriter {
    base_dir: PathBuf,
}

impl TranscriptWriter {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
        }
    }

    /// Append events to a session's transcript file.
    pub fn append(&self, session_id: &str, events: &[Event]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let path = self.base_dir.join(format!("{session_id}.jsonl"));
        let mut buf = String::new();
        for event in events {
            let json = serde_json::to_string(event)
                .map_err(|e| Error::Other(format!("serializing event: {e}")))?;
            buf.push_str(&json);
            buf.push('\n');
        }

        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(Error::Io)?;
        file.write_all(buf.as_bytes()).map_err(Error::Io)?;

        TraceEvent::TranscriptAppended {
            session_id: session_id.to_owned(),
            events: events.len(),
        }
        .emit();

        Ok(())
    }

    /// Read back a session's persisted events, skipping malformed lines.
    pub fn read(&self, session_id: &str) -> Result<Vec<Event>> {
        let path = self.base_dir.join(format!("{session_id}.jsonl"));
        if !path.exists() {
            return Ok(Vec::new());
        }

        let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
        let mut events = Vec::new();
        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Event>(line) {
                Ok(event) => events.push(event),
                Err(e) => {
                    tracing::warn!(session_id = session_id, error = %e, "skipping malformed transcript line");
                }
            }
        }
        Ok(events)
    }
}
