//! Reminder Queue (§4.I): same fire → synthesized-turn → notify shape as
//! the Scheduler, but backed by a `BinaryHeap<Reverse<(DateTime<Utc>, Uuid)>>`
//! min-heap keyed by `fire_at` for O(log n) next-fire lookup, since
//! reminders are one-shot and typically far more numerous than scheduled
//! tasks.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use beto_domain::error::{Error, Result};
use beto_domain::reminder::Reminder;

use crate::state::AppState;

struct Inner {
    reminders: HashMap<Uuid, Reminder>,
    heap: BinaryHeap<Reverse<(DateTime<Utc>, Uuid)>>,
}

pub struct ReminderQueue {
    path: PathBuf,
    inner: RwLock<Inner>,
}

impl ReminderQueue {
    pub fn open(state_dir: &Path) -> Result<Self> {
        let dir = state_dir.join("reminders");
        std::fs::create_dir_all(&dir).map_err(Error::Io)?;
        let path = dir.join("reminders.json");
        let loaded: Vec<Reminder> = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            Vec::new()
        };

        let mut heap = BinaryHeap::new();
        let mut reminders = HashMap::new();
        for r in loaded {
            if !r.delivered {
                heap.push(Reverse((r.fire_at, r.id)));
            }
            reminders.insert(r.id, r);
        }

        Ok(Self { path, inner: RwLock::new(Inner { reminders, heap }) })
    }

    pub fn create(&self, reminder: Reminder) -> Result<Reminder> {
        let mut inner = self.inner.write();
        inner.heap.push(Reverse((reminder.fire_at, reminder.id)));
        inner.reminders.insert(reminder.id, reminder.clone());
        self.flush_locked(&inner)?;
        Ok(reminder)
    }

    pub fn list(&self) -> Vec<Reminder> {
        self.inner.read().reminders.values().cloned().collect()
    }

    pub fn delete(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.inner.write();
        let removed = inner.reminders.remove(&id).is_some();
        if removed {
            self.flush_locked(&inner)?;
        }
        Ok(removed)
    }

    /// Pop every reminder that is due as of `now`, marking each delivered.
    /// Entries popped off the heap for already-delivered/deleted reminders
    /// (stale heap entries left behind by `delete`) are silently skipped.
    fn drain_due(&self, now: DateTime<Utc>) -> Vec<Reminder> {
        let mut inner = self.inner.write();
        let mut due = Vec::new();

        while let Some(Reverse((fire_at, id))) = inner.heap.peek().copied() {
            if fire_at > now {
                break;
            }
            inner.heap.pop();
            if let Some(reminder) = inner.reminders.get_mut(&id) {
                if reminder.is_due(now) {
                    reminder.delivered = true;
                    due.push(reminder.clone());
                }
            }
        }

        if !due.is_empty() {
            let _ = self.flush_locked(&inner);
        }
        due
    }

    fn flush_locked(&self, inner: &Inner) -> Result<()> {
        let all: Vec<&Reminder> = inner.reminders.values().collect();
        let json = serde_json::to_string_pretty(&all).map_err(Error::Json)?;
        std::fs::write(&self.path, json).map_err(Error::Io)
    }
}

/// Background scan loop mirroring the scheduler's, polling the heap for
/// due reminders every second.
pub async fn run_scan_loop(state: Arc<AppState>) {
    let mut interval = tokio::time::interval(std::time::Duration::from_millis(1000));
    loop {
        interval.tick().await;
        let due = state.reminders.drain_due(Utc::now());
        for reminder in due {
            let state = state.clone();
            tokio::spawn(async move { fire(&state, &reminder).await });
        }
    }
}

async fn fire(state: &Arc<AppState>, reminder: &Reminder) {
    let session = state.sessions.create("system:reminder", &reminder.target_agent);
    let cancel = super::cancel::CancelToken::new();
    let result = super::turn::run_turn(state.clone(), session.id, reminder.prompt.clone(), cancel).await;

    let (title, body) = match &result {
        Ok(outcome) => ("reminder delivered".to_string(), outcome.response.clone()),
        Err(e) => ("reminder delivery failed".to_string(), e.to_string()),
    };
    state.notify_default(&title, &body).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn create_then_list_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let queue = ReminderQueue::open(dir.path()).unwrap();
        let r = Reminder::new(Utc::now() + Duration::minutes(5), "stretch", "beto");
        queue.create(r).unwrap();
        assert_eq!(queue.list().len(), 1);
    }

    #[test]
    fn drain_due_returns_only_past_due_reminders() {
        let dir = tempfile::tempdir().unwrap();
        let queue = ReminderQueue::open(dir.path()).unwrap();
        let now = Utc::now();
        queue.create(Reminder::new(now - Duration::minutes(1), "past", "beto")).unwrap();
        queue.create(Reminder::new(now + Duration::minutes(5), "future", "beto")).unwrap();

        let due = queue.drain_due(now);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].prompt, "past");
    }

    #[test]
    fn drained_reminder_is_not_drained_again() {
        let dir = tempfile::tempdir().unwrap();
        let queue = ReminderQueue::open(dir.path()).unwrap();
        let now = Utc::now();
        queue.create(Reminder::new(now - Duration::minutes(1), "past", "beto")).unwrap();

        assert_eq!(queue.drain_due(now).len(), 1);
        assert_eq!(queue.drain_due(now).len(), 0);
    }

    #[test]
    fn delete_removes_reminder() {
        let dir = tempfile::tempdir().unwrap();
        let queue = ReminderQueue::open(dir.path()).unwrap();
        let r = Reminder::new(Utc::now() + Duration::minutes(5), "stretch", "beto");
        let id = r.id;
        queue.create(r).unwrap();
        assert!(queue.delete(id).unwrap());
        assert!(queue.list().is_empty());
    }
}
