//! Scheduler (§4.H): a durable `Vec<ScheduledTask>` scanned on a ≤1s loop.
//! Hot-reload is implicit — CRUD mutates the live table the scanner reads
//! every tick, rather than a cached snapshot.
//!
//! Grounded on [`beto_sessions::store::SessionStore`]'s load-on-open,
//! flush-whole-file-on-write persistence shape, plus this crate's own
//! [`super::cron`] evaluator for `next_run` computation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use beto_domain::error::{Error, Result};
use beto_domain::schedule::ScheduledTask;

use super::cron::{cron_next_tz, parse_tz};
use crate::state::AppState;

pub struct ScheduleStore {
    path: PathBuf,
    tasks: RwLock<Vec<ScheduledTask>>,
    in_flight: RwLock<HashSet<Uuid>>,
}

impl ScheduleStore {
    pub fn open(state_dir: &Path) -> Result<Self> {
        let dir = state_dir.join("schedules");
        std::fs::create_dir_all(&dir).map_err(Error::Io)?;
        let path = dir.join("schedules.json");
        let tasks = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            Vec::new()
        };
        Ok(Self { path, tasks: RwLock::new(tasks), in_flight: RwLock::new(HashSet::new()) })
    }

    pub fn list(&self) -> Vec<ScheduledTask> {
        self.tasks.read().clone()
    }

    pub fn create(&self, task: ScheduledTask) -> Result<ScheduledTask> {
        let mut tasks = self.tasks.write();
        tasks.push(task.clone());
        self.flush_locked(&tasks)?;
        Ok(task)
    }

    pub fn delete(&self, id: Uuid) -> Result<bool> {
        let mut tasks = self.tasks.write();
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        let removed = tasks.len() != before;
        if removed {
            self.flush_locked(&tasks)?;
        }
        Ok(removed)
    }

    pub fn set_enabled(&self, id: Uuid, enabled: bool) -> Result<bool> {
        let mut tasks = self.tasks.write();
        let Some(task) = tasks.iter_mut().find(|t| t.id == id) else { return Ok(false) };
        task.enabled = enabled;
        self.flush_locked(&tasks)?;
        Ok(true)
    }

    /// Atomically claim a due task for execution. Returns `false` if the
    /// task is already running (I7/P6: at most one concurrent run per id).
    fn try_claim(&self, id: Uuid) -> bool {
        self.in_flight.write().insert(id)
    }

    fn release(&self, id: Uuid) {
        self.in_flight.write().remove(&id);
    }

    fn record_run(&self, id: Uuid, now: chrono::DateTime<Utc>) {
        let mut tasks = self.tasks.write();
        if let Some(task) = tasks.iter_mut().find(|t| t.id == id) {
            task.last_run = Some(now);
            task.next_run = cron_next_tz(&task.cron_expression, &now, parse_tz("UTC"));
        }
        let _ = self.flush_locked(&tasks);
    }

    fn flush_locked(&self, tasks: &[ScheduledTask]) -> Result<()> {
        let json = serde_json::to_string_pretty(tasks).map_err(Error::Json)?;
        std::fs::write(&self.path, json).map_err(Error::Io)
    }
}

/// Background scan loop: every tick, find enabled tasks whose `next_run`
/// has passed (or is unset, meaning "due immediately"), claim them, run
/// one synthesized turn each, and notify.
pub async fn run_scan_loop(state: Arc<AppState>) {
    let mut interval = tokio::time::interval(std::time::Duration::from_millis(1000));
    loop {
        interval.tick().await;
        let now = Utc::now();
        let due: Vec<ScheduledTask> = state
            .schedules
            .list()
            .into_iter()
            .filter(|t| t.enabled)
            .filter(|t| t.next_run.map(|nr| nr <= now).unwrap_or(true))
            .collect();

        for task in due {
            if !state.schedules.try_claim(task.id) {
                continue;
            }
            let state = state.clone();
            tokio::spawn(async move {
                fire(&state, &task).await;
                state.schedules.release(task.id);
                state.schedules.record_run(task.id, Utc::now());
            });
        }
    }
}

async fn fire(state: &Arc<AppState>, task: &ScheduledTask) {
    let session = state.sessions.create("system:scheduler", &task.target_agent);
    let cancel = super::cancel::CancelToken::new();
    let result = super::turn::run_turn(state.clone(), session.id, task.prompt.clone(), cancel).await;

    let (title, body) = match &result {
        Ok(outcome) => (format!("beto: schedule \"{}\" completed", task.name), outcome.response.clone()),
        Err(e) => (format!("beto: schedule \"{}\" failed", task.name), e.to_string()),
    };
    state.notify_default(&title, &body).await;
}
