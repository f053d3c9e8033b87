use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A durable cron-style background invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub id: Uuid,
    pub name: String,
    pub cron_expression: String,
    pub prompt: String,
    pub target_agent: String,
    #[serde(default = "d_true")]
    pub enabled: bool,
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_run: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

fn d_true() -> bool {
    true
}

impl ScheduledTask {
    pub fn new(
        name: impl Into<String>,
        cron_expression: impl Into<String>,
        prompt: impl Into<String>,
        target_agent: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            cron_expression: cron_expression.into(),
            prompt: prompt.into(),
            target_agent: target_agent.into(),
            enabled: true,
            last_run: None,
            next_run: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_schedule_is_enabled_with_no_runs() {
        let task = ScheduledTask::new("daily-digest", "0 8 * * *", "summarize my day", "beto");
        assert!(task.enabled);
        assert!(task.last_run.is_none());
        assert!(task.next_run.is_none());
    }
}
