use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A one-shot timer that fires once at `fire_at` and injects `prompt`
/// into `target_agent`'s session. Shares the fire-invoke-notify shape
/// with [`crate::schedule::ScheduledTask`] but never recurs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub id: Uuid,
    pub fire_at: DateTime<Utc>,
    pub prompt: String,
    pub target_agent: String,
    #[serde(default)]
    pub delivered: bool,
}

impl Reminder {
    pub fn new(fire_at: DateTime<Utc>, prompt: impl Into<String>, target_agent: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            fire_at,
            prompt: prompt.into(),
            target_agent: target_agent.into(),
            delivered: false,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.delivered && now >= self.fire_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn is_due_false_before_fire_at() {
        let now = Utc::now();
        let r = Reminder::new(now + Duration::minutes(5), "take a break", "beto");
        assert!(!r.is_due(now));
    }

    #[test]
    fn is_due_true_after_fire_at() {
        let now = Utc::now();
        let r = Reminder::new(now - Duration::minutes(1), "take a break", "beto");
        assert!(r.is_due(now));
    }

    #[test]
    fn delivered_reminder_is_never_due() {
        let now = Utc::now();
        let mut r = Reminder::new(now - Duration::minutes(1), "take a break", "beto");
        r.delivered = true;
        assert!(!r.is_due(now));
    }
}
