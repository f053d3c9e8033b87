//! Session reset lifecycle — idle timeout.
//!
//! Reset is evaluated on every inbound message. If the session has been
//! idle longer than `idle_minutes`, the store discards its event log and
//! hands the session back to the root agent.

use chrono::{DateTime, Utc};

use beto_domain::config::SessionsConfig;
use beto_domain::session::Session;

/// Reason a session was reset, if any.
#[derive(Debug, Clone)]
pub enum ResetReason {
    IdleTimeout { idle_minutes: u32 },
}

impl std::fmt::Display for ResetReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IdleTimeout { idle_minutes } => write!(f, "idle timeout ({idle_minutes}m)"),
        }
    }
}

/// The lifecycle manager evaluates whether a session should be reset.
pub struct LifecycleManager {
    config: SessionsConfig,
}

impl LifecycleManager {
    pub fn new(config: SessionsConfig) -> Self {
        Self { config }
    }

    /// Evaluate whether `session` should be reset given the current time.
    pub fn should_reset(&self, session: &Session, now: DateTime<Utc>) -> Option<ResetReason> {
        let idle_minutes = self.config.idle_minutes?;
        let elapsed = now.signed_duration_since(session.last_active).num_minutes();
        if elapsed >= idle_minutes as i64 {
            Some(ResetReason::IdleTimeout { idle_minutes })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_reset_when_idle_minutes_unset() {
        let mgr = LifecycleManager::new(SessionsConfig { idle_minutes: None, max_history_events: 200 });
        let mut session = Session::new("alice", "beto");
        session.last_active = Utc::now() - chrono::Duration::days(1);
        assert!(mgr.should_reset(&session, Utc::now()).is_none());
    }

    #[test]
    fn resets_after_idle_timeout() {
        let mgr = LifecycleManager::new(SessionsConfig { idle_minutes: Some(30), max_history_events: 200 });
        let mut session = Session::new("alice", "beto");
        session.last_active = Utc::now() - chrono::Duration::minutes(45);
        assert!(matches!(
            mgr.should_reset(&session, Utc::now()),
            Some(ResetReason::IdleTimeout { idle_minutes: 30 })
        ));
    }

    #[test]
    fn no_reset_within_idle_window() {
        let mgr = LifecycleManager::new(SessionsConfig { idle_minutes: Some(30), max_history_events: 200 });
        let mut session = Session::new("alice", "beto");
        session.last_active = Utc::now() - chrono::Duration::minutes(10);
        assert!(mgr.should_reset(&session, Utc::now()).is_none());
    }
}
