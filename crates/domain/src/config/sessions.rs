use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Session lifecycle and history configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Idle timeout in minutes. A session untouched for longer than this
    /// starts a fresh event log on its next inbound message. `None` disables
    /// idle-based resets.
    #[serde(default)]
    pub idle_minutes: Option<u32>,
    /// Maximum number of prior events rehydrated into the model context
    /// window per turn.
    #[serde(default = "d_history_limit")]
    pub max_history_events: usize,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            idle_minutes: None,
            max_history_events: d_history_limit(),
        }
    }
}

fn d_history_limit() -> usize {
    200
}
