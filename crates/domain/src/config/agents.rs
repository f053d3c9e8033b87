use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Agent graph configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Top-level agent graph configuration: which agent is the entry point
/// for new sessions, and the per-agent definitions that make up the
/// transfer graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsConfig {
    /// Name of the coordinator agent — the entry point for new sessions.
    #[serde(default = "d_coordinator")]
    pub coordinator: String,
    /// Agent definitions keyed by name.
    #[serde(default)]
    pub definitions: HashMap<String, AgentConfig>,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            coordinator: d_coordinator(),
            definitions: HashMap::new(),
        }
    }
}

fn d_coordinator() -> String {
    "beto".into()
}

/// Configuration for a single agent in the transfer graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Human-readable description used in tool/agent introspection.
    #[serde(default)]
    pub description: String,
    /// System instruction / prompt for this agent.
    #[serde(default)]
    pub instruction: String,
    /// Model id override (format: `"provider_id/model_name"`). Falls back to
    /// `llm.default_model` when unset.
    #[serde(default)]
    pub model: Option<String>,
    /// Tool allow/deny policy.
    #[serde(default)]
    pub tool_policy: ToolPolicy,
    /// Names of agents this agent is allowed to transfer to. The coordinator
    /// is always an implicit allowed target for every non-coordinator agent.
    #[serde(default)]
    pub allowed_transfers: Vec<String>,
}

/// Tool allow/deny policy — prefix-based matching.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolPolicy {
    /// Tool name prefixes this agent may use. `["*"]` or empty = unrestricted.
    #[serde(default)]
    pub allow: Vec<String>,
    /// Tool name prefixes this agent is denied (evaluated before allow).
    #[serde(default)]
    pub deny: Vec<String>,
}

impl ToolPolicy {
    /// Check whether the given tool name is permitted by this policy.
    ///
    /// Matching is case-insensitive. Deny always wins over allow.
    pub fn allows(&self, tool_name: &str) -> bool {
        let name = tool_name.to_ascii_lowercase();

        for d in &self.deny {
            let d_lower = d.to_ascii_lowercase();
            if d_lower == "*" || name == d_lower || name.starts_with(&format!("{d_lower}.")) {
                return false;
            }
        }
        if self.allow.is_empty() || self.allow.iter().any(|a| a == "*") {
            return true;
        }
        for a in &self.allow {
            let a_lower = a.to_ascii_lowercase();
            if name == a_lower || name.starts_with(&format!("{a_lower}.")) {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_policy_empty_allows_all() {
        let policy = ToolPolicy::default();
        assert!(policy.allows("exec"));
        assert!(policy.allows("transfer_to_agent"));
    }

    #[test]
    fn tool_policy_allow_restricts() {
        let policy = ToolPolicy {
            allow: vec!["exec".into()],
            deny: vec![],
        };
        assert!(policy.allows("exec"));
        assert!(!policy.allows("webhook.create"));
    }

    #[test]
    fn tool_policy_deny_takes_precedence() {
        let policy = ToolPolicy {
            allow: vec!["*".into()],
            deny: vec!["exec".into()],
        };
        assert!(!policy.allows("exec"));
        assert!(policy.allows("webhook.create"));
    }

    #[test]
    fn tool_policy_deny_star_blocks_all() {
        let policy = ToolPolicy {
            allow: vec!["exec".into()],
            deny: vec!["*".into()],
        };
        assert!(!policy.allows("exec"));
    }

    #[test]
    fn tool_policy_case_insensitive() {
        let policy = ToolPolicy {
            allow: vec!["Exec".into()],
            deny: vec![],
        };
        assert!(policy.allows("exec"));
        assert!(policy.allows("EXEC"));
    }

    #[test]
    fn agents_config_default_coordinator_is_beto() {
        assert_eq!(AgentsConfig::default().coordinator, "beto");
    }
}
