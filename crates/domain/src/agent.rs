use serde::{Deserialize, Serialize};

/// Read-only snapshot of a registered agent, as exposed over the API and
/// used by the transfer controller for graph validation. The live registry
/// (with bound tool invokers) lives above this crate; this is the shape
/// every consumer agrees on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInfo {
    pub name: String,
    pub description: String,
    pub instruction: String,
    pub model_id: Option<String>,
    /// Names of tools explicitly registered on this agent, in registration
    /// order. Never includes `transfer_to_agent`, which is auto-injected.
    pub tool_names: Vec<String>,
    pub allowed_transfers: Vec<String>,
    /// True if this agent is reachable from the coordinator's transfer
    /// graph and therefore has `transfer_to_agent` auto-injected.
    pub is_transfer_node: bool,
}

impl AgentInfo {
    pub fn effective_tool_count(&self) -> usize {
        self.tool_names.len() + if self.is_transfer_node { 1 } else { 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_tool_count_includes_transfer_tool() {
        let info = AgentInfo {
            name: "scout".into(),
            description: String::new(),
            instruction: String::new(),
            model_id: None,
            tool_names: vec!["web_search".into()],
            allowed_transfers: vec!["beto".into()],
            is_transfer_node: true,
        };
        assert_eq!(info.effective_tool_count(), 2);
    }

    #[test]
    fn effective_tool_count_excludes_transfer_tool_when_not_a_node() {
        let info = AgentInfo {
            name: "leaf".into(),
            description: String::new(),
            instruction: String::new(),
            model_id: None,
            tool_names: vec!["web_search".into()],
            allowed_transfers: vec![],
            is_transfer_node: false,
        };
        assert_eq!(info.effective_tool_count(), 1);
    }
}
