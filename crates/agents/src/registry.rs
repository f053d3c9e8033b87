//! Agent Registry & Graph.
//!
//! Holds every registered agent and the hub-and-spoke transfer graph: the
//! root agent ("beto") can transfer to any other registered agent; every
//! specialist can transfer back to root plus whatever additional edges it
//! declared at registration. `allowed_transfers` on the root is therefore
//! computed on read, never stored — it always reflects the current
//! registration set.

use std::collections::{HashMap, HashSet, VecDeque};

use beto_domain::agent::AgentInfo;
use parking_lot::RwLock;
use serde_json::Value;

/// Registration input for an agent. `allowed_transfers` here is the set of
/// *additional* specialist-to-specialist edges (e.g. scout -> axel); the
/// edge back to root is added automatically for every non-root agent, and
/// the root's outbound edges are derived from the full registration set.
#[derive(Debug, Clone)]
pub struct AgentSpec {
    pub name: String,
    pub description: String,
    pub instruction: String,
    pub model_id: Option<String>,
    pub tool_names: Vec<String>,
    pub allowed_transfers: Vec<String>,
}

/// The mandatory-return-clause appended to every non-root agent's
/// instruction at registration time (§4.C). The Runner does not enforce
/// this -- it's a contract the model is instructed to honor.
pub const MANDATORY_RETURN_CLAUSE: &str = "\n\nWhen you have completed your task, produce your \
text response, then call transfer_to_agent(agent_name='beto') to return control.";

struct StoredAgent {
    description: String,
    instruction: String,
    model_id: Option<String>,
    tool_names: Vec<String>,
    allowed_transfers: Vec<String>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    #[error("agent \"{0}\" already registered")]
    AlreadyRegistered(String),
    #[error("agent \"{agent}\" declares tool \"{tool}\" more than once")]
    DuplicateTool { agent: String, tool: String },
    #[error("agent \"{agent}\" declares a transfer to unknown agent \"{target}\"")]
    UnknownTransferTarget { agent: String, target: String },
}

pub struct AgentRegistry {
    root_name: String,
    agents: RwLock<HashMap<String, StoredAgent>>,
}

impl AgentRegistry {
    /// Create an empty registry. `root_name` names the coordinator agent
    /// ("beto") that every specialist transfers back to.
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            root_name: root_name.into(),
            agents: RwLock::new(HashMap::new()),
        }
    }

    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    /// Register an agent. Validates I4 (no duplicate tool names on this
    /// agent) immediately. I2 (declared transfer targets exist) is checked
    /// by [`Self::validate_graph`], called once after every agent in a
    /// bootstrap set has been registered -- specialists are free to declare
    /// edges to each other regardless of registration order.
    pub fn register(&self, spec: AgentSpec) -> Result<(), RegistryError> {
        let mut seen = HashSet::new();
        for tool in &spec.tool_names {
            if !seen.insert(tool.clone()) {
                return Err(RegistryError::DuplicateTool {
                    agent: spec.name.clone(),
                    tool: tool.clone(),
                });
            }
        }

        let mut agents = self.agents.write();
        if agents.contains_key(&spec.name) {
            return Err(RegistryError::AlreadyRegistered(spec.name));
        }

        let is_root = spec.name == self.root_name;
        let instruction = if is_root {
            spec.instruction
        } else {
            format!("{}{}", spec.instruction, MANDATORY_RETURN_CLAUSE)
        };

        agents.insert(
            spec.name.clone(),
            StoredAgent {
                description: spec.description,
                instruction,
                model_id: spec.model_id,
                tool_names: spec.tool_names,
                allowed_transfers: spec.allowed_transfers,
            },
        );
        Ok(())
    }

    /// Validate that every declared specialist-to-specialist edge resolves
    /// to a registered agent (I2). Call once a bootstrap registration batch
    /// is complete.
    pub fn validate_graph(&self) -> Result<(), RegistryError> {
        let agents = self.agents.read();
        for (name, agent) in agents.iter() {
            for target in &agent.allowed_transfers {
                if target != &self.root_name && !agents.contains_key(target) {
                    return Err(RegistryError::UnknownTransferTarget {
                        agent: name.clone(),
                        target: target.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Effective, read-only snapshot of a registered agent: the root's
    /// `allowed_transfers` is every other registered agent; every specialist's
    /// is its declared edges plus the implicit edge back to root.
    pub fn get(&self, name: &str) -> Option<AgentInfo> {
        let agents = self.agents.read();
        let agent = agents.get(name)?;

        let allowed_transfers = if name == self.root_name {
            let mut others: Vec<String> = agents.keys().filter(|k| *k != name).cloned().collect();
            others.sort();
            others
        } else {
            let mut edges: HashSet<String> = agent.allowed_transfers.iter().cloned().collect();
            edges.insert(self.root_name.clone());
            let mut edges: Vec<String> = edges.into_iter().collect();
            edges.sort();
            edges
        };

        Some(AgentInfo {
            name: name.to_string(),
            description: agent.description.clone(),
            instruction: agent.instruction.clone(),
            model_id: agent.model_id.clone(),
            tool_names: agent.tool_names.clone(),
            allowed_transfers,
            is_transfer_node: true,
        })
    }

    /// BFS over the transfer graph starting at root, with cycle detection
    /// via a visited set. Returns `None` if `name` is registered but
    /// unreachable from root (a dangling specialist with no path in).
    pub fn find(&self, name: &str) -> Option<AgentInfo> {
        if !self.agents.read().contains_key(name) {
            return None;
        }

        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(self.root_name.clone());
        visited.insert(self.root_name.clone());

        while let Some(current) = queue.pop_front() {
            if current == name {
                return self.get(name);
            }
            let info = self.get(&current)?;
            for next in info.allowed_transfers {
                if visited.insert(next.clone()) {
                    queue.push_back(next);
                }
            }
        }
        None
    }

    /// JSON introspection tree for the admin surface: root plus its
    /// reachable specialists, each annotated with tool and edge counts.
    pub fn tree(&self) -> Value {
        let agents = self.agents.read();
        let mut names: Vec<&String> = agents.keys().collect();
        names.sort();

        let nodes: Vec<Value> = names
            .into_iter()
            .map(|name| {
                let info = self.get(name).expect("name came from the same map");
                serde_json::json!({
                    "name": info.name,
                    "description": info.description,
                    "tool_count": info.effective_tool_count(),
                    "allowed_transfers": info.allowed_transfers,
                })
            })
            .collect();

        serde_json::json!({
            "root": self.root_name,
            "agents": nodes,
        })
    }

    pub fn len(&self) -> usize {
        self.agents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root_spec() -> AgentSpec {
        AgentSpec {
            name: "beto".into(),
            description: "coordinator".into(),
            instruction: "You are beto, the coordinator.".into(),
            model_id: None,
            tool_names: vec![],
            allowed_transfers: vec![],
        }
    }

    fn scout_spec() -> AgentSpec {
        AgentSpec {
            name: "scout".into(),
            description: "research specialist".into(),
            instruction: "You are scout.".into(),
            model_id: None,
            tool_names: vec!["web_search".into()],
            allowed_transfers: vec!["axel".into()],
        }
    }

    #[test]
    fn root_allowed_transfers_is_every_other_agent() {
        let reg = AgentRegistry::new("beto");
        reg.register(root_spec()).unwrap();
        reg.register(scout_spec()).unwrap();
        reg.register(AgentSpec {
            name: "axel".into(),
            description: "coding specialist".into(),
            instruction: "You are axel.".into(),
            model_id: None,
            tool_names: vec![],
            allowed_transfers: vec![],
        })
        .unwrap();

        let root = reg.get("beto").unwrap();
        assert_eq!(root.allowed_transfers, vec!["axel".to_string(), "scout".to_string()]);
    }

    #[test]
    fn specialist_always_includes_root_in_allowed_transfers() {
        let reg = AgentRegistry::new("beto");
        reg.register(root_spec()).unwrap();
        reg.register(scout_spec()).unwrap();

        let scout = reg.get("scout").unwrap();
        assert!(scout.allowed_transfers.contains(&"beto".to_string()));
        assert!(scout.allowed_transfers.contains(&"axel".to_string()));
    }

    #[test]
    fn non_root_instruction_gets_mandatory_return_clause() {
        let reg = AgentRegistry::new("beto");
        reg.register(root_spec()).unwrap();
        reg.register(scout_spec()).unwrap();

        let scout = reg.get("scout").unwrap();
        assert!(scout.instruction.contains("transfer_to_agent(agent_name='beto')"));

        let root = reg.get("beto").unwrap();
        assert!(!root.instruction.contains("transfer_to_agent"));
    }

    #[test]
    fn duplicate_tool_name_is_rejected() {
        let reg = AgentRegistry::new("beto");
        let spec = AgentSpec {
            name: "scout".into(),
            description: String::new(),
            instruction: String::new(),
            model_id: None,
            tool_names: vec!["web_search".into(), "web_search".into()],
            allowed_transfers: vec![],
        };
        let err = reg.register(spec).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateTool { .. }));
    }

    #[test]
    fn validate_graph_rejects_dangling_transfer_target() {
        let reg = AgentRegistry::new("beto");
        reg.register(root_spec()).unwrap();
        reg.register(scout_spec()).unwrap(); // declares axel, never registered

        let err = reg.validate_graph().unwrap_err();
        assert!(matches!(err, RegistryError::UnknownTransferTarget { .. }));
    }

    #[test]
    fn find_uses_bfs_from_root() {
        let reg = AgentRegistry::new("beto");
        reg.register(root_spec()).unwrap();
        reg.register(scout_spec()).unwrap();
        reg.register(AgentSpec {
            name: "axel".into(),
            description: String::new(),
            instruction: String::new(),
            model_id: None,
            tool_names: vec![],
            allowed_transfers: vec![],
        })
        .unwrap();

        assert!(reg.find("axel").is_some());
        assert!(reg.find("nonexistent").is_none());
    }

    #[test]
    fn tree_lists_every_registered_agent() {
        let reg = AgentRegistry::new("beto");
        reg.register(root_spec()).unwrap();
        reg.register(scout_spec()).unwrap();

        let tree = reg.tree();
        let agents = tree["agents"].as_array().unwrap();
        assert_eq!(agents.len(), 2);
    }
}
