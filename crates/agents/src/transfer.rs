//! Transfer Controller (§4.C): the only mechanism for switching a session's
//! active agent. Validates the hub-and-spoke edge, emits the trace events
//! the admin surface and tests observe, and enforces context isolation --
//! the target agent never sees the triggering user message as something it
//! must respond to.

use std::sync::Arc;

use beto_domain::error::TransferError;
use beto_domain::trace::TraceEvent;
use uuid::Uuid;

use crate::registry::AgentRegistry;

/// The neutral message substituted for the original user turn when a
/// transfer tool call is forwarded, per the context-isolation rule.
pub const NEUTRAL_INIT_MESSAGE: &str = "Agent transfer initiated. Do not respond yet.";

/// Result of a successful transfer: the Runner appends this as the target
/// agent's first event instead of replaying the triggering user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub to_agent: String,
    pub greeting: String,
}

pub struct TransferController {
    registry: Arc<AgentRegistry>,
}

impl TransferController {
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self { registry }
    }

    /// Attempt a transfer from `from_agent` to `to_agent` within `session_id`.
    ///
    /// On success, emits `AgentTransfer` and returns the neutral greeting
    /// the Runner should append as the target's first event -- never the
    /// triggering user message. On failure, emits `TransferDenied` and
    /// leaves the active agent unchanged.
    pub fn attempt_transfer(
        &self,
        session_id: Uuid,
        from_agent: &str,
        to_agent: &str,
    ) -> Result<TransferOutcome, TransferError> {
        let from_info = self
            .registry
            .get(from_agent)
            .ok_or_else(|| TransferError::UnknownTarget(from_agent.to_string()))?;

        if !from_info.allowed_transfers.iter().any(|a| a == to_agent) {
            TraceEvent::TransferDenied {
                session_id: session_id.to_string(),
                from_agent: from_agent.to_string(),
                to_agent: to_agent.to_string(),
                reason: "not in allowed_transfers".into(),
            }
            .emit();
            return Err(TransferError::NotAllowed {
                from: from_agent.to_string(),
                to: to_agent.to_string(),
                allowed: from_info.allowed_transfers,
            });
        }

        if self.registry.get(to_agent).is_none() {
            TraceEvent::TransferDenied {
                session_id: session_id.to_string(),
                from_agent: from_agent.to_string(),
                to_agent: to_agent.to_string(),
                reason: "unknown target agent".into(),
            }
            .emit();
            return Err(TransferError::UnknownTarget(to_agent.to_string()));
        }

        TraceEvent::AgentTransfer {
            session_id: session_id.to_string(),
            from_agent: from_agent.to_string(),
            to_agent: to_agent.to_string(),
        }
        .emit();

        Ok(TransferOutcome {
            to_agent: to_agent.to_string(),
            greeting: format!("I am now {to_agent}. How can I help you today?"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::AgentSpec;

    fn registry_with_scout_and_axel() -> Arc<AgentRegistry> {
        let reg = AgentRegistry::new("beto");
        reg.register(AgentSpec {
            name: "beto".into(),
            description: String::new(),
            instruction: "coordinator".into(),
            model_id: None,
            tool_names: vec![],
            allowed_transfers: vec![],
        })
        .unwrap();
        reg.register(AgentSpec {
            name: "scout".into(),
            description: String::new(),
            instruction: "scout".into(),
            model_id: None,
            tool_names: vec![],
            allowed_transfers: vec!["axel".into()],
        })
        .unwrap();
        reg.register(AgentSpec {
            name: "axel".into(),
            description: String::new(),
            instruction: "axel".into(),
            model_id: None,
            tool_names: vec![],
            allowed_transfers: vec![],
        })
        .unwrap();
        Arc::new(reg)
    }

    #[test]
    fn root_can_transfer_to_any_specialist() {
        let registry = registry_with_scout_and_axel();
        let controller = TransferController::new(registry);
        let outcome = controller
            .attempt_transfer(Uuid::new_v4(), "beto", "scout")
            .unwrap();
        assert_eq!(outcome.to_agent, "scout");
        assert_eq!(outcome.greeting, "I am now scout. How can I help you today?");
    }

    #[test]
    fn declared_specialist_to_specialist_edge_is_allowed() {
        let registry = registry_with_scout_and_axel();
        let controller = TransferController::new(registry);
        assert!(controller.attempt_transfer(Uuid::new_v4(), "scout", "axel").is_ok());
    }

    #[test]
    fn undeclared_specialist_edge_is_denied() {
        let registry = registry_with_scout_and_axel();
        let controller = TransferController::new(registry);
        let err = controller.attempt_transfer(Uuid::new_v4(), "axel", "scout").unwrap_err();
        assert!(matches!(err, TransferError::NotAllowed { .. }));
    }

    #[test]
    fn every_specialist_can_transfer_back_to_root() {
        let registry = registry_with_scout_and_axel();
        let controller = TransferController::new(registry);
        assert!(controller.attempt_transfer(Uuid::new_v4(), "axel", "beto").is_ok());
    }

    #[test]
    fn transfer_to_unknown_agent_is_denied() {
        let registry = registry_with_scout_and_axel();
        let controller = TransferController::new(registry);
        let err = controller
            .attempt_transfer(Uuid::new_v4(), "beto", "nonexistent")
            .unwrap_err();
        assert!(matches!(err, TransferError::NotAllowed { .. }));
    }

    #[test]
    fn transfer_from_unregistered_agent_errors() {
        let registry = registry_with_scout_and_axel();
        let controller = TransferController::new(registry);
        let err = controller
            .attempt_transfer(Uuid::new_v4(), "ghost", "scout")
            .unwrap_err();
        assert!(matches!(err, TransferError::UnknownTarget(_)));
    }
}
