//! The Runner (§4.E): one deterministic loop that drives a single turn —
//! rehydrate transcript, call the active agent's provider, dispatch any
//! tool calls (including the special-cased `transfer_to_agent`), and
//! persist the result.
//!
//! Entry point: [`run_turn`].

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use beto_domain::error::Error;
use beto_domain::event::{Event, EventKind};
use beto_domain::tool::{ContentPart, Message, MessageContent, Role, ToolCall};
use beto_providers::ChatRequest;

use crate::state::AppState;

use super::cancel::CancelToken;
use super::provider_select::resolve_provider;
use super::tools::{build_tool_definitions, dispatch_tool, TRANSFER_TOOL_NAME};

/// Maximum number of tool-call round trips within one turn before the
/// Runner force-stops and returns whatever text it has.
const MAX_TOOL_LOOPS: usize = 25;

#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("session \"{0}\" does not exist")]
    UnknownSession(Uuid),
    #[error("turn cancelled")]
    Cancelled,
    #[error("turn timed out after {0}s")]
    TimedOut(u64),
    #[error(transparent)]
    Domain(#[from] Error),
}

/// The final, user-visible outcome of a turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub active_agent: String,
    pub response: String,
}

/// Run one turn of `session_id`: append the user message, loop the active
/// agent's provider + tool calls to completion, and persist every event.
///
/// Honors `ServerConfig::turn_timeout_sec` as a wall-clock budget for the
/// whole turn and `cancel_token` for cooperative cancellation between tool
/// calls.
pub async fn run_turn(
    state: Arc<AppState>,
    session_id: Uuid,
    user_message: String,
    cancel_token: CancelToken,
) -> Result<TurnOutcome, TurnError> {
    let timeout_sec = state.config.server.turn_timeout_sec;
    match tokio::time::timeout(
        Duration::from_secs(timeout_sec),
        run_turn_inner(state.clone(), session_id, user_message, cancel_token),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => {
            append_system_event(&state, session_id, "turn_timeout");
            Err(TurnError::TimedOut(timeout_sec))
        }
    }
}

async fn run_turn_inner(
    state: Arc<AppState>,
    session_id: Uuid,
    user_message: String,
    cancel_token: CancelToken,
) -> Result<TurnOutcome, TurnError> {
    let mut session = state.sessions.get(session_id).ok_or(TurnError::UnknownSession(session_id))?;

    let user_event = Event::new(
        session_id,
        session.next_seq(),
        EventKind::UserMessage { agent: session.active_agent.clone(), message: Message::user(user_message) },
    );
    session = state.sessions.append_event(session_id, user_event.clone()).unwrap_or(session);
    persist_and_fanout(&state, session_id, &user_event);

    let mut active_agent = session.active_agent.clone();

    for _ in 0..MAX_TOOL_LOOPS {
        if cancel_token.is_cancelled() {
            return Err(TurnError::Cancelled);
        }

        let agent = state
            .agents
            .get(&active_agent)
            .ok_or_else(|| TurnError::Domain(Error::Config(format!("unknown active agent \"{active_agent}\""))))?;

        let (provider, model) = resolve_provider(&state, agent.model_id.as_deref())?;
        let messages = rehydrate_messages(&state, session_id, &agent.instruction);
        let tool_defs = build_tool_definitions(&state, &agent);

        let req = ChatRequest {
            messages,
            tools: tool_defs,
            temperature: None,
            max_tokens: None,
            json_mode: false,
            model: Some(model),
        };

        let response = provider.chat(req).await?;

        if response.tool_calls.is_empty() {
            let event = Event::new(
                session_id,
                next_seq(&state, session_id),
                EventKind::ModelResponse { agent: active_agent.clone(), message: Message::assistant(response.content.clone()) },
            );
            state.sessions.append_event(session_id, event.clone());
            persist_and_fanout(&state, session_id, &event);

            return Ok(TurnOutcome { active_agent, response: response.content });
        }

        // Record the assistant's tool-use turn before dispatching.
        let assistant_event = Event::new(
            session_id,
            next_seq(&state, session_id),
            EventKind::ModelResponse {
                agent: active_agent.clone(),
                message: build_assistant_tool_message(&response.content, &response.tool_calls),
            },
        );
        state.sessions.append_event(session_id, assistant_event.clone());
        persist_and_fanout(&state, session_id, &assistant_event);

        for call in &response.tool_calls {
            if cancel_token.is_cancelled() {
                return Err(TurnError::Cancelled);
            }

            if call.tool_name == TRANSFER_TOOL_NAME {
                let target = call.arguments.get("agent_name").and_then(|v| v.as_str()).unwrap_or_default();
                match state.transfers.attempt_transfer(session_id, &active_agent, target) {
                    Ok(outcome) => {
                        state.sessions.set_active_agent(session_id, &outcome.to_agent);
                        let transfer_event = Event::new(
                            session_id,
                            next_seq(&state, session_id),
                            EventKind::AgentTransfer { from_agent: active_agent.clone(), to_agent: outcome.to_agent.clone() },
                        );
                        state.sessions.append_event(session_id, transfer_event.clone());
                        persist_and_fanout(&state, session_id, &transfer_event);

                        let greeting_event = Event::new(
                            session_id,
                            next_seq(&state, session_id),
                            EventKind::ModelResponse {
                                agent: outcome.to_agent.clone(),
                                message: Message::assistant(outcome.greeting.clone()),
                            },
                        );
                        state.sessions.append_event(session_id, greeting_event.clone());
                        persist_and_fanout(&state, session_id, &greeting_event);

                        return Ok(TurnOutcome { active_agent: outcome.to_agent, response: outcome.greeting });
                    }
                    Err(e) => {
                        let tool_event = Event::new(
                            session_id,
                            next_seq(&state, session_id),
                            EventKind::ToolResponse {
                                agent: active_agent.clone(),
                                call_id: call.call_id.clone(),
                                result: e.to_string(),
                                is_error: true,
                            },
                        );
                        state.sessions.append_event(session_id, tool_event.clone());
                        persist_and_fanout(&state, session_id, &tool_event);
                    }
                }
                continue;
            }

            let (result, is_error) = match dispatch_tool(&state, &call.tool_name, call.arguments.clone()).await {
                Ok(text) => (text, false),
                Err(e) => (e.to_string(), true),
            };

            let tool_event = Event::new(
                session_id,
                next_seq(&state, session_id),
                EventKind::ToolResponse {
                    agent: active_agent.clone(),
                    call_id: call.call_id.clone(),
                    result,
                    is_error,
                },
            );
            state.sessions.append_event(session_id, tool_event.clone());
            persist_and_fanout(&state, session_id, &tool_event);
        }

        active_agent = state.sessions.get(session_id).map(|s| s.active_agent).unwrap_or(active_agent);
    }

    Ok(TurnOutcome {
        active_agent: active_agent.clone(),
        response: "I was unable to finish this turn within the allotted tool-call budget.".into(),
    })
}

fn next_seq(state: &AppState, session_id: Uuid) -> u64 {
    state.sessions.get(session_id).map(|s| s.next_seq()).unwrap_or(0)
}

fn persist_and_fanout(state: &AppState, session_id: Uuid, event: &Event) {
    if let Err(e) = state.transcripts.append(&session_id.to_string(), std::slice::from_ref(event)) {
        tracing::warn!(error = %e, %session_id, "failed to persist transcript event");
    }
    state.fanout.publish(session_id, event);
}

fn append_system_event(state: &AppState, session_id: Uuid, message: &str) {
    let seq = next_seq(state, session_id);
    let event = Event::new(session_id, seq, EventKind::System { message: message.to_string() });
    state.sessions.append_event(session_id, event.clone());
    persist_and_fanout(state, session_id, &event);
}

/// Replay a session's event log into provider-ready messages, stripping
/// thought-marked content and prepending the active agent's instruction.
fn rehydrate_messages(state: &AppState, session_id: Uuid, instruction: &str) -> Vec<Message> {
    let mut messages = vec![Message::system(instruction)];
    let Some(session) = state.sessions.get(session_id) else { return messages };

    for event in &session.events {
        match &event.kind {
            EventKind::UserMessage { message, .. } => messages.push(Message {
                role: Role::User,
                content: message.content.without_thoughts(),
            }),
            EventKind::ModelResponse { message, .. } => messages.push(Message {
                role: Role::Assistant,
                content: message.content.without_thoughts(),
            }),
            EventKind::ToolResponse { call_id, result, is_error, .. } => {
                messages.push(Message {
                    role: Role::Tool,
                    content: MessageContent::Parts(vec![ContentPart::ToolResult {
                        tool_use_id: call_id.clone(),
                        content: result.clone(),
                        is_error: *is_error,
                    }]),
                });
            }
            EventKind::AgentTransfer { .. } | EventKind::ToolCall { .. } | EventKind::System { .. } => {}
        }
    }

    messages
}

fn build_assistant_tool_message(text: &str, tool_calls: &[ToolCall]) -> Message {
    let mut parts = Vec::new();
    if !text.is_empty() {
        parts.push(ContentPart::Text { text: text.to_string(), thought: false });
    }
    for tc in tool_calls {
        parts.push(ContentPart::ToolUse { id: tc.call_id.clone(), name: tc.tool_name.clone(), input: tc.arguments.clone() });
    }
    Message { role: Role::Assistant, content: MessageContent::Parts(parts) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_tool_msg_text_and_tools() {
        let calls = vec![ToolCall { call_id: "tc_a".into(), tool_name: "exec".into(), arguments: serde_json::json!({}) }];
        let msg = build_assistant_tool_message("thinking", &calls);
        match msg.content {
            MessageContent::Parts(parts) => assert_eq!(parts.len(), 2),
            _ => panic!("expected Parts"),
        }
    }

    #[test]
    fn build_tool_msg_empty_text_omits_text_part() {
        let msg = build_assistant_tool_message("", &[]);
        match msg.content {
            MessageContent::Parts(parts) => assert!(parts.is_empty()),
            _ => panic!("expected Parts"),
        }
    }
}
