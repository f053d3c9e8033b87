//! `GET /ws/{session_id}` — WebSocket fanout of a session's event stream,
//! plus the chat/heartbeat/history/sync protocol messages.

use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use serde::Deserialize;
use uuid::Uuid;

use crate::runtime::cancel::CancelToken;
use crate::state::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, session_id))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Heartbeat,
    HistoryRequest { limit: Option<usize> },
    SyncRequest {
        #[serde(rename = "lastMessageId")]
        last_message_id: Option<Uuid>,
    },
    Chat { message: String },
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, session_id: Uuid) {
    if state.sessions.get(session_id).is_none() {
        let _ = socket
            .send(WsMessage::Text(serde_json::json!({"type": "error", "message": "unknown session"}).to_string()))
            .await;
        return;
    }

    let (subscriber_id, mut rx) = state.fanout.subscribe(session_id);

    loop {
        tokio::select! {
            forwarded = rx.recv() => {
                match forwarded {
                    Some(payload) => {
                        if socket.send(WsMessage::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(WsMessage::Text(text))) => {
                        if !handle_client_message(&state, session_id, &mut socket, &text).await {
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    state.fanout.unsubscribe(session_id, subscriber_id);
}

/// Handle one inbound client frame. Returns `false` when the connection
/// should close.
async fn handle_client_message(state: &Arc<AppState>, session_id: Uuid, socket: &mut WebSocket, text: &str) -> bool {
    let Ok(msg) = serde_json::from_str::<ClientMessage>(text) else {
        let _ = socket.send(WsMessage::Text(serde_json::json!({"type": "error", "message": "unrecognized message"}).to_string())).await;
        return true;
    };

    match msg {
        ClientMessage::Heartbeat => {
            let _ = socket.send(WsMessage::Text(serde_json::json!({"type": "heartbeat"}).to_string())).await;
        }
        ClientMessage::HistoryRequest { limit } => {
            let events = state.sessions.get(session_id).map(|s| s.events).unwrap_or_default();
            let limit = limit.unwrap_or(events.len());
            let tail: Vec<_> = events.into_iter().rev().take(limit).collect();
            let payload = serde_json::json!({"type": "history", "events": tail.into_iter().rev().collect::<Vec<_>>()});
            let _ = socket.send(WsMessage::Text(payload.to_string())).await;
        }
        ClientMessage::SyncRequest { last_message_id } => {
            let events = state.sessions.get(session_id).map(|s| s.events).unwrap_or_default();
            let missed: Vec<_> = match last_message_id {
                Some(id) => match events.iter().position(|e| e.id == id) {
                    Some(idx) => events[idx + 1..].to_vec(),
                    None => events,
                },
                None => events,
            };
            let payload = serde_json::json!({"type": "sync", "events": missed});
            let _ = socket.send(WsMessage::Text(payload.to_string())).await;
        }
        ClientMessage::Chat { message } => {
            if message.trim().is_empty() {
                return true;
            }
            let session_key = session_id.to_string();
            let permit = state.session_locks.acquire(&session_key).await;
            let Ok(_permit) = permit else {
                let _ = socket.send(WsMessage::Text(serde_json::json!({"type": "error", "message": "session is busy"}).to_string())).await;
                return true;
            };
            let cancel = CancelToken::new();
            if let Err(e) = crate::runtime::turn::run_turn(state.clone(), session_id, message, cancel).await {
                let _ = socket.send(WsMessage::Text(serde_json::json!({"type": "error", "message": e.to_string()}).to_string())).await;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_heartbeat() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type": "heartbeat"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Heartbeat));
    }

    #[test]
    fn parses_history_request_with_limit() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type": "history_request", "limit": 10}"#).unwrap();
        assert!(matches!(msg, ClientMessage::HistoryRequest { limit: Some(10) }));
    }

    #[test]
    fn sync_request_uses_camel_case_field_on_the_wire() {
        let id = Uuid::new_v4();
        let json = serde_json::json!({"type": "sync_request", "lastMessageId": id}).to_string();
        let msg: ClientMessage = serde_json::from_str(&json).unwrap();
        match msg {
            ClientMessage::SyncRequest { last_message_id } => assert_eq!(last_message_id, Some(id)),
            other => panic!("expected SyncRequest, got {other:?}"),
        }
    }

    #[test]
    fn parses_chat() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type": "chat", "message": "hi"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Chat { message } if message == "hi"));
    }
}
