//! Event bus (§4.F): fans session events out to WebSocket subscribers.
//!
//! Grounded on the subscriber-list-per-key broadcast pattern used by the
//! cancellation/session-lock maps in [`crate::runtime::cancel`] and
//! [`crate::runtime::session_lock`] — a `parking_lot::RwLock` guarding a
//! `HashMap` of per-key subscriber vectors, with dead subscribers pruned on
//! send failure rather than on an explicit unsubscribe call.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use beto_domain::event::Event;

/// Large text fields are truncated to this many bytes before being sent to
/// a subscriber. The stored event itself is never mutated.
const FIELD_TRUNCATE_BYTES: usize = 100 * 1024;

/// Messages larger than this after truncation are replaced with an
/// "oversized" stub rather than sent whole.
const MESSAGE_CEILING_BYTES: usize = 1024 * 1024;

struct Subscriber {
    id: Uuid,
    tx: UnboundedSender<String>,
}

/// Per-session ordered subscriber lists, fed by [`EventBus::publish`].
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<HashMap<Uuid, Vec<Subscriber>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber for `session_id`. Returns a handle used to
    /// unsubscribe and the receiving end of the channel.
    pub fn subscribe(&self, session_id: Uuid) -> (Uuid, tokio::sync::mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.subscribers
            .write()
            .entry(session_id)
            .or_default()
            .push(Subscriber { id, tx });
        (id, rx)
    }

    pub fn unsubscribe(&self, session_id: Uuid, subscriber_id: Uuid) {
        if let Some(subs) = self.subscribers.write().get_mut(&session_id) {
            subs.retain(|s| s.id != subscriber_id);
        }
    }

    /// Publish `event` to every live subscriber of `session_id`, truncating
    /// large text fields per-subscriber and pruning any subscriber whose
    /// channel has closed.
    pub fn publish(&self, session_id: Uuid, event: &Event) {
        let mut subscribers = self.subscribers.write();
        let Some(subs) = subscribers.get_mut(&session_id) else { return };
        if subs.is_empty() {
            return;
        }

        let payload = match render_payload(event) {
            Some(p) => p,
            None => return,
        };

        subs.retain(|s| s.tx.send(payload.clone()).is_ok());
    }

    pub fn subscriber_count(&self, session_id: Uuid) -> usize {
        self.subscribers.read().get(&session_id).map(|s| s.len()).unwrap_or(0)
    }
}

fn render_payload(event: &Event) -> Option<String> {
    let mut value = serde_json::to_value(event).ok()?;
    truncate_fields(&mut value);
    let rendered = serde_json::to_string(&value).ok()?;
    if rendered.len() > MESSAGE_CEILING_BYTES {
        Some(
            serde_json::json!({
                "id": event.id,
                "session_id": event.session_id,
                "seq": event.seq,
                "type": "oversized",
            })
            .to_string(),
        )
    } else {
        Some(rendered)
    }
}

/// Recursively truncate string fields longer than [`FIELD_TRUNCATE_BYTES`]
/// in place, without mutating the caller's original `Event`.
fn truncate_fields(value: &mut Value) {
    match value {
        Value::String(s) => {
            if s.len() > FIELD_TRUNCATE_BYTES {
                let original_chars = s.chars().count();
                let mut end = FIELD_TRUNCATE_BYTES;
                while !s.is_char_boundary(end) {
                    end -= 1;
                }
                s.truncate(end);
                s.push_str(&format!(
                    "[Message truncated due to size constraints. Original length: {original_chars} characters]"
                ));
            }
        }
        Value::Array(items) => items.iter_mut().for_each(truncate_fields),
        Value::Object(map) => map.values_mut().for_each(truncate_fields),
        _ => {}
    }
}

pub type SharedEventBus = Arc<EventBus>;

#[cfg(test)]
mod tests {
    use super::*;
    use beto_domain::event::EventKind;

    #[test]
    fn publish_reaches_subscriber() {
        let bus = EventBus::new();
        let session_id = Uuid::new_v4();
        let (_sub_id, mut rx) = bus.subscribe(session_id);

        let event = Event::new(session_id, 0, EventKind::System { message: "hi".into() });
        bus.publish(session_id, &event);

        let received = rx.try_recv().unwrap();
        assert!(received.contains("\"hi\""));
    }

    #[test]
    fn publish_with_no_subscribers_is_a_noop() {
        let bus = EventBus::new();
        bus.publish(Uuid::new_v4(), &Event::new(Uuid::new_v4(), 0, EventKind::System { message: "x".into() }));
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let session_id = Uuid::new_v4();
        let (sub_id, mut rx) = bus.subscribe(session_id);
        bus.unsubscribe(session_id, sub_id);

        let event = Event::new(session_id, 0, EventKind::System { message: "hi".into() });
        bus.publish(session_id, &event);

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dead_subscriber_is_pruned_on_send_failure() {
        let bus = EventBus::new();
        let session_id = Uuid::new_v4();
        let (_sub_id, rx) = bus.subscribe(session_id);
        drop(rx);

        let event = Event::new(session_id, 0, EventKind::System { message: "hi".into() });
        bus.publish(session_id, &event);

        assert_eq!(bus.subscriber_count(session_id), 0);
    }

    #[test]
    fn truncate_fields_shortens_long_strings() {
        let mut value = serde_json::json!({"message": "a".repeat(FIELD_TRUNCATE_BYTES + 10)});
        truncate_fields(&mut value);
        assert!(value["message"].as_str().unwrap().len() < FIELD_TRUNCATE_BYTES + 10);
    }

    #[test]
    fn truncate_fields_carries_the_required_marker_and_original_length() {
        let original_len = FIELD_TRUNCATE_BYTES + 10;
        let mut value = serde_json::json!({"message": "a".repeat(original_len)});
        truncate_fields(&mut value);
        let truncated = value["message"].as_str().unwrap();
        assert!(truncated.ends_with(&format!(
            "[Message truncated due to size constraints. Original length: {original_len} characters]"
        )));
    }
}
