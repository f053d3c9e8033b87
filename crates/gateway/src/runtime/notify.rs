//! Outbound notification sink: ntfy-style `POST {server}/{topic}`, used by
//! the Scheduler, Reminder Queue, and Worker Pool on completion/failure.

use serde::Deserialize;

const MAX_BODY_CHARS: usize = 2000;

#[derive(Debug, Clone, Deserialize)]
pub struct NtfyIntegration {
    pub server: String,
    pub topic: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
}

fn truncate_body(body: &str) -> String {
    if body.chars().count() <= MAX_BODY_CHARS {
        return body.to_string();
    }
    body.chars().take(MAX_BODY_CHARS).collect()
}

/// Push one notification. Failures are logged, never propagated — a
/// notification sink going down must not fail the scheduled run, reminder
/// fire, or worker pool completion that triggered it.
pub async fn notify(client: &reqwest::Client, integration: &NtfyIntegration, title: &str, body: &str) {
    let url = format!("{}/{}", integration.server.trim_end_matches('/'), integration.topic);
    let mut req = client.post(&url).body(truncate_body(body)).header("Title", title);
    if let Some(priority) = &integration.priority {
        req = req.header("Priority", priority.clone());
    }
    if let Some(tags) = &integration.tags {
        req = req.header("Tags", tags.clone());
    }

    match req.send().await {
        Ok(resp) if !resp.status().is_success() => {
            tracing::warn!(status = %resp.status(), url, "notification sink returned non-success status");
        }
        Err(e) => tracing::warn!(error = %e, url, "failed to reach notification sink"),
        Ok(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_body_leaves_short_body_untouched() {
        assert_eq!(truncate_body("hello"), "hello");
    }

    #[test]
    fn truncate_body_caps_at_max_chars() {
        let body = "x".repeat(MAX_BODY_CHARS + 500);
        assert_eq!(truncate_body(&body).chars().count(), MAX_BODY_CHARS);
    }
}
