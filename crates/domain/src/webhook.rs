use std::sync::OnceLock;

use hmac::{Hmac, Mac};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z0-9_.]+)\s*\}\}").unwrap())
}

/// Looks up a dotted path (`"user.name"`) into nested JSON, descending
/// through objects one segment at a time.
fn lookup_path<'a>(payload: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    path.split('.').try_fold(payload, |value, segment| value.get(segment))
}

/// An inbound webhook mapped to an agent invocation. `slug` is the URL
/// path segment under `/webhooks/{slug}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookDefinition {
    pub id: Uuid,
    pub slug: String,
    pub target_agent: String,
    pub prompt_template: String,
    #[serde(default)]
    pub secret: Option<String>,
    /// When true, `POST /webhooks/{slug}` returns 202 immediately instead
    /// of waiting for the synthesized turn to finish.
    #[serde(default)]
    pub fire_and_forget: bool,
}

impl WebhookDefinition {
    /// Verifies an `X-Signature: sha256=<hex>` style HMAC over the raw
    /// request body. Webhooks with no configured secret accept any
    /// request unsigned.
    pub fn verify_signature(&self, body: &[u8], signature_header: Option<&str>) -> bool {
        let Some(secret) = &self.secret else {
            return true;
        };
        let Some(header) = signature_header else {
            return false;
        };
        let provided_hex = header.strip_prefix("sha256=").unwrap_or(header);
        let Ok(provided) = hex::decode(provided_hex) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(body);
        let expected = mac.finalize().into_bytes();
        expected.as_slice().ct_eq(provided.as_slice()).into()
    }

    /// Renders the prompt template with `{{field}}` / `{{field.subfield}}`
    /// placeholders replaced by a dotted-path lookup into the parsed JSON
    /// request body. Unmatched placeholders are left as-is.
    pub fn render_prompt(&self, payload: &serde_json::Value) -> String {
        placeholder_pattern()
            .replace_all(&self.prompt_template, |caps: &regex::Captures| {
                let path = &caps[1];
                match lookup_path(payload, path) {
                    Some(serde_json::Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(secret: Option<&str>) -> WebhookDefinition {
        WebhookDefinition {
            id: Uuid::new_v4(),
            slug: "github".into(),
            target_agent: "beto".into(),
            prompt_template: "new event from {{sender}}: {{action}}".into(),
            secret: secret.map(|s| s.to_string()),
            fire_and_forget: false,
        }
    }

    #[test]
    fn unsigned_webhook_accepts_any_request() {
        let d = def(None);
        assert!(d.verify_signature(b"anything", None));
    }

    #[test]
    fn signed_webhook_rejects_missing_header() {
        let d = def(Some("topsecret"));
        assert!(!d.verify_signature(b"body", None));
    }

    #[test]
    fn signed_webhook_accepts_correct_signature() {
        let d = def(Some("topsecret"));
        let mut mac = HmacSha256::new_from_slice(b"topsecret").unwrap();
        mac.update(b"body");
        let sig = hex::encode(mac.finalize().into_bytes());
        assert!(d.verify_signature(b"body", Some(&format!("sha256={sig}"))));
    }

    #[test]
    fn signed_webhook_rejects_wrong_signature() {
        let d = def(Some("topsecret"));
        assert!(!d.verify_signature(b"body", Some("sha256=deadbeef")));
    }

    #[test]
    fn render_prompt_substitutes_fields() {
        let d = def(None);
        let payload = serde_json::json!({"sender": "octocat", "action": "opened"});
        assert_eq!(d.render_prompt(&payload), "new event from octocat: opened");
    }

    #[test]
    fn render_prompt_substitutes_nested_dotted_paths() {
        let mut d = def(None);
        d.prompt_template = "{{user.name}} pushed to {{repo.name}}".into();
        let payload = serde_json::json!({"user": {"name": "octocat"}, "repo": {"name": "hello-world"}});
        assert_eq!(d.render_prompt(&payload), "octocat pushed to hello-world");
    }

    #[test]
    fn render_prompt_leaves_unknown_placeholders_untouched() {
        let mut d = def(None);
        d.prompt_template = "hello {{missing.field}}".into();
        let payload = serde_json::json!({"sender": "octocat"});
        assert_eq!(d.render_prompt(&payload), "hello {{missing.field}}");
    }
}
