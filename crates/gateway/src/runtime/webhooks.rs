//! Webhook Dispatcher (§4.J) persistence: a durable table of
//! [`WebhookDefinition`]s looked up by slug, the same load-on-open,
//! flush-whole-file-on-write shape as [`super::schedules::ScheduleStore`].

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use uuid::Uuid;

use beto_domain::error::{Error, Result};
use beto_domain::webhook::WebhookDefinition;

pub struct WebhookStore {
    path: PathBuf,
    definitions: RwLock<Vec<WebhookDefinition>>,
}

impl WebhookStore {
    pub fn open(state_dir: &Path) -> Result<Self> {
        let dir = state_dir.join("webhooks");
        std::fs::create_dir_all(&dir).map_err(Error::Io)?;
        let path = dir.join("webhooks.json");
        let definitions = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            Vec::new()
        };
        Ok(Self { path, definitions: RwLock::new(definitions) })
    }

    pub fn list(&self) -> Vec<WebhookDefinition> {
        self.definitions.read().clone()
    }

    pub fn find_by_slug(&self, slug: &str) -> Option<WebhookDefinition> {
        self.definitions.read().iter().find(|d| d.slug == slug).cloned()
    }

    pub fn create(&self, def: WebhookDefinition) -> Result<WebhookDefinition> {
        let mut defs = self.definitions.write();
        defs.push(def.clone());
        self.flush_locked(&defs)?;
        Ok(def)
    }

    pub fn delete(&self, id: Uuid) -> Result<bool> {
        let mut defs = self.definitions.write();
        let before = defs.len();
        defs.retain(|d| d.id != id);
        let removed = defs.len() != before;
        if removed {
            self.flush_locked(&defs)?;
        }
        Ok(removed)
    }

    fn flush_locked(&self, defs: &[WebhookDefinition]) -> Result<()> {
        let json = serde_json::to_string_pretty(defs).map_err(Error::Json)?;
        std::fs::write(&self.path, json).map_err(Error::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(slug: &str) -> WebhookDefinition {
        WebhookDefinition {
            id: Uuid::new_v4(),
            slug: slug.into(),
            target_agent: "beto".into(),
            prompt_template: "{{event}}".into(),
            secret: None,
            fire_and_forget: false,
        }
    }

    #[test]
    fn create_then_find_by_slug() {
        let dir = tempfile::tempdir().unwrap();
        let store = WebhookStore::open(dir.path()).unwrap();
        store.create(def("github")).unwrap();
        assert!(store.find_by_slug("github").is_some());
        assert!(store.find_by_slug("missing").is_none());
    }

    #[test]
    fn delete_removes_definition() {
        let dir = tempfile::tempdir().unwrap();
        let store = WebhookStore::open(dir.path()).unwrap();
        let d = store.create(def("gitlab")).unwrap();
        assert!(store.delete(d.id).unwrap());
        assert!(store.find_by_slug("gitlab").is_none());
    }
}
