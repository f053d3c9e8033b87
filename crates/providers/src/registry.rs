//! Provider registry.
//!
//! Constructs and holds all configured LLM provider instances. At startup the
//! registry reads the [`LlmConfig`], resolves authentication (env vars, direct
//! keys), and instantiates the appropriate adapter for each configured provider.

use crate::anthropic::AnthropicProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::LlmProvider;
use beto_domain::config::{LlmConfig, ProviderKind};
use std::collections::HashMap;
use std::sync::Arc;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ProviderRegistry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Holds all instantiated LLM providers.
///
/// Providers that fail to initialize (bad auth config, missing env var) are
/// skipped rather than aborting startup; their errors are recorded for
/// `/v1/models/readiness` and dashboard reporting.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    /// Provider IDs that failed to initialize, with their error messages.
    init_errors: Vec<ProviderInitError>,
}

/// Records a provider that failed to initialize.
#[derive(Debug, Clone)]
pub struct ProviderInitError {
    pub provider_id: String,
    pub kind: String,
    /// Error message with any potential secrets masked.
    pub error: String,
}

/// Mask substrings that look like API keys or bearer tokens in an error
/// message. This prevents raw secrets from leaking into logs, readiness
/// endpoints, or dashboard UIs.
fn mask_secrets(msg: &str) -> String {
    let mut result = msg.to_string();
    for word in msg.split(|c: char| c.is_whitespace() || c == '\'' || c == '"' || c == ',') {
        let trimmed = word.trim();
        if trimmed.len() >= 20
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            let masked = if trimmed.len() > 8 {
                format!("{}...{}", &trimmed[..4], &trimmed[trimmed.len() - 4..])
            } else {
                "***masked***".to_string()
            };
            result = result.replace(trimmed, &masked);
        }
    }
    result
}

impl ProviderRegistry {
    /// Build the registry from the application's [`LlmConfig`].
    ///
    /// Each entry in `config.providers` is instantiated using the appropriate
    /// adapter based on its `kind`. Auth keys are resolved eagerly (env vars
    /// are read at this point).
    pub fn from_config(config: &LlmConfig) -> Self {
        let mut providers: HashMap<String, Arc<dyn LlmProvider>> = HashMap::new();
        let mut init_errors: Vec<ProviderInitError> = Vec::new();

        for pc in &config.providers {
            let result: beto_domain::error::Result<Arc<dyn LlmProvider>> = match pc.kind {
                ProviderKind::OpenaiCompat => {
                    OpenAiCompatProvider::from_config(pc).map(|p| Arc::new(p) as Arc<dyn LlmProvider>)
                }
                ProviderKind::Anthropic => {
                    AnthropicProvider::from_config(pc).map(|p| Arc::new(p) as Arc<dyn LlmProvider>)
                }
            };

            match result {
                Ok(provider) => {
                    tracing::info!(provider_id = %pc.id, kind = ?pc.kind, "registered LLM provider");
                    providers.insert(pc.id.clone(), provider);
                }
                Err(e) => {
                    let safe_error = mask_secrets(&e.to_string());
                    tracing::warn!(
                        provider_id = %pc.id,
                        kind = ?pc.kind,
                        error = %safe_error,
                        "failed to initialize LLM provider, skipping"
                    );
                    init_errors.push(ProviderInitError {
                        provider_id: pc.id.clone(),
                        kind: format!("{:?}", pc.kind),
                        error: safe_error,
                    });
                }
            }
        }

        if providers.is_empty() && !config.providers.is_empty() {
            tracing::warn!(
                failed_providers = init_errors.len(),
                "no LLM providers initialized; gateway will boot but LLM endpoints will \
                 fail until auth is configured — check /v1/models/readiness for details"
            );
        }

        Self {
            providers,
            init_errors,
        }
    }

    /// Look up a provider by its config id.
    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers.get(provider_id).cloned()
    }

    /// Iterate over all registered providers.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Arc<dyn LlmProvider>)> {
        self.providers.iter()
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// List all registered provider IDs (sorted).
    pub fn list_providers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Provider initialization errors (empty if all succeeded).
    ///
    /// Surfaced in `/v1/models/readiness` and the dashboard so operators can
    /// diagnose missing API keys or misconfigured providers without needing
    /// to scrape startup logs.
    pub fn init_errors(&self) -> &[ProviderInitError] {
        &self.init_errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_secrets_redacts_long_token_like_substrings() {
        let msg = "auth failed for key sk-ant-REDACTED";
        let masked = mask_secrets(msg);
        assert!(!masked.contains("abcdefghijklmnopqrstuvwxyz0123456789"));
        assert!(masked.contains("..."));
    }

    #[test]
    fn mask_secrets_leaves_short_words_alone() {
        let msg = "provider not found: my-provider";
        assert_eq!(mask_secrets(msg), msg);
    }

    #[test]
    fn empty_config_yields_empty_registry() {
        let registry = ProviderRegistry::from_config(&LlmConfig::default());
        assert!(registry.is_empty());
        assert!(registry.init_errors().is_empty());
    }

    #[test]
    fn provider_missing_auth_is_recorded_as_init_error_not_fatal() {
        use beto_domain::config::{AuthConfig, AuthMode, ProviderConfig};

        let config = LlmConfig {
            providers: vec![ProviderConfig {
                id: "broken".into(),
                kind: ProviderKind::Anthropic,
                base_url: "https://api.anthropic.com".into(),
                auth: AuthConfig {
                    mode: AuthMode::ApiKey,
                    ..Default::default()
                },
                default_model: None,
            }],
            ..Default::default()
        };

        let registry = ProviderRegistry::from_config(&config);
        assert!(registry.is_empty());
        assert_eq!(registry.init_errors().len(), 1);
        assert_eq!(registry.init_errors()[0].provider_id, "broken");
    }
}
