//! Resolve an agent's `model_id` override (`"provider_id/model_name"`) down
//! to a concrete provider handle and model name, falling back to
//! `llm.default_model` and then to the first registered provider.

use std::sync::Arc;

use beto_domain::error::Error;
use beto_providers::LlmProvider;

use crate::state::AppState;

/// Split a `"provider_id/model_name"` id into its two halves.
fn split_model_id(model_id: &str) -> (Option<&str>, &str) {
    match model_id.split_once('/') {
        Some((provider_id, model)) => (Some(provider_id), model),
        None => (None, model_id),
    }
}

/// Resolve the provider + model name to use for `model_id_override`
/// (usually `AgentSpec::model_id` or `AgentConfig::model`), falling back to
/// the configured default model and then to whichever provider registered
/// first.
pub fn resolve_provider(
    state: &AppState,
    model_id_override: Option<&str>,
) -> Result<(Arc<dyn LlmProvider>, String), Error> {
    let candidate = model_id_override
        .filter(|s| !s.is_empty())
        .or(state.config.llm.default_model.as_deref());

    let Some(model_id) = candidate else {
        let provider_id = state
            .providers
            .list_providers()
            .into_iter()
            .next()
            .ok_or_else(|| Error::Config("no LLM providers are registered".into()))?;
        let provider = state
            .providers
            .get(&provider_id)
            .ok_or_else(|| Error::Config(provider_id.clone()))?;
        let model = state
            .config
            .llm
            .providers
            .iter()
            .find(|p| p.id == provider_id)
            .and_then(|p| p.default_model.clone())
            .unwrap_or_default();
        return Ok((provider, model));
    };

    let (provider_id, model) = split_model_id(model_id);
    let provider = match provider_id {
        Some(id) => state
            .providers
            .get(id)
            .ok_or_else(|| Error::Config(format!("unknown provider \"{id}\" in model id \"{model_id}\"")))?,
        None => state
            .providers
            .list_providers()
            .into_iter()
            .next()
            .and_then(|id| state.providers.get(&id))
            .ok_or_else(|| Error::Config("no LLM providers are registered".into()))?,
    };

    Ok((provider, model.to_string()))
}
