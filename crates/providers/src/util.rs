//! Shared utility functions for provider adapters.

use beto_domain::config::{AuthConfig, AuthMode};
use beto_domain::error::{Error, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Http`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Resolve the API key from an [`AuthConfig`] whose mode is `ApiKey`.
///
/// Precedence: the plaintext `key` field (warns — prefer `env`), then the
/// `env` field (reads the named environment variable). Callers with
/// `AuthMode::None` should skip this entirely.
pub fn resolve_api_key(auth: &AuthConfig) -> Result<String> {
    if auth.mode != AuthMode::ApiKey {
        return Err(Error::Auth(format!(
            "resolve_api_key called on a provider with auth mode {:?}",
            auth.mode
        )));
    }

    if let Some(ref key) = auth.key {
        tracing::warn!("API key loaded from plaintext config field 'key' — prefer 'env' instead");
        return Ok(key.clone());
    }

    if let Some(ref env_var) = auth.env {
        return std::env::var(env_var)
            .map_err(|_| Error::Auth(format!("environment variable '{env_var}' not set or not valid UTF-8")));
    }

    Err(Error::Auth(
        "no API key configured: set 'key' or 'env' in AuthConfig".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_api_key_plaintext() {
        let auth = AuthConfig {
            mode: AuthMode::ApiKey,
            key: Some("sk-test-123".into()),
            ..Default::default()
        };
        let result = resolve_api_key(&auth).unwrap();
        assert_eq!(result, "sk-test-123");
    }

    #[test]
    fn resolve_api_key_env_var() {
        let var_name = "BETO_TEST_RESOLVE_ENV_KEY_1234";
        std::env::set_var(var_name, "env-secret-value");
        let auth = AuthConfig {
            mode: AuthMode::ApiKey,
            env: Some(var_name.into()),
            ..Default::default()
        };
        let result = resolve_api_key(&auth).unwrap();
        assert_eq!(result, "env-secret-value");
        std::env::remove_var(var_name);
    }

    #[test]
    fn resolve_api_key_env_var_missing() {
        let auth = AuthConfig {
            mode: AuthMode::ApiKey,
            env: Some("BETO_TEST_NONEXISTENT_VAR_8888".into()),
            ..Default::default()
        };
        let err = resolve_api_key(&auth).unwrap_err();
        assert!(err.to_string().contains("BETO_TEST_NONEXISTENT_VAR_8888"));
    }

    #[test]
    fn resolve_api_key_no_config() {
        let auth = AuthConfig {
            mode: AuthMode::ApiKey,
            ..Default::default()
        };
        let err = resolve_api_key(&auth).unwrap_err();
        assert!(err.to_string().contains("no API key configured"));
    }

    #[test]
    fn resolve_api_key_plaintext_takes_precedence_over_env() {
        let auth = AuthConfig {
            mode: AuthMode::ApiKey,
            key: Some("plaintext-wins".into()),
            env: Some("BETO_TEST_SHOULD_NOT_BE_READ".into()),
            ..Default::default()
        };
        let result = resolve_api_key(&auth).unwrap();
        assert_eq!(result, "plaintext-wins");
    }

    #[test]
    fn resolve_api_key_rejects_none_mode() {
        let auth = AuthConfig {
            mode: AuthMode::None,
            key: Some("irrelevant".into()),
            ..Default::default()
        };
        assert!(resolve_api_key(&auth).is_err());
    }
}
