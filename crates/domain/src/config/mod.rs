mod agents;
mod llm;
mod mcp;
mod observability;
mod server;
mod sessions;
mod tasks;
mod tools;

pub use agents::*;
pub use llm::*;
pub use mcp::*;
pub use observability::*;
pub use server::*;
pub use sessions::*;
pub use tasks::*;
pub use tools::*;

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    /// MCP (Model Context Protocol) server connections.
    #[serde(default)]
    pub mcp: McpConfig,
    /// Worker pool (decomposition/execution) concurrency settings.
    #[serde(default)]
    pub tasks: WorkerPoolConfig,
    /// Agent graph: coordinator + agent definitions.
    #[serde(default)]
    pub agents: AgentsConfig,
    /// Credential store and persistent-state database.
    #[serde(default)]
    pub credentials: CredentialsConfig,
    /// Named outbound integrations (ntfy endpoints, webhook signing, etc.),
    /// keyed by integration name. Values are integration-specific blobs.
    #[serde(default)]
    pub integrations: HashMap<String, serde_json::Value>,
    /// Named API keys accepted on inbound HTTP requests, keyed by label.
    /// Values are env var names holding the actual key material.
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
    /// Reusable instruction templates, keyed by name, referenced from
    /// agent definitions and webhook prompt templates.
    #[serde(default)]
    pub claude_templates: HashMap<String, String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Admin
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Environment variable holding the admin bearer token.
    /// If the env var is unset, admin endpoints are disabled (dev mode).
    #[serde(default = "d_admin_token_env")]
    pub token_env: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            token_env: d_admin_token_env(),
        }
    }
}

fn d_admin_token_env() -> String {
    "BETO_ADMIN_TOKEN".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Credentials & persistent state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Path to the SQLite database backing sessions, schedules, reminders,
    /// webhooks, and encrypted credentials.
    #[serde(default = "d_database_path")]
    pub database_path: std::path::PathBuf,
    /// Environment variable holding the master passphrase used to derive
    /// the per-credential encryption key (PBKDF2). Required before any
    /// credential can be stored or read; credential endpoints return an
    /// error while unset.
    #[serde(default = "d_credential_key_env")]
    pub credential_key_env: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            database_path: d_database_path(),
            credential_key_env: d_credential_key_env(),
        }
    }
}

fn d_database_path() -> std::path::PathBuf {
    std::path::PathBuf::from("./beto-state.db")
}
fn d_credential_key_env() -> String {
    "BETO_CREDENTIAL_KEY".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues. An empty
    /// vec means everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }

        if self.llm.providers.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "llm.providers".into(),
                message: "no LLM providers configured".into(),
            });
        }

        let mut seen_ids: HashSet<&str> = HashSet::new();
        for (i, provider) in self.llm.providers.iter().enumerate() {
            if provider.id.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("llm.providers[{i}].id"),
                    message: "provider id must not be empty".into(),
                });
            }
            if provider.base_url.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("llm.providers[{i}].base_url"),
                    message: "provider base_url must not be empty".into(),
                });
            }
            if !provider.base_url.is_empty()
                && !provider.base_url.starts_with("http://")
                && !provider.base_url.starts_with("https://")
            {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("llm.providers[{i}].base_url"),
                    message: format!(
                        "base_url must start with http:// or https:// (got \"{}\")",
                        provider.base_url
                    ),
                });
            }
            if !provider.id.is_empty() && !seen_ids.insert(&provider.id) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: format!("llm.providers[{i}].id"),
                    message: format!(
                        "duplicate provider id \"{}\" — later provider will shadow earlier one",
                        provider.id
                    ),
                });
            }

            let needs_credentials = matches!(provider.auth.mode, AuthMode::ApiKey);
            if needs_credentials {
                let has_env = provider.auth.env.as_ref().is_some_and(|v| !v.is_empty());
                let has_key = provider.auth.key.as_ref().is_some_and(|v| !v.is_empty());
                if !has_env && !has_key {
                    errors.push(ConfigError {
                        severity: ConfigSeverity::Error,
                        field: format!("llm.providers[{i}].auth"),
                        message: format!(
                            "provider \"{}\" uses {:?} auth mode but has no auth.env or auth.key configured",
                            provider.id, provider.auth.mode
                        ),
                    });
                }
            }
        }

        // ── Agent graph validation: I1 (unique names), I3 (transfers resolve) ──
        if !self.agents.definitions.contains_key(&self.agents.coordinator) {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "agents.coordinator".into(),
                message: format!(
                    "coordinator \"{}\" has no matching entry in agents.definitions",
                    self.agents.coordinator
                ),
            });
        }
        for (name, def) in &self.agents.definitions {
            for target in &def.allowed_transfers {
                if !self.agents.definitions.contains_key(target) {
                    errors.push(ConfigError {
                        severity: ConfigSeverity::Error,
                        field: format!("agents.definitions.{name}.allowed_transfers"),
                        message: format!(
                            "agent \"{name}\" declares a transfer target \"{target}\" that does not exist"
                        ),
                    });
                }
            }
        }

        if self.server.cors.allowed_origins.len() == 1 && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "server.cors.allowed_origins".into(),
                message: "wildcard \"*\" allows all origins (not recommended for production)"
                    .into(),
            });
        }

        if let Some(rl) = &self.server.rate_limit {
            if rl.requests_per_second == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "server.rate_limit.requests_per_second".into(),
                    message: "requests_per_second must be greater than 0".into(),
                });
            }
            if rl.burst_size == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "server.rate_limit.burst_size".into(),
                    message: "burst_size must be greater than 0".into(),
                });
            }
        }

        for (i, pattern) in self.tools.exec_security.denied_patterns.iter().enumerate() {
            if let Err(e) = regex::Regex::new(pattern) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("tools.exec_security.denied_patterns[{i}]"),
                    message: format!("invalid regex \"{pattern}\": {e}"),
                });
            }
        }

        let mut seen_mcp_ids: HashSet<&str> = HashSet::new();
        for (i, server) in self.mcp.servers.iter().enumerate() {
            if server.id.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("mcp.servers[{i}].id"),
                    message: "server id must not be empty".into(),
                });
            }
            if server.id.contains(':') {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("mcp.servers[{i}].id"),
                    message: "server id must not contain ':' (used as tool name delimiter)".into(),
                });
            }
            if server.transport == McpTransportKind::Stdio && server.command.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("mcp.servers[{i}].command"),
                    message: "stdio transport requires a non-empty command".into(),
                });
            }
            if !server.id.is_empty() && !seen_mcp_ids.insert(&server.id) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("mcp.servers[{i}].id"),
                    message: format!("duplicate MCP server id \"{}\"", server.id),
                });
            }
            for key in server.env.keys() {
                if matches!(
                    key.as_str(),
                    "LD_PRELOAD" | "LD_LIBRARY_PATH" | "DYLD_INSERT_LIBRARIES"
                ) {
                    errors.push(ConfigError {
                        severity: ConfigSeverity::Error,
                        field: format!("mcp.servers[{i}].env.{key}"),
                        message: format!("overriding {key} is not permitted for security"),
                    });
                }
            }
        }

        errors
    }

    /// Load configuration from a TOML file, then apply `BETO_`-prefixed
    /// environment variable overrides for the handful of fields operators
    /// most commonly need to override without editing the file (port, host,
    /// database path). Missing file is not an error — defaults apply.
    pub fn load(path: &std::path::Path) -> crate::error::Result<Config> {
        let mut config: Config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(crate::error::Error::Io)?;
            toml::from_str(&raw)
                .map_err(|e| crate::error::Error::Config(format!("parsing {}: {e}", path.display())))?
        } else {
            Config::default()
        };

        if let Ok(port) = std::env::var("BETO_PORT") {
            if let Ok(p) = port.parse() {
                config.server.port = p;
            }
        }
        if let Ok(host) = std::env::var("BETO_HOST") {
            config.server.host = host;
        }
        if let Ok(db) = std::env::var("BETO_DATABASE_PATH") {
            config.credentials.database_path = std::path::PathBuf::from(db);
        }

        Ok(config)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut definitions = HashMap::new();
        definitions.insert(
            "beto".to_string(),
            AgentConfig {
                description: "coordinator".into(),
                instruction: "You are beto.".into(),
                model: None,
                tool_policy: ToolPolicy::default(),
                allowed_transfers: vec!["scout".into()],
            },
        );
        definitions.insert(
            "scout".to_string(),
            AgentConfig {
                description: "research".into(),
                instruction: "You are scout.".into(),
                model: None,
                tool_policy: ToolPolicy::default(),
                allowed_transfers: vec!["beto".into()],
            },
        );

        Config {
            server: ServerConfig {
                port: 8080,
                host: "127.0.0.1".into(),
                ..ServerConfig::default()
            },
            llm: LlmConfig {
                providers: vec![ProviderConfig {
                    id: "openai".into(),
                    kind: ProviderKind::OpenaiCompat,
                    base_url: "https://api.openai.com/v1".into(),
                    auth: AuthConfig {
                        mode: AuthMode::ApiKey,
                        env: Some("OPENAI_API_KEY".into()),
                        ..AuthConfig::default()
                    },
                    default_model: None,
                }],
                ..LlmConfig::default()
            },
            agents: AgentsConfig {
                coordinator: "beto".into(),
                definitions,
            },
            ..Config::default()
        }
    }

    fn find_issue<'a>(issues: &'a [ConfigError], field_prefix: &str) -> Option<&'a ConfigError> {
        issues.iter().find(|e| e.field.starts_with(field_prefix))
    }

    #[test]
    fn valid_config_passes() {
        let issues = valid_config().validate();
        let errors: Vec<_> = issues
            .iter()
            .filter(|e| e.severity == ConfigSeverity::Error)
            .collect();
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn server_port_zero_is_error() {
        let mut cfg = valid_config();
        cfg.server.port = 0;
        let issues = cfg.validate();
        let issue = find_issue(&issues, "server.port").expect("expected server.port error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn provider_api_key_mode_no_credentials_is_error() {
        let mut cfg = valid_config();
        cfg.llm.providers[0].auth = AuthConfig {
            mode: AuthMode::ApiKey,
            env: None,
            key: None,
            ..AuthConfig::default()
        };
        let issues = cfg.validate();
        let issue = find_issue(&issues, "llm.providers[0].auth").expect("expected auth error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn coordinator_missing_definition_is_error() {
        let mut cfg = valid_config();
        cfg.agents.coordinator = "ghost".into();
        let issues = cfg.validate();
        let issue =
            find_issue(&issues, "agents.coordinator").expect("expected coordinator error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn unresolved_transfer_target_is_error() {
        let mut cfg = valid_config();
        cfg.agents
            .definitions
            .get_mut("scout")
            .unwrap()
            .allowed_transfers
            .push("axel".into());
        let issues = cfg.validate();
        let issue = find_issue(&issues, "agents.definitions.scout.allowed_transfers")
            .expect("expected unresolved-transfer error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn no_providers_is_warning() {
        let mut cfg = valid_config();
        cfg.llm.providers.clear();
        let issues = cfg.validate();
        let issue = find_issue(&issues, "llm.providers").expect("expected no-providers warning");
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn config_error_display_format() {
        let err = ConfigError {
            severity: ConfigSeverity::Error,
            field: "server.port".into(),
            message: "port must be greater than 0".into(),
        };
        assert_eq!(
            format!("{err}"),
            "[ERROR] server.port: port must be greater than 0"
        );
    }
}
