/// Shared error type used across all beto crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("tool: {0}")]
    Tool(#[from] ToolError),

    #[error("transfer: {0}")]
    Transfer(#[from] TransferError),

    #[error("{0}")]
    Other(String),
}

/// Errors raised while resolving or invoking a tool.
#[derive(thiserror::Error, Debug, Clone)]
pub enum ToolError {
    #[error("unknown tool \"{0}\"")]
    Unknown(String),
    #[error("tool \"{0}\" is disabled for this agent")]
    Disabled(String),
    #[error("tool \"{0}\" timed out after {1}ms")]
    Timeout(String, u64),
    #[error("tool \"{0}\" denied: {1}")]
    PermissionDenied(String, String),
    #[error("tool \"{0}\" failed: {1}")]
    Upstream(String, String),
}

/// Errors raised while attempting an agent-to-agent transfer.
#[derive(thiserror::Error, Debug, Clone)]
pub enum TransferError {
    #[error("unknown target agent \"{0}\"")]
    UnknownTarget(String),
    #[error("transfer from \"{from}\" to \"{to}\" is not permitted; allowed targets: {allowed:?}")]
    NotAllowed {
        from: String,
        to: String,
        allowed: Vec<String>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
