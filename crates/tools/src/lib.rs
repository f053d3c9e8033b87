//! Built-in tools registered directly by the gateway, independent of MCP
//! discovery:
//! - `exec`: run shell commands foreground or auto-background after yieldMs
//! - `process`: manage background exec sessions (list/poll/log/write/kill)
//! - `file_ops`: read/write/list files under a workspace root

pub mod exec;
pub mod file_ops;
pub mod manager;
pub mod process;

pub use manager::ProcessManager;
