//! Session management.
//!
//! Owns the per-session append-only event log, idle-timeout reset
//! lifecycle, and durable JSONL transcript persistence.

pub mod lifecycle;
pub mod store;
pub mod transcript;

pub use lifecycle::{LifecycleManager, ResetReason};
pub use store::SessionStore;
pub use transcript::TranscriptWriter;
