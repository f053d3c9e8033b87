//! Core runtime: the Runner (one-turn orchestration loop), tool dispatch,
//! the axel worker pool, the scheduler, the reminder queue, and the
//! event bus that fans session events out to WebSocket subscribers.

pub mod cancel;
pub mod credentials;
pub mod cron;
pub mod fanout;
pub mod notify;
pub mod provider_select;
pub mod reminders;
pub mod schedules;
pub mod session_lock;
pub mod tools;
pub mod turn;
pub mod webhooks;
pub mod worker_pool;

pub use turn::{run_turn, TurnError};
