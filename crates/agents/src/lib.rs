//! Agent Registry & Graph and the Transfer Controller that sits on top of
//! it. Together these own the hub-and-spoke specialist topology: the root
//! coordinator agent ("beto") can reach every specialist directly, and
//! specialists can reach root plus whatever additional edges they declared.

pub mod registry;
pub mod transfer;

pub use registry::{AgentRegistry, AgentSpec, RegistryError, MANDATORY_RETURN_CLAUSE};
pub use transfer::{TransferController, TransferOutcome, NEUTRAL_INIT_MESSAGE};
