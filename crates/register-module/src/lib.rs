//! Register modules exposing a register file on a memory-mapped bus.
//!
//! A [`RegModule`] owns a main register file inside a shared
//! [`register_model::RegisterArena`] and routes [`Transaction`]s to the
//! registers mapped in it, splitting wide transactions across consecutive
//! registers.

/// Module construction parameters.
pub mod config;
pub use config::ModuleConfig;

/// Module-level error taxonomy.
pub mod error;
pub use error::{ModuleError, Result};

/// Register module and bus routing.
pub mod module;
pub use module::{RegModule, SharedArena};

/// Bus transaction payloads and the target contract.
pub mod transaction;
pub use transaction::{Command, MemoryMappedTarget, ResponseStatus, Transaction};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
