//! Errors raised while building a register module.

use register_model::RegisterError;
use thiserror::Error;

/// Result alias for module operations.
pub type Result<T> = std::result::Result<T, ModuleError>;

/// Failures raised while building or wiring register modules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleError {
    /// Underlying register model failure.
    #[error(transparent)]
    Register(#[from] RegisterError),
    /// The other module keeps its registers in a different arena.
    #[error("register module `{0}` lives in another arena")]
    ForeignArena(String),
    /// The shared arena is already mutably borrowed, typically from a callback.
    #[error("register arena is already borrowed")]
    ArenaBusy,
    /// Bus width is zero or not a whole number of bytes.
    #[error("bus width must be a non-zero multiple of 8 bits, got {0}")]
    InvalidBusWidth(u32),
}

impl ModuleError {
    /// Whether the failure is a recoverable refusal of the register model.
    #[must_use]
    pub const fn is_refusal(&self) -> bool {
        match self {
            Self::Register(error) => error.is_refusal(),
            Self::ForeignArena(_) | Self::ArenaBusy | Self::InvalidBusWidth(_) => false,
        }
    }
}
