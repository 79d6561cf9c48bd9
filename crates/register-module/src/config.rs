//! Construction parameters of a register module.

use crate::error::{ModuleError, Result};

/// Default bus width in bits.
pub const DEFAULT_BUS_WIDTH_BITS: u32 = 32;

/// Parameters of a register module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ModuleConfig {
    /// Alignment of the main register file in bytes; zero aligns each
    /// element on its own size.
    pub alignment: u64,
    /// Width of the bus socket in bits.
    ///
    /// Describes the socket the module is bound to. Transactions are routed
    /// by register size whatever their length, so only [`ModuleConfig::validate`]
    /// reads it.
    pub bus_width_bits: u32,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            alignment: 0,
            bus_width_bits: DEFAULT_BUS_WIDTH_BITS,
        }
    }
}

impl ModuleConfig {
    /// Configuration with the given alignment and the default bus width.
    #[must_use]
    pub const fn aligned(alignment: u64) -> Self {
        Self {
            alignment,
            bus_width_bits: DEFAULT_BUS_WIDTH_BITS,
        }
    }

    /// Checks the bus width.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::InvalidBusWidth`] when the width is zero or not
    /// a multiple of 8.
    pub const fn validate(&self) -> Result<()> {
        if self.bus_width_bits == 0 || self.bus_width_bits % 8 != 0 {
            return Err(ModuleError::InvalidBusWidth(self.bus_width_bits));
        }
        Ok(())
    }
}
