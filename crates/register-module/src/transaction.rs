//! Bus transactions and the contract of a memory-mapped target.

/// Direction of a memory-mapped access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Command {
    /// Target fills the payload.
    Read,
    /// Target consumes the payload.
    Write,
}

/// Completion status reported by a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ResponseStatus {
    /// Not processed yet.
    #[default]
    Incomplete,
    /// Every byte was transferred.
    Ok,
    /// A register refused the access or the target could not serve it.
    GenericError,
    /// No register is mapped at some address the transaction covers.
    AddressError,
}

impl ResponseStatus {
    /// Whether the transaction completed.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Whether the transaction failed.
    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(self, Self::GenericError | Self::AddressError)
    }
}

/// Blocking memory-mapped transaction over a caller-owned byte buffer.
///
/// Bytes are little-endian: byte 0 lands in bits 0..8 of the first register.
#[derive(Debug)]
pub struct Transaction<'a> {
    address: u64,
    command: Command,
    data: &'a mut [u8],
    response: ResponseStatus,
}

impl<'a> Transaction<'a> {
    /// Transaction with an explicit command.
    pub fn new(address: u64, command: Command, data: &'a mut [u8]) -> Self {
        Self {
            address,
            command,
            data,
            response: ResponseStatus::Incomplete,
        }
    }

    /// Read of `data.len()` bytes starting at `address`.
    pub fn read(address: u64, data: &'a mut [u8]) -> Self {
        Self::new(address, Command::Read, data)
    }

    /// Write of `data` starting at `address`.
    pub fn write(address: u64, data: &'a mut [u8]) -> Self {
        Self::new(address, Command::Write, data)
    }

    /// Start address.
    #[must_use]
    pub const fn address(&self) -> u64 {
        self.address
    }

    /// Access direction.
    #[must_use]
    pub const fn command(&self) -> Command {
        self.command
    }

    /// Payload.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &*self.data
    }

    /// Mutable payload.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut *self.data
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Status set by the target.
    #[must_use]
    pub const fn response(&self) -> ResponseStatus {
        self.response
    }

    /// Records the completion status.
    pub fn set_response(&mut self, response: ResponseStatus) {
        self.response = response;
    }
}

/// Bus target serving blocking transactions.
pub trait MemoryMappedTarget {
    /// Serves `transaction` and records its status in it.
    fn b_transport(&mut self, transaction: &mut Transaction<'_>);
}
