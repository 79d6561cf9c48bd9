use thiserror::Error;

use crate::access::AccessMode;

/// Convenience alias used by every fallible operation in this crate.
pub type Result<T> = std::result::Result<T, RegisterError>;

/// Error classes used to separate refusable conditions from misuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ErrorClass {
    /// Anticipated condition; the model state is unchanged and the caller may retry elsewhere.
    Refused,
    /// The caller broke an API contract (unknown name, duplicate definition, bad handle).
    ContractViolation,
}

/// Failures reported by registers, field maps and register files.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegisterError {
    /// A register must hold at least one bit.
    #[error("register `{name}` must be at least one bit wide")]
    ZeroWidth {
        /// Register name.
        name: String,
    },
    /// Field names are unique within one register.
    #[error("field `{name}` is already defined")]
    DuplicateField {
        /// Offending field name.
        name: String,
    },
    /// Field bounds were given as `high < low`.
    #[error("field `{name}` has high index {high} below low index {low}")]
    InvalidFieldRange {
        /// Offending field name.
        name: String,
        /// Requested low bit.
        low: usize,
        /// Requested high bit.
        high: usize,
    },
    /// A bit index or range fell outside the register width.
    #[error("bit range {low}..={high} exceeds register width {width}")]
    BitRangeOutOfBounds {
        /// Low bit of the rejected range.
        low: usize,
        /// High bit of the rejected range.
        high: usize,
        /// Width of the target register.
        width: usize,
    },
    /// Field access mode cannot live inside a register with a fixed mode.
    #[error("cannot create {field} field `{name}` in {register} register")]
    ModeConflict {
        /// Field name.
        name: String,
        /// Register-level mode.
        register: AccessMode,
        /// Requested field mode.
        field: AccessMode,
    },
    /// No field with that name exists on the register.
    #[error("register `{register}` has no field named `{field}`")]
    UnknownField {
        /// Register name.
        register: String,
        /// Missing field name.
        field: String,
    },
    /// A value of the wrong width was supplied.
    #[error("expected a {expected}-bit value, got {actual} bits")]
    WidthMismatch {
        /// Width the operation requires.
        expected: usize,
        /// Width that was supplied.
        actual: usize,
    },
    /// A byte buffer is larger than the register it targets.
    #[error("buffer of {requested} bytes exceeds the {available}-byte register")]
    AccessTooWide {
        /// Bytes requested by the caller.
        requested: usize,
        /// Byte size of the register.
        available: usize,
    },
    /// A textual bit pattern could not be parsed.
    #[error("invalid bit string `{0}`")]
    InvalidBitString(String),
    /// An untyped value cannot be converted to register bits.
    #[error("value of kind `{kind}` cannot be converted to register bits")]
    ValueTypeMismatch {
        /// Kind of the rejected value.
        kind: &'static str,
    },
    /// Register file alignment must be zero or a power of two.
    #[error("alignment {0} is not a power of two")]
    InvalidAlignment(u64),
    /// The register file was inserted into a parent and its layout is frozen.
    #[error("register file `{name}` is frozen")]
    Frozen {
        /// Frozen register file name.
        name: String,
    },
    /// Insertion address violates the effective alignment.
    #[error("address {address:#x} is not aligned for a {size}-byte element")]
    Unaligned {
        /// Requested address.
        address: u64,
        /// Element size in bytes.
        size: u64,
    },
    /// Insertion range overlaps an existing child.
    #[error("address range {address:#x}+{size} overlaps an existing element")]
    Occupied {
        /// Requested address.
        address: u64,
        /// Element size in bytes.
        size: u64,
    },
    /// Parent and child register files use different alignments.
    #[error("alignment {child} of child file does not match parent alignment {parent}")]
    AlignmentMismatch {
        /// Parent alignment.
        parent: u64,
        /// Child alignment.
        child: u64,
    },
    /// An explicit register file size is smaller than its occupied span.
    #[error("size {requested} is smaller than the occupied span of {occupied} bytes")]
    SizeTooSmall {
        /// Requested size.
        requested: u64,
        /// Bytes already occupied.
        occupied: u64,
    },
    /// A register file with no content and no explicit size cannot be placed.
    #[error("register file `{name}` is empty and has no explicit size")]
    EmptyRegisterFile {
        /// Empty file name.
        name: String,
    },
    /// A register file cannot be inserted into itself.
    #[error("register file `{name}` cannot contain itself")]
    SelfInsertion {
        /// File name.
        name: String,
    },
    /// Address arithmetic would leave the 64-bit address space.
    #[error("address range {address:#x}+{size} overflows the address space")]
    AddressOverflow {
        /// Requested address.
        address: u64,
        /// Element size in bytes.
        size: u64,
    },
    /// No register is mapped at the address.
    #[error("no register mapped at {0:#x}")]
    NoRegisterAt(u64),
    /// No register carries the name.
    #[error("no register named `{0}`")]
    NoRegisterNamed(String),
    /// No direct sub-file is mapped at the address.
    #[error("no register file mapped at {0:#x}")]
    NoRegisterFileAt(u64),
    /// No direct sub-file carries the name.
    #[error("no register file named `{0}`")]
    NoRegisterFileNamed(String),
    /// An arena handle refers to a released slot.
    #[error("stale arena handle")]
    StaleHandle,
    /// The entry is still referenced by at least one register file.
    #[error("entry is still referenced by {containers} register file(s)")]
    StillReferenced {
        /// Number of files referencing the entry.
        containers: u32,
    },
    /// The entry is owned by a register file and is released with it.
    #[error("entry is owned by a register file")]
    OwnedByFile,
    /// Merging a child into the flattened map hit an existing entry.
    #[error("flattened register map already holds an entry at {0:#x}")]
    FlattenCollision(u64),
}

impl RegisterError {
    /// Returns the error class used by callers to tell refusals from misuse.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Frozen { .. }
            | Self::Unaligned { .. }
            | Self::Occupied { .. }
            | Self::AlignmentMismatch { .. }
            | Self::SizeTooSmall { .. }
            | Self::EmptyRegisterFile { .. }
            | Self::AddressOverflow { .. }
            | Self::UnknownField { .. } => ErrorClass::Refused,
            Self::ZeroWidth { .. }
            | Self::DuplicateField { .. }
            | Self::InvalidFieldRange { .. }
            | Self::BitRangeOutOfBounds { .. }
            | Self::ModeConflict { .. }
            | Self::WidthMismatch { .. }
            | Self::AccessTooWide { .. }
            | Self::InvalidBitString(_)
            | Self::ValueTypeMismatch { .. }
            | Self::InvalidAlignment(_)
            | Self::SelfInsertion { .. }
            | Self::NoRegisterAt(_)
            | Self::NoRegisterNamed(_)
            | Self::NoRegisterFileAt(_)
            | Self::NoRegisterFileNamed(_)
            | Self::StaleHandle
            | Self::StillReferenced { .. }
            | Self::OwnedByFile
            | Self::FlattenCollision(_) => ErrorClass::ContractViolation,
        }
    }

    /// Refusals leave the model untouched and are safe to ignore.
    #[must_use]
    pub const fn is_refusal(&self) -> bool {
        matches!(self.class(), ErrorClass::Refused)
    }
}
