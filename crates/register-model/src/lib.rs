//! Memory-mapped hardware register model.
//!
//! Registers hold a fixed-width bit vector guarded by read and write masks,
//! carry named bit fields, and run caller-supplied callback chains around
//! every access. Register files place registers and nested register files
//! in a byte-addressed space owned by a [`RegisterArena`].

/// Register and field access modes.
pub mod access;
pub use access::AccessMode;

/// Handle-based storage for registers and register files.
pub mod arena;
pub use arena::{FileId, RegisterArena, RegisterId};

/// Fixed-width bit vectors.
pub mod bits;
pub use bits::BitVector;

/// Access callback types and events.
pub mod callback;
pub use callback::{
    AccessOutcome, CallbackId, PostReadFn, PostWriteFn, PreReadFn, PreWriteFn, RegisterReadEvent,
    RegisterWriteEvent,
};

/// Error taxonomy.
pub mod error;
pub use error::{ErrorClass, RegisterError, Result};

/// Named bit ranges.
pub mod field;
pub use field::{Field, FieldMap};

/// Masked registers with callback chains.
pub mod register;
pub use register::Register;

/// Byte-addressed register file layout.
pub mod register_file;
pub use register_file::{RegisterFileMut, RegisterFileRef};

mod table;

/// Width-agnostic register access.
pub mod untyped;
pub use untyped::{
    AnyValue, RegisterAccess, UntypedPostReadFn, UntypedPostWriteFn, UntypedPreReadFn,
    UntypedPreWriteFn, UntypedReadEvent, UntypedWriteEvent,
};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
