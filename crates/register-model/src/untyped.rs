//! Value-erased view of a register for generic tooling.
//!
//! [`RegisterAccess`] is object safe so inspectors can hold
//! `&mut dyn RegisterAccess` without knowing the concrete register type.
//! Values cross this boundary as [`AnyValue`]. The untyped callback chains
//! are separate from the native ones and only run when they hold at least
//! one callback.

use std::fmt;
use std::rc::Rc;

use crate::access::AccessMode;
use crate::bits::BitVector;
use crate::callback::{AccessHooks, AccessOutcome, CallbackId};
use crate::error::{RegisterError, Result};
use crate::register::Register;

/// Dynamically typed value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum AnyValue {
    /// No value.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Unsigned integer.
    UInt(u64),
    /// Signed integer, converted to bits as two's complement.
    Int(i64),
    /// Binary digits (`0b...`, MSB first) or hex digits (`0x...`).
    Str(String),
    /// Bit vector.
    Bits(BitVector),
}

impl AnyValue {
    /// Short name of the variant.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::UInt(_) => "uint",
            Self::Int(_) => "int",
            Self::Str(_) => "string",
            Self::Bits(_) => "bits",
        }
    }

    /// Borrows the bit vector of a `Bits` value.
    #[must_use]
    pub const fn as_bits(&self) -> Option<&BitVector> {
        match self {
            Self::Bits(bits) => Some(bits),
            _ => None,
        }
    }

    /// Converts to a vector of exactly `width` bits.
    ///
    /// Integers are truncated to the width. `Bits` values and binary strings
    /// must already have that width.
    ///
    /// # Errors
    ///
    /// - [`RegisterError::ValueTypeMismatch`] for `Null`.
    /// - [`RegisterError::WidthMismatch`] for bits of another width.
    /// - [`RegisterError::InvalidBitString`] for an unparsable string.
    #[allow(clippy::cast_sign_loss)]
    pub fn to_bits(&self, width: usize) -> Result<BitVector> {
        let bits = match self {
            Self::Null => return Err(RegisterError::ValueTypeMismatch { kind: self.kind() }),
            Self::Bool(value) => BitVector::from_u64(width, u64::from(*value)),
            Self::UInt(value) => BitVector::from_u64(width, *value),
            Self::Int(value) => BitVector::from_u64(width, *value as u64),
            Self::Str(text) if text.starts_with("0x") || text.starts_with("0X") => {
                BitVector::from_hex_str(width, text)?
            }
            Self::Str(text) => BitVector::from_bin_str(text)?,
            Self::Bits(bits) => bits.clone(),
        };
        if bits.width() != width {
            return Err(RegisterError::WidthMismatch {
                expected: width,
                actual: bits.width(),
            });
        }
        Ok(bits)
    }
}

impl fmt::Display for AnyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::UInt(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Str(text) => f.write_str(text),
            Self::Bits(bits) => write!(f, "{bits}"),
        }
    }
}

impl From<BitVector> for AnyValue {
    fn from(bits: BitVector) -> Self {
        Self::Bits(bits)
    }
}

impl From<u64> for AnyValue {
    fn from(value: u64) -> Self {
        Self::UInt(value)
    }
}

impl From<i64> for AnyValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for AnyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for AnyValue {
    fn from(text: &str) -> Self {
        Self::Str(text.to_owned())
    }
}

/// Event passed to untyped read callbacks.
pub struct UntypedReadEvent<'a> {
    value: AnyValue,
    register: &'a mut dyn RegisterAccess,
}

impl UntypedReadEvent<'_> {
    /// Raw register data when the access started.
    #[must_use]
    pub const fn value(&self) -> &AnyValue {
        &self.value
    }

    /// The register being read.
    #[must_use]
    pub fn register(&self) -> &dyn RegisterAccess {
        &*self.register
    }

    /// Mutable handle for nested accesses on the same register.
    pub fn register_mut(&mut self) -> &mut dyn RegisterAccess {
        &mut *self.register
    }
}

/// Event passed to untyped write callbacks.
pub struct UntypedWriteEvent<'a> {
    old_value: AnyValue,
    new_value: AnyValue,
    register: &'a mut dyn RegisterAccess,
}

impl UntypedWriteEvent<'_> {
    /// Data before the write.
    #[must_use]
    pub const fn old_value(&self) -> &AnyValue {
        &self.old_value
    }

    /// Data the write commits.
    #[must_use]
    pub const fn new_value(&self) -> &AnyValue {
        &self.new_value
    }

    /// The register being written.
    #[must_use]
    pub fn register(&self) -> &dyn RegisterAccess {
        &*self.register
    }

    /// Mutable handle for nested accesses on the same register.
    pub fn register_mut(&mut self) -> &mut dyn RegisterAccess {
        &mut *self.register
    }
}

/// Vetoable untyped pre-read callback.
pub type UntypedPreReadFn = dyn Fn(&mut UntypedReadEvent<'_>) -> bool;
/// Untyped post-read callback.
pub type UntypedPostReadFn = dyn Fn(&mut UntypedReadEvent<'_>);
/// Vetoable untyped pre-write callback.
pub type UntypedPreWriteFn = dyn Fn(&mut UntypedWriteEvent<'_>) -> bool;
/// Untyped post-write callback.
pub type UntypedPostWriteFn = dyn Fn(&mut UntypedWriteEvent<'_>);

pub(crate) type UntypedHooks =
    AccessHooks<UntypedPreReadFn, UntypedPostReadFn, UntypedPreWriteFn, UntypedPostWriteFn>;

/// Value-erased register interface.
pub trait RegisterAccess {
    /// Width in bits.
    fn size_bits(&self) -> usize;

    /// Register name.
    fn register_name(&self) -> &str;

    /// Register description.
    fn register_description(&self) -> &str;

    /// Raw value snapshot; no callbacks run.
    fn any_value(&self) -> AnyValue;

    /// Replaces the raw value; no masks or callbacks apply.
    ///
    /// # Errors
    ///
    /// Fails when `value` does not convert to the register width.
    fn set_any_value(&mut self, value: &AnyValue) -> Result<()>;

    /// Reads through the access protocol; `None` when refused.
    fn read_any(&mut self) -> Option<AnyValue>;

    /// Writes through the access protocol.
    ///
    /// # Errors
    ///
    /// Fails when `value` does not convert to the register width.
    fn write_any(&mut self, value: &AnyValue) -> Result<AccessOutcome>;

    /// Defines a field with an unspecified mode and no description.
    ///
    /// # Errors
    ///
    /// Same as [`Register::create_field`].
    fn add_field(&mut self, name: &str, ind1: usize, ind2: usize) -> Result<()>;

    /// Raw bits of a named field.
    ///
    /// # Errors
    ///
    /// Fails when the field does not exist.
    fn field_value(&self, name: &str) -> Result<AnyValue>;

    /// `(low, high)` bounds of a named field.
    ///
    /// # Errors
    ///
    /// Fails when the field does not exist.
    fn field_bounds(&self, name: &str) -> Result<(usize, usize)>;

    /// Raw bits `[ind1, ind2]`.
    ///
    /// # Errors
    ///
    /// Fails when the range leaves the register.
    fn range_value(&self, ind1: usize, ind2: usize) -> Result<AnyValue>;

    /// Raw bit `index` as a boolean.
    ///
    /// # Errors
    ///
    /// Fails past the width.
    fn bit_value(&self, index: usize) -> Result<AnyValue>;

    /// Read mask.
    fn read_mask_value(&self) -> AnyValue;

    /// Overrides the read mask.
    ///
    /// # Errors
    ///
    /// Fails when `mask` does not convert to the register width.
    fn set_read_mask_value(&mut self, mask: &AnyValue) -> Result<()>;

    /// Write mask.
    fn write_mask_value(&self) -> AnyValue;

    /// Overrides the write mask.
    ///
    /// # Errors
    ///
    /// Fails when `mask` does not convert to the register width.
    fn set_write_mask_value(&mut self, mask: &AnyValue) -> Result<()>;

    /// Whether any untyped callback is registered.
    fn has_untyped_callbacks(&self) -> bool;

    /// Registers an untyped vetoable pre-read callback.
    fn register_untyped_pre_read_callback(&mut self, callback: Box<UntypedPreReadFn>) -> CallbackId;

    /// Registers an untyped post-read callback.
    fn register_untyped_post_read_callback(&mut self, callback: Box<UntypedPostReadFn>)
        -> CallbackId;

    /// Registers an untyped vetoable pre-write callback.
    fn register_untyped_pre_write_callback(&mut self, callback: Box<UntypedPreWriteFn>)
        -> CallbackId;

    /// Registers an untyped post-write callback.
    fn register_untyped_post_write_callback(
        &mut self,
        callback: Box<UntypedPostWriteFn>,
    ) -> CallbackId;

    /// Removes an untyped pre-read callback.
    fn unregister_untyped_pre_read_callback(&mut self, id: CallbackId) -> bool;

    /// Removes an untyped post-read callback.
    fn unregister_untyped_post_read_callback(&mut self, id: CallbackId) -> bool;

    /// Removes an untyped pre-write callback.
    fn unregister_untyped_pre_write_callback(&mut self, id: CallbackId) -> bool;

    /// Removes an untyped post-write callback.
    fn unregister_untyped_post_write_callback(&mut self, id: CallbackId) -> bool;

    /// Drops every untyped callback; returns whether any was registered.
    fn unregister_all_untyped_callbacks(&mut self) -> bool;
}

impl RegisterAccess for Register {
    fn size_bits(&self) -> usize {
        self.width()
    }

    fn register_name(&self) -> &str {
        self.name()
    }

    fn register_description(&self) -> &str {
        self.description()
    }

    fn any_value(&self) -> AnyValue {
        AnyValue::Bits(self.value().clone())
    }

    fn set_any_value(&mut self, value: &AnyValue) -> Result<()> {
        let bits = value.to_bits(self.width())?;
        self.set_value(&bits)
    }

    fn read_any(&mut self) -> Option<AnyValue> {
        self.read_value().map(AnyValue::Bits)
    }

    fn write_any(&mut self, value: &AnyValue) -> Result<AccessOutcome> {
        let bits = value.to_bits(self.width())?;
        self.write_value(&bits)
    }

    fn add_field(&mut self, name: &str, ind1: usize, ind2: usize) -> Result<()> {
        self.create_field(name, ind1, ind2, "", AccessMode::Unspecified)
    }

    fn field_value(&self, name: &str) -> Result<AnyValue> {
        self.field(name).map(AnyValue::Bits)
    }

    fn field_bounds(&self, name: &str) -> Result<(usize, usize)> {
        self.field_indexes(name)
    }

    fn range_value(&self, ind1: usize, ind2: usize) -> Result<AnyValue> {
        self.range(ind1, ind2).map(AnyValue::Bits)
    }

    fn bit_value(&self, index: usize) -> Result<AnyValue> {
        self.bit(index).map(AnyValue::Bool)
    }

    fn read_mask_value(&self) -> AnyValue {
        AnyValue::Bits(self.read_mask().clone())
    }

    fn set_read_mask_value(&mut self, mask: &AnyValue) -> Result<()> {
        let bits = mask.to_bits(self.width())?;
        self.set_read_mask(&bits)
    }

    fn write_mask_value(&self) -> AnyValue {
        AnyValue::Bits(self.write_mask().clone())
    }

    fn set_write_mask_value(&mut self, mask: &AnyValue) -> Result<()> {
        let bits = mask.to_bits(self.width())?;
        self.set_write_mask(&bits)
    }

    fn has_untyped_callbacks(&self) -> bool {
        self.untyped_hooks().count() > 0
    }

    fn register_untyped_pre_read_callback(&mut self, callback: Box<UntypedPreReadFn>) -> CallbackId {
        let id = self.allocate_callback_id();
        self.untyped_hooks_mut().pre_read.push(id, Rc::from(callback));
        id
    }

    fn register_untyped_post_read_callback(
        &mut self,
        callback: Box<UntypedPostReadFn>,
    ) -> CallbackId {
        let id = self.allocate_callback_id();
        self.untyped_hooks_mut().post_read.push(id, Rc::from(callback));
        id
    }

    fn register_untyped_pre_write_callback(
        &mut self,
        callback: Box<UntypedPreWriteFn>,
    ) -> CallbackId {
        let id = self.allocate_callback_id();
        self.untyped_hooks_mut().pre_write.push(id, Rc::from(callback));
        id
    }

    fn register_untyped_post_write_callback(
        &mut self,
        callback: Box<UntypedPostWriteFn>,
    ) -> CallbackId {
        let id = self.allocate_callback_id();
        self.untyped_hooks_mut().post_write.push(id, Rc::from(callback));
        id
    }

    fn unregister_untyped_pre_read_callback(&mut self, id: CallbackId) -> bool {
        self.untyped_hooks_mut().pre_read.remove(id)
    }

    fn unregister_untyped_post_read_callback(&mut self, id: CallbackId) -> bool {
        self.untyped_hooks_mut().post_read.remove(id)
    }

    fn unregister_untyped_pre_write_callback(&mut self, id: CallbackId) -> bool {
        self.untyped_hooks_mut().pre_write.remove(id)
    }

    fn unregister_untyped_post_write_callback(&mut self, id: CallbackId) -> bool {
        self.untyped_hooks_mut().post_write.remove(id)
    }

    fn unregister_all_untyped_callbacks(&mut self) -> bool {
        let had_any = self.has_untyped_callbacks();
        self.untyped_hooks_mut().clear();
        had_any
    }
}

pub(crate) fn run_pre_read(register: &mut Register, value: &BitVector) -> bool {
    let chain = register.untyped_hooks().pre_read.snapshot();
    let mut event = UntypedReadEvent {
        value: AnyValue::Bits(value.clone()),
        register,
    };
    chain.iter().all(|callback| callback(&mut event))
}

pub(crate) fn run_post_read(register: &mut Register, value: &BitVector) {
    let chain = register.untyped_hooks().post_read.snapshot();
    let mut event = UntypedReadEvent {
        value: AnyValue::Bits(value.clone()),
        register,
    };
    for callback in &chain {
        callback(&mut event);
    }
}

pub(crate) fn run_pre_write(register: &mut Register, old_value: &BitVector, new_value: &BitVector) -> bool {
    let chain = register.untyped_hooks().pre_write.snapshot();
    let mut event = UntypedWriteEvent {
        old_value: AnyValue::Bits(old_value.clone()),
        new_value: AnyValue::Bits(new_value.clone()),
        register,
    };
    chain.iter().all(|callback| callback(&mut event))
}

pub(crate) fn run_post_write(register: &mut Register, old_value: &BitVector, new_value: &BitVector) {
    let chain = register.untyped_hooks().post_write.snapshot();
    let mut event = UntypedWriteEvent {
        old_value: AnyValue::Bits(old_value.clone()),
        new_value: AnyValue::Bits(new_value.clone()),
        register,
    };
    for callback in &chain {
        callback(&mut event);
    }
}
