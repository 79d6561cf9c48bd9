//! Bit-accurate register with masked access and callback chains.

use std::fmt;
use std::rc::Rc;

use crate::access::AccessMode;
use crate::bits::BitVector;
use crate::callback::{
    AccessOutcome, CallbackId, NativeHooks, RegisterReadEvent, RegisterWriteEvent,
};
use crate::error::{RegisterError, Result};
use crate::field::FieldMap;
use crate::table::TextTable;
use crate::untyped::{self, UntypedHooks};

/// Hardware register model.
///
/// Byte accesses go through the read/write protocol: pre callbacks (which
/// may veto), masked data transfer, then post callbacks. Model-side setters
/// such as [`Register::set_value`] and [`Register::set_field`] bypass both
/// masks and callbacks.
pub struct Register {
    name: String,
    description: String,
    mode: AccessMode,
    data: BitVector,
    reset_value: BitVector,
    read_mask: BitVector,
    write_mask: BitVector,
    fields: FieldMap,
    read_lock: bool,
    write_lock: bool,
    hooks: NativeHooks,
    untyped_hooks: UntypedHooks,
    next_callback_id: u64,
}

impl Register {
    /// Creates a register holding zero, with masks derived from `mode`.
    ///
    /// `ReadOnly` clears the write mask and `WriteOnly` clears the read mask.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::ZeroWidth`] when `width` is zero.
    pub fn new(
        width: usize,
        name: impl Into<String>,
        description: impl Into<String>,
        mode: AccessMode,
    ) -> Result<Self> {
        let name = name.into();
        if width == 0 {
            return Err(RegisterError::ZeroWidth { name });
        }
        let (read_mask, write_mask) = match mode {
            AccessMode::ReadOnly => (BitVector::ones(width), BitVector::zeros(width)),
            AccessMode::WriteOnly => (BitVector::zeros(width), BitVector::ones(width)),
            AccessMode::ReadWrite | AccessMode::Unspecified => {
                (BitVector::ones(width), BitVector::ones(width))
            }
        };
        Ok(Self {
            name,
            description: description.into(),
            mode,
            data: BitVector::zeros(width),
            reset_value: BitVector::zeros(width),
            read_mask,
            write_mask,
            fields: FieldMap::new(),
            read_lock: false,
            write_lock: false,
            hooks: NativeHooks::default(),
            untyped_hooks: UntypedHooks::default(),
            next_callback_id: 0,
        })
    }

    /// Sets the reset value and loads it as the current value.
    ///
    /// The value is zero-extended or truncated to the register width.
    #[must_use]
    pub fn with_reset_value(mut self, reset: &BitVector) -> Self {
        self.reset_value = reset.resized(self.width());
        self.data = self.reset_value.clone();
        self
    }

    /// Integer form of [`Register::with_reset_value`].
    #[must_use]
    pub fn with_reset_u64(self, reset: u64) -> Self {
        let reset = BitVector::from_u64(self.width(), reset);
        self.with_reset_value(&reset)
    }

    /// Register width in bits.
    #[must_use]
    pub fn width(&self) -> usize {
        self.data.width()
    }

    /// Register size in bytes, `ceil(width / 8)`.
    #[must_use]
    pub fn size_in_bytes(&self) -> usize {
        self.data.byte_len()
    }

    /// Register name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Register-level access mode.
    #[must_use]
    pub const fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Defined fields.
    #[must_use]
    pub const fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// Raw current value.
    #[must_use]
    pub const fn value(&self) -> &BitVector {
        &self.data
    }

    /// Current value with the read mask applied.
    #[must_use]
    pub fn masked_value(&self) -> BitVector {
        &self.data & &self.read_mask
    }

    /// Low 64 bits of the raw value.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.data.to_u64()
    }

    /// Replaces the raw value, ignoring masks and callbacks.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::WidthMismatch`] for a value of another width.
    pub fn set_value(&mut self, value: &BitVector) -> Result<()> {
        self.check_width(value)?;
        self.data = value.clone();
        Ok(())
    }

    /// Merges `value` through the write mask without running callbacks.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::WidthMismatch`] for a value of another width.
    pub fn set_value_masked(&mut self, value: &BitVector) -> Result<()> {
        self.check_width(value)?;
        self.data = self.merge_write(value);
        Ok(())
    }

    /// Replaces the raw value from an integer, truncated to the width.
    pub fn set_u64(&mut self, value: u64) {
        self.data = BitVector::from_u64(self.width(), value);
    }

    /// Reset value.
    #[must_use]
    pub const fn reset_value(&self) -> &BitVector {
        &self.reset_value
    }

    /// Changes the reset value without touching the current value.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::WidthMismatch`] for a value of another width.
    pub fn set_reset_value(&mut self, value: &BitVector) -> Result<()> {
        self.check_width(value)?;
        self.reset_value = value.clone();
        Ok(())
    }

    /// Restores the reset value.
    pub fn reset(&mut self) {
        self.data = self.reset_value.clone();
    }

    /// Read mask.
    #[must_use]
    pub const fn read_mask(&self) -> &BitVector {
        &self.read_mask
    }

    /// Write mask.
    #[must_use]
    pub const fn write_mask(&self) -> &BitVector {
        &self.write_mask
    }

    /// Overrides the read mask until the next field-driven recomputation.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::WidthMismatch`] for a mask of another width.
    pub fn set_read_mask(&mut self, mask: &BitVector) -> Result<()> {
        self.check_width(mask)?;
        self.read_mask = mask.clone();
        Ok(())
    }

    /// Overrides the write mask until the next field-driven recomputation.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::WidthMismatch`] for a mask of another width.
    pub fn set_write_mask(&mut self, mask: &BitVector) -> Result<()> {
        self.check_width(mask)?;
        self.write_mask = mask.clone();
        Ok(())
    }

    /// Reads up to [`Register::size_in_bytes`] bytes, little-endian.
    ///
    /// The masked value fills `buffer` from bit 0 upward; a short buffer
    /// receives the low bytes only. The buffer is left untouched when a
    /// pre-read callback refuses.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::AccessTooWide`] when `buffer` is larger than
    /// the register.
    pub fn read(&mut self, buffer: &mut [u8]) -> Result<AccessOutcome> {
        self.check_buffer(buffer.len())?;
        let Some(value) = self.read_masked() else {
            return Ok(AccessOutcome::Refused);
        };
        let bytes = value.to_le_bytes();
        buffer.copy_from_slice(&bytes[..buffer.len()]);
        Ok(AccessOutcome::Completed)
    }

    /// Writes up to [`Register::size_in_bytes`] bytes, little-endian.
    ///
    /// Bytes past the end of `buffer` count as zero, so a short write clears
    /// the upper writable bits.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::AccessTooWide`] when `buffer` is larger than
    /// the register.
    pub fn write(&mut self, buffer: &[u8]) -> Result<AccessOutcome> {
        self.check_buffer(buffer.len())?;
        let incoming = BitVector::from_le_bytes(self.width(), buffer);
        Ok(self.write_masked(&incoming))
    }

    /// Full-width read through the access protocol; `None` when refused.
    pub fn read_value(&mut self) -> Option<BitVector> {
        self.read_masked()
    }

    /// Full-width write through the access protocol.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::WidthMismatch`] for a value of another width.
    pub fn write_value(&mut self, value: &BitVector) -> Result<AccessOutcome> {
        self.check_width(value)?;
        Ok(self.write_masked(value))
    }

    /// Integer form of [`Register::read_value`].
    pub fn read_u64(&mut self) -> Option<u64> {
        self.read_masked().map(|value| value.to_u64())
    }

    /// Integer form of [`Register::write_value`]; the value is truncated to the width.
    pub fn write_u64(&mut self, value: u64) -> AccessOutcome {
        let incoming = BitVector::from_u64(self.width(), value);
        self.write_masked(&incoming)
    }

    /// Defines a field over `[ind1, ind2]` given in either order.
    ///
    /// On a register with [`AccessMode::Unspecified`] the masks are rebuilt
    /// from all fields; an unspecified field there is treated as read-write.
    ///
    /// # Errors
    ///
    /// - [`RegisterError::BitRangeOutOfBounds`] when the range leaves the register.
    /// - [`RegisterError::ModeConflict`] when the register mode forbids `mode`.
    /// - [`RegisterError::DuplicateField`] when the name is taken.
    pub fn create_field(
        &mut self,
        name: &str,
        ind1: usize,
        ind2: usize,
        description: &str,
        mode: AccessMode,
    ) -> Result<()> {
        let (low, high) = (ind1.min(ind2), ind1.max(ind2));
        self.check_range(low, high)?;
        if !self.mode.admits_field(mode) {
            return Err(RegisterError::ModeConflict {
                name: name.to_owned(),
                register: self.mode,
                field: mode,
            });
        }
        let mode = if self.mode == AccessMode::Unspecified && mode == AccessMode::Unspecified {
            tracing::warn!(
                "neither register `{}` nor field `{name}` defines an access mode, using read-write",
                self.name
            );
            AccessMode::ReadWrite
        } else {
            mode
        };
        self.fields.add(name, low, high, description, mode)?;
        if self.mode == AccessMode::Unspecified {
            self.update_masks();
        }
        Ok(())
    }

    /// One-bit form of [`Register::create_field`].
    ///
    /// # Errors
    ///
    /// Same as [`Register::create_field`].
    pub fn create_bit_field(
        &mut self,
        name: &str,
        index: usize,
        description: &str,
        mode: AccessMode,
    ) -> Result<()> {
        self.create_field(name, index, index, description, mode)
    }

    /// `(low, high)` bounds of a field.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::UnknownField`] when no field has that name.
    pub fn field_indexes(&self, name: &str) -> Result<(usize, usize)> {
        self.fields
            .get(name)
            .map(|field| (field.low(), field.high()))
            .ok_or_else(|| RegisterError::UnknownField {
                register: self.name.clone(),
                field: name.to_owned(),
            })
    }

    /// Raw bits of a field.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::UnknownField`] when no field has that name.
    pub fn field(&self, name: &str) -> Result<BitVector> {
        let (low, high) = self.field_indexes(name)?;
        self.range(low, high)
    }

    /// Integer form of [`Register::field`].
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::UnknownField`] when no field has that name.
    pub fn field_u64(&self, name: &str) -> Result<u64> {
        self.field(name).map(|bits| bits.to_u64())
    }

    /// Overwrites a field with the low bits of `value`, bypassing masks and callbacks.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::UnknownField`] when no field has that name.
    pub fn set_field(&mut self, name: &str, value: &BitVector) -> Result<()> {
        let (low, high) = self.field_indexes(name)?;
        self.set_range(low, high, value)
    }

    /// Integer form of [`Register::set_field`].
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::UnknownField`] when no field has that name.
    pub fn set_field_u64(&mut self, name: &str, value: u64) -> Result<()> {
        let (low, high) = self.field_indexes(name)?;
        self.set_range(low, high, &BitVector::from_u64(high - low + 1, value))
    }

    /// Raw bits `[ind1, ind2]`, indexes in either order.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::BitRangeOutOfBounds`] when the range leaves the register.
    pub fn range(&self, ind1: usize, ind2: usize) -> Result<BitVector> {
        self.data.slice(ind1, ind2).ok_or(RegisterError::BitRangeOutOfBounds {
            low: ind1.min(ind2),
            high: ind1.max(ind2),
            width: self.width(),
        })
    }

    /// Overwrites bits `[ind1, ind2]` with the low bits of `value`.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::BitRangeOutOfBounds`] when the range leaves the register.
    pub fn set_range(&mut self, ind1: usize, ind2: usize, value: &BitVector) -> Result<()> {
        self.check_range(ind1.min(ind2), ind1.max(ind2))?;
        self.data.set_slice(ind1, ind2, value);
        Ok(())
    }

    /// Raw bit `index`.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::BitRangeOutOfBounds`] past the width.
    pub fn bit(&self, index: usize) -> Result<bool> {
        self.data.bit(index).ok_or(RegisterError::BitRangeOutOfBounds {
            low: index,
            high: index,
            width: self.width(),
        })
    }

    /// Sets raw bit `index`.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::BitRangeOutOfBounds`] past the width.
    pub fn set_bit(&mut self, index: usize, value: bool) -> Result<()> {
        if self.data.set_bit(index, value) {
            Ok(())
        } else {
            Err(RegisterError::BitRangeOutOfBounds {
                low: index,
                high: index,
                width: self.width(),
            })
        }
    }

    /// Registers a vetoable callback run before each read.
    pub fn register_pre_read_callback(
        &mut self,
        callback: impl Fn(&mut RegisterReadEvent<'_>) -> bool + 'static,
    ) -> CallbackId {
        let id = self.allocate_callback_id();
        self.hooks.pre_read.push(id, Rc::new(callback));
        id
    }

    /// Registers a callback run after each completed read.
    pub fn register_post_read_callback(
        &mut self,
        callback: impl Fn(&mut RegisterReadEvent<'_>) + 'static,
    ) -> CallbackId {
        let id = self.allocate_callback_id();
        self.hooks.post_read.push(id, Rc::new(callback));
        id
    }

    /// Registers a vetoable callback run before each write.
    pub fn register_pre_write_callback(
        &mut self,
        callback: impl Fn(&mut RegisterWriteEvent<'_>) -> bool + 'static,
    ) -> CallbackId {
        let id = self.allocate_callback_id();
        self.hooks.pre_write.push(id, Rc::new(callback));
        id
    }

    /// Registers a callback run after each committed write.
    pub fn register_post_write_callback(
        &mut self,
        callback: impl Fn(&mut RegisterWriteEvent<'_>) + 'static,
    ) -> CallbackId {
        let id = self.allocate_callback_id();
        self.hooks.post_write.push(id, Rc::new(callback));
        id
    }

    /// Removes a pre-read callback; false when `id` is not in that chain.
    pub fn unregister_pre_read_callback(&mut self, id: CallbackId) -> bool {
        self.hooks.pre_read.remove(id)
    }

    /// Removes a post-read callback; false when `id` is not in that chain.
    pub fn unregister_post_read_callback(&mut self, id: CallbackId) -> bool {
        self.hooks.post_read.remove(id)
    }

    /// Removes a pre-write callback; false when `id` is not in that chain.
    pub fn unregister_pre_write_callback(&mut self, id: CallbackId) -> bool {
        self.hooks.pre_write.remove(id)
    }

    /// Removes a post-write callback; false when `id` is not in that chain.
    pub fn unregister_post_write_callback(&mut self, id: CallbackId) -> bool {
        self.hooks.post_write.remove(id)
    }

    /// Drops every native callback. Untyped callbacks are kept.
    pub fn unregister_all_callbacks(&mut self) {
        self.hooks.clear();
    }

    /// Number of pre-read callbacks.
    #[must_use]
    pub fn pre_read_callback_count(&self) -> usize {
        self.hooks.pre_read.len()
    }

    /// Number of post-read callbacks.
    #[must_use]
    pub fn post_read_callback_count(&self) -> usize {
        self.hooks.post_read.len()
    }

    /// Number of pre-write callbacks.
    #[must_use]
    pub fn pre_write_callback_count(&self) -> usize {
        self.hooks.pre_write.len()
    }

    /// Number of post-write callbacks.
    #[must_use]
    pub fn post_write_callback_count(&self) -> usize {
        self.hooks.post_write.len()
    }

    /// Number of native callbacks across all four chains.
    #[must_use]
    pub fn callback_count(&self) -> usize {
        self.hooks.count()
    }

    /// Human-readable dump.
    ///
    /// Level 0 prints the framed field layout table only; higher levels add
    /// identity, masks, current value and per-field details.
    #[must_use]
    pub fn info(&self, level: u32) -> String {
        RegisterDump {
            register: self,
            level,
        }
        .to_string()
    }

    pub(crate) const fn untyped_hooks(&self) -> &UntypedHooks {
        &self.untyped_hooks
    }

    pub(crate) fn untyped_hooks_mut(&mut self) -> &mut UntypedHooks {
        &mut self.untyped_hooks
    }

    pub(crate) fn allocate_callback_id(&mut self) -> CallbackId {
        let id = CallbackId::new(self.next_callback_id);
        self.next_callback_id += 1;
        id
    }

    fn check_width(&self, value: &BitVector) -> Result<()> {
        if value.width() == self.width() {
            Ok(())
        } else {
            Err(RegisterError::WidthMismatch {
                expected: self.width(),
                actual: value.width(),
            })
        }
    }

    fn check_range(&self, low: usize, high: usize) -> Result<()> {
        if high < self.width() {
            Ok(())
        } else {
            Err(RegisterError::BitRangeOutOfBounds {
                low,
                high,
                width: self.width(),
            })
        }
    }

    fn check_buffer(&self, len: usize) -> Result<()> {
        if len <= self.size_in_bytes() {
            Ok(())
        } else {
            Err(RegisterError::AccessTooWide {
                requested: len,
                available: self.size_in_bytes(),
            })
        }
    }

    fn merge_write(&self, incoming: &BitVector) -> BitVector {
        (&self.data & &!&self.write_mask) | &(incoming & &self.write_mask)
    }

    fn read_masked(&mut self) -> Option<BitVector> {
        if !self.run_pre_read() {
            return None;
        }
        let value = self.masked_value();
        self.run_post_read();
        Some(value)
    }

    fn write_masked(&mut self, incoming: &BitVector) -> AccessOutcome {
        let old_value = self.data.clone();
        let new_value = self.merge_write(incoming);
        if !self.run_pre_write(&old_value, &new_value) {
            return AccessOutcome::Refused;
        }
        self.data = new_value.clone();
        self.run_post_write(&old_value, &new_value);
        AccessOutcome::Completed
    }

    fn run_pre_read(&mut self) -> bool {
        if self.read_lock {
            return true;
        }
        self.read_lock = true;
        let value = self.data.clone();
        let chain = self.hooks.pre_read.snapshot();
        let mut event = RegisterReadEvent::new(value.clone(), self);
        let mut accepted = chain.iter().all(|callback| callback(&mut event));
        if accepted && !self.untyped_hooks.pre_read.is_empty() {
            accepted = untyped::run_pre_read(self, &value);
        }
        self.read_lock = false;
        accepted
    }

    fn run_post_read(&mut self) {
        if self.read_lock {
            return;
        }
        self.read_lock = true;
        let value = self.data.clone();
        let chain = self.hooks.post_read.snapshot();
        let mut event = RegisterReadEvent::new(value.clone(), self);
        for callback in &chain {
            callback(&mut event);
        }
        if !self.untyped_hooks.post_read.is_empty() {
            untyped::run_post_read(self, &value);
        }
        self.read_lock = false;
    }

    fn run_pre_write(&mut self, old_value: &BitVector, new_value: &BitVector) -> bool {
        if self.write_lock {
            return true;
        }
        self.write_lock = true;
        let chain = self.hooks.pre_write.snapshot();
        let mut event = RegisterWriteEvent::new(old_value.clone(), new_value.clone(), self);
        let mut accepted = chain.iter().all(|callback| callback(&mut event));
        if accepted && !self.untyped_hooks.pre_write.is_empty() {
            accepted = untyped::run_pre_write(self, old_value, new_value);
        }
        self.write_lock = false;
        accepted
    }

    fn run_post_write(&mut self, old_value: &BitVector, new_value: &BitVector) {
        if self.write_lock {
            return;
        }
        self.write_lock = true;
        let chain = self.hooks.post_write.snapshot();
        let mut event = RegisterWriteEvent::new(old_value.clone(), new_value.clone(), self);
        for callback in &chain {
            callback(&mut event);
        }
        if !self.untyped_hooks.post_write.is_empty() {
            untyped::run_post_write(self, old_value, new_value);
        }
        self.write_lock = false;
    }

    fn update_masks(&mut self) {
        let width = self.width();
        let mut read_mask = BitVector::ones(width);
        let mut write_mask = BitVector::ones(width);
        for (_, field) in self.fields.iter() {
            let mut slab = BitVector::zeros(width);
            slab.set_slice(field.low(), field.high(), &BitVector::ones(field.width()));
            match field.mode() {
                AccessMode::ReadWrite | AccessMode::Unspecified => {
                    read_mask = read_mask | &slab;
                    write_mask = write_mask | &slab;
                }
                AccessMode::ReadOnly => {
                    read_mask = read_mask | &slab;
                    write_mask = write_mask & &!&slab;
                }
                AccessMode::WriteOnly => {
                    read_mask = read_mask & &!&slab;
                    write_mask = write_mask | &slab;
                }
            }
        }
        self.read_mask = read_mask;
        self.write_mask = write_mask;
    }

    fn layout_table(&self) -> TextTable {
        let mut table = TextTable::new();
        let kept = self.fields.sorted_by_index(false);
        if kept.is_empty() {
            table.add(self.data.to_bin_string());
            table.end_row();
            return table;
        }
        let mut segments = Vec::with_capacity(kept.len() * 2 + 1);
        let mut next = 0;
        for (_, field) in kept {
            if field.low() > next {
                segments.push((next, field.low() - 1));
            }
            segments.push((field.low(), field.high()));
            next = field.high() + 1;
        }
        if next < self.width() {
            segments.push((next, self.width() - 1));
        }
        for &(low, high) in segments.iter().rev() {
            table.add(self.fields.find_by_range(low, high).map_or("", |(name, _)| name));
        }
        table.end_row();
        for &(low, high) in segments.iter().rev() {
            let bits = self.data.slice(low, high).map(|bits| bits.to_bin_string());
            table.add(bits.unwrap_or_default());
        }
        table.end_row();
        table
    }
}

impl Clone for Register {
    /// Copies definition, value and masks. Callbacks are not carried over.
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            description: self.description.clone(),
            mode: self.mode,
            data: self.data.clone(),
            reset_value: self.reset_value.clone(),
            read_mask: self.read_mask.clone(),
            write_mask: self.write_mask.clone(),
            fields: self.fields.clone(),
            read_lock: false,
            write_lock: false,
            hooks: NativeHooks::default(),
            untyped_hooks: UntypedHooks::default(),
            next_callback_id: 0,
        }
    }
}

impl fmt::Debug for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Register")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("data", &self.data)
            .field("read_mask", &self.read_mask)
            .field("write_mask", &self.write_mask)
            .field("fields", &self.fields.len())
            .field("callbacks", &(self.hooks.count() + self.untyped_hooks.count()))
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.data, f)
    }
}

struct RegisterDump<'a> {
    register: &'a Register,
    level: u32,
}

fn or_placeholder(text: &str) -> &str {
    if text.is_empty() {
        "<no available description>"
    } else {
        text
    }
}

impl fmt::Display for RegisterDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reg = self.register;
        let delimiter = "#".repeat(50);
        writeln!(f, "{delimiter}")?;
        if self.level == 0 {
            write!(f, "{}", reg.layout_table())?;
            return writeln!(f, "{delimiter}");
        }
        writeln!(f, "Register name:\n\t{}", reg.name)?;
        writeln!(f, "Register description:\n\t{}", or_placeholder(&reg.description))?;
        writeln!(f, "Read/Write mode:\n\t{}", reg.mode)?;
        writeln!(f, "Reset value:\n\t{}", reg.reset_value.to_hex_string())?;
        if reg.mode != AccessMode::WriteOnly {
            writeln!(f, "Read mask value:\n\t{}", reg.read_mask.to_hex_string())?;
        }
        if reg.mode != AccessMode::ReadOnly {
            writeln!(f, "Write mask value:\n\t{}", reg.write_mask.to_hex_string())?;
        }
        writeln!(f)?;
        writeln!(f, "#### Register general view ####")?;
        writeln!(f, "{}", reg.layout_table())?;
        writeln!(f, "#### Register value ####")?;
        writeln!(f, "\tBin: {}", reg.data.to_bin_string())?;
        writeln!(f, "\tHex: {}", reg.data.to_hex_string())?;
        writeln!(f)?;
        writeln!(f, "#### Fields details ####")?;
        if reg.fields.is_empty() {
            writeln!(f, "< No fields defined >")?;
        }
        for (name, field) in reg.fields.sorted_by_index(true) {
            writeln!(f, "Field name:\n\t{name}")?;
            writeln!(f, "Field description:\n\t{}", or_placeholder(field.description()))?;
            if field.low() == field.high() {
                writeln!(f, "Field position:\n\t{}", field.low())?;
            } else {
                writeln!(f, "Field position:\n\t{} -> {}", field.low(), field.high())?;
            }
            writeln!(f, "-----------------------")?;
        }
        writeln!(f, "{delimiter}")
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::Register;
    use crate::access::AccessMode;
    use crate::bits::BitVector;
    use crate::callback::AccessOutcome;
    use crate::error::RegisterError;

    fn reg32(mode: AccessMode) -> Register {
        Register::new(32, "CTRL", "control", mode).expect("valid register")
    }

    #[test]
    fn fixed_modes_fix_masks_at_construction() {
        let ro = reg32(AccessMode::ReadOnly);
        assert!(ro.write_mask().is_zero());
        assert_eq!(ro.read_mask(), &BitVector::ones(32));
        let wo = reg32(AccessMode::WriteOnly);
        assert!(wo.read_mask().is_zero());
        assert_eq!(wo.write_mask(), &BitVector::ones(32));
    }

    #[test]
    fn zero_width_is_rejected() {
        assert!(matches!(
            Register::new(0, "Z", "", AccessMode::ReadWrite),
            Err(RegisterError::ZeroWidth { .. })
        ));
    }

    #[test]
    fn reset_value_is_loaded_and_restored() {
        let mut reg = reg32(AccessMode::ReadWrite).with_reset_u64(0xCAFE);
        assert_eq!(reg.as_u64(), 0xCAFE);
        assert_eq!(reg.write_u64(0x1234), AccessOutcome::Completed);
        reg.reset();
        assert_eq!(reg.as_u64(), 0xCAFE);
    }

    #[test]
    fn partial_write_zeroes_upper_writable_bytes() {
        let mut reg = reg32(AccessMode::ReadWrite).with_reset_u64(0xFFFF_FFFF);
        assert_eq!(reg.write(&[0xAB]), Ok(AccessOutcome::Completed));
        assert_eq!(reg.as_u64(), 0xAB);
    }

    #[test]
    fn short_read_returns_low_bytes() {
        let mut reg = reg32(AccessMode::ReadWrite).with_reset_u64(0x1122_3344);
        let mut buf = [0_u8; 2];
        assert_eq!(reg.read(&mut buf), Ok(AccessOutcome::Completed));
        assert_eq!(buf, [0x44, 0x33]);
    }

    #[test]
    fn oversized_buffers_are_rejected() {
        let mut reg = Register::new(12, "N", "", AccessMode::ReadWrite).expect("valid");
        assert_eq!(reg.size_in_bytes(), 2);
        assert!(matches!(
            reg.write(&[0; 3]),
            Err(RegisterError::AccessTooWide {
                requested: 3,
                available: 2
            })
        ));
    }

    #[test]
    fn non_byte_width_ignores_high_bits_of_last_byte() {
        let mut reg = Register::new(12, "N", "", AccessMode::ReadWrite).expect("valid");
        assert!(reg.write(&[0xFF, 0xFF]).is_ok());
        assert_eq!(reg.as_u64(), 0xFFF);
        let mut buf = [0_u8; 2];
        assert!(reg.read(&mut buf).is_ok());
        assert_eq!(buf, [0xFF, 0x0F]);
    }

    #[test]
    fn field_masks_follow_field_modes() {
        let mut reg = reg32(AccessMode::Unspecified);
        reg.create_field("field1", 3, 0, "", AccessMode::ReadOnly)
            .expect("field1");
        assert_eq!(reg.write_mask().to_u64(), 0xFFFF_FFF0);
        reg.create_bit_field("field2", 4, "", AccessMode::WriteOnly)
            .expect("field2");
        assert_eq!(reg.read_mask().to_u64(), 0xFFFF_FFEF);
        reg.create_field("field3", 5, 15, "", AccessMode::ReadWrite)
            .expect("field3");
        assert_eq!(reg.read_mask().to_u64(), 0xFFFF_FFEF);
        assert_eq!(reg.write_mask().to_u64(), 0xFFFF_FFF0);
        reg.create_field("field4", 31, 16, "", AccessMode::ReadOnly)
            .expect("field4");
        assert_eq!(reg.write_mask().to_u64(), 0x0000_FFF0);
        assert_eq!(reg.read_mask().to_u64(), 0xFFFF_FFEF);
    }

    #[test]
    fn fixed_mode_register_keeps_construction_masks() {
        let mut reg = reg32(AccessMode::ReadWrite);
        reg.create_field("EN", 0, 0, "", AccessMode::ReadWrite)
            .expect("compatible");
        reg.create_field("ANY", 8, 15, "", AccessMode::Unspecified)
            .expect("unspecified field");
        assert_eq!(reg.write_mask(), &BitVector::ones(32));
        assert_eq!(
            reg.fields().get("ANY").map(|f| f.mode()),
            Some(AccessMode::Unspecified)
        );
    }

    #[test]
    fn incompatible_field_mode_is_reported() {
        let mut reg = reg32(AccessMode::ReadOnly);
        let err = reg
            .create_field("GO", 0, 0, "", AccessMode::WriteOnly)
            .expect_err("WO field in RO register");
        assert_eq!(
            err,
            RegisterError::ModeConflict {
                name: "GO".to_owned(),
                register: AccessMode::ReadOnly,
                field: AccessMode::WriteOnly,
            }
        );
        assert!(reg.fields().is_empty());
    }

    #[test]
    fn field_beyond_width_is_rejected() {
        let mut reg = reg32(AccessMode::ReadWrite);
        assert!(matches!(
            reg.create_field("BIG", 30, 32, "", AccessMode::ReadWrite),
            Err(RegisterError::BitRangeOutOfBounds { high: 32, .. })
        ));
    }

    #[test]
    fn fields_and_ranges_read_and_write_raw_bits() {
        let mut reg = reg32(AccessMode::ReadWrite);
        reg.create_field("MODE", 7, 4, "", AccessMode::ReadWrite)
            .expect("field");
        reg.set_field_u64("MODE", 0xA).expect("known field");
        assert_eq!(reg.as_u64(), 0xA0);
        assert_eq!(reg.field_u64("MODE"), Ok(0xA));
        assert_eq!(reg.field_indexes("MODE"), Ok((4, 7)));
        assert_eq!(reg.range(7, 5).map(|b| b.to_u64()), Ok(0b101));
        assert_eq!(reg.bit(5), Ok(true));
        reg.set_bit(0, true).expect("in range");
        assert_eq!(reg.as_u64(), 0xA1);
        assert!(matches!(
            reg.field("NOPE"),
            Err(RegisterError::UnknownField { .. })
        ));
    }

    #[test]
    fn set_value_masked_merges_through_write_mask() {
        let mut reg = reg32(AccessMode::ReadWrite).with_reset_u64(0x1111_1111);
        reg.set_write_mask(&BitVector::from_u64(32, 0x0000_FFFF))
            .expect("same width");
        reg.set_value_masked(&BitVector::from_u64(32, 0xAAAA_BBBB))
            .expect("same width");
        assert_eq!(reg.as_u64(), 0x1111_BBBB);
        assert!(reg.set_value(&BitVector::zeros(16)).is_err());
    }

    #[test]
    fn callback_ids_are_monotonic_across_chains() {
        let mut reg = reg32(AccessMode::ReadWrite);
        let a = reg.register_pre_read_callback(|_| true);
        let b = reg.register_post_write_callback(|_| {});
        let c = reg.register_pre_read_callback(|_| true);
        assert!(a < b && b < c);
        assert!(!reg.unregister_post_write_callback(a));
        assert!(reg.unregister_pre_read_callback(a));
        let d = reg.register_post_read_callback(|_| {});
        assert!(c < d);
        assert_eq!(reg.callback_count(), 3);
        reg.unregister_all_callbacks();
        assert_eq!(reg.callback_count(), 0);
    }

    #[test]
    fn pre_write_veto_keeps_data() {
        let mut reg = reg32(AccessMode::ReadWrite).with_reset_u64(7);
        reg.register_pre_write_callback(|event| event.new_value().to_u64() != 0xBAD);
        assert_eq!(reg.write_u64(0xBAD), AccessOutcome::Refused);
        assert_eq!(reg.as_u64(), 7);
        assert_eq!(reg.write_u64(0x600D), AccessOutcome::Completed);
        assert_eq!(reg.as_u64(), 0x600D);
    }

    #[test]
    fn post_write_sees_old_and_new_value() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let mut reg = reg32(AccessMode::ReadWrite).with_reset_u64(1);
        reg.register_post_write_callback(move |event| {
            log.borrow_mut()
                .push((event.old_value().to_u64(), event.new_value().to_u64()));
        });
        assert!(reg.write_u64(2).is_completed());
        assert!(reg.write_u64(3).is_completed());
        assert_eq!(*seen.borrow(), vec![(1, 2), (2, 3)]);
    }

    #[test]
    fn clone_drops_callbacks_but_keeps_state() {
        let mut reg = reg32(AccessMode::Unspecified).with_reset_u64(0x55);
        reg.create_field("LOW", 0, 7, "", AccessMode::ReadOnly)
            .expect("field");
        reg.register_pre_write_callback(|_| false);
        let mut copy = reg.clone();
        assert_eq!(copy.callback_count(), 0);
        assert_eq!(copy.fields().len(), 1);
        assert_eq!(copy.write_mask(), reg.write_mask());
        assert_eq!(copy.write_u64(0xFFFF_FFFF), AccessOutcome::Completed);
        assert_eq!(copy.as_u64(), 0xFFFF_FF55);
        assert_eq!(reg.write_u64(0), AccessOutcome::Refused);
    }

    #[test]
    fn level_zero_dump_shows_layout_msb_first() {
        let mut reg = Register::new(8, "STAT", "", AccessMode::Unspecified)
            .expect("valid")
            .with_reset_u64(0b1010_0110);
        reg.create_field("LO", 0, 1, "", AccessMode::ReadWrite)
            .expect("field");
        reg.create_field("HI", 5, 7, "", AccessMode::ReadWrite)
            .expect("field");
        let delimiter = "#".repeat(50);
        let expected = format!(
            "{delimiter}\n\
             +---+---+--+\n\
             |HI |   |LO|\n\
             +---+---+--+\n\
             |101|001|10|\n\
             +---+---+--+\n\
             {delimiter}\n"
        );
        assert_eq!(reg.info(0), expected);
    }

    #[test]
    fn detailed_dump_lists_identity_and_fields() {
        let mut reg = Register::new(16, "STATUS", "", AccessMode::ReadOnly).expect("valid");
        reg.create_bit_field("READY", 0, "device ready", AccessMode::ReadOnly)
            .expect("field");
        let dump = reg.info(1);
        assert!(dump.contains("Register name:\n\tSTATUS\n"));
        assert!(dump.contains("Register description:\n\t<no available description>\n"));
        assert!(dump.contains("Read/Write mode:\n\tRead-Only\n"));
        assert!(dump.contains("Read mask value:\n\t0xFFFF\n"));
        assert!(!dump.contains("Write mask value"));
        assert!(dump.contains("Field description:\n\tdevice ready\n"));
        assert!(dump.contains("Field position:\n\t0\n"));
        assert!(dump.contains("\tHex: 0x0000\n"));
    }

    #[test]
    fn display_is_binary_value() {
        let reg = Register::new(4, "N", "", AccessMode::ReadWrite)
            .expect("valid")
            .with_reset_u64(0b1001);
        assert_eq!(reg.to_string(), "1001");
    }
}
