//! Byte-addressed register files.
//!
//! A register file places registers and nested register files at byte
//! offsets relative to its own origin. Insertion enforces alignment and
//! non-overlap of direct children. Inserting a file into a parent freezes the
//! child's size and layout; the child's registers are merged into the
//! parent's flattened map at that moment.
//!
//! Every refused insertion logs a warning and returns an error whose
//! [`crate::ErrorClass`] is `Refused`; the file is left unchanged.

use std::collections::BTreeMap;
use std::fmt;

use crate::access::AccessMode;
use crate::arena::{FileId, RegisterArena, RegisterId};
use crate::bits::BitVector;
use crate::callback::AccessOutcome;
use crate::error::{RegisterError, Result};
use crate::register::Register;
use crate::table::TextTable;

pub(crate) struct RegisterFile {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) alignment: u64,
    pub(crate) registers: BTreeMap<u64, RegisterId>,
    pub(crate) files: BTreeMap<u64, FileId>,
    pub(crate) flattened: BTreeMap<u64, RegisterId>,
    pub(crate) fixed_size: Option<u64>,
}

impl RegisterFile {
    pub(crate) const fn new(name: String, description: String, alignment: u64) -> Self {
        Self {
            name,
            description,
            alignment,
            registers: BTreeMap::new(),
            files: BTreeMap::new(),
            flattened: BTreeMap::new(),
            fixed_size: None,
        }
    }

    fn effective_alignment(&self, size: u64) -> u64 {
        if self.alignment == 0 {
            size
        } else {
            self.alignment
        }
    }

    fn is_aligned(&self, address: u64, size: u64) -> bool {
        let adjusted = size.checked_next_power_of_two().unwrap_or(0);
        adjusted != 0
            && address % adjusted == 0
            && (self.alignment == 0 || address % self.alignment == 0)
    }

    fn nearest_aligned_address(&self, address: u64, size: u64) -> Option<u64> {
        let step = size.checked_next_power_of_two()?.max(self.alignment);
        address.checked_next_multiple_of(step)
    }

    fn children<'a>(&'a self, arena: &'a RegisterArena) -> impl Iterator<Item = (u64, u64)> + 'a {
        let registers = self.registers.iter().map(|(&address, &id)| {
            let size = arena.register(id).map_or(0, register_bytes);
            (address, size)
        });
        let files = self.files.iter().map(|(&address, &id)| {
            let size = arena
                .file_data(id)
                .map_or(0, |file| file.fixed_size.unwrap_or(0));
            (address, size)
        });
        registers.chain(files)
    }

    fn last_occupied_address(&self, arena: &RegisterArena) -> Option<u64> {
        self.children(arena)
            .filter(|&(_, size)| size > 0)
            .map(|(address, size)| address + (size - 1))
            .max()
    }

    fn next_free_address(&self, arena: &RegisterArena) -> u64 {
        self.last_occupied_address(arena).map_or(0, |last| last + 1)
    }

    fn is_space_free(&self, arena: &RegisterArena, address: u64, size: u64) -> bool {
        if size == 0 {
            return true;
        }
        let end = address.saturating_add(size - 1);
        self.children(arena)
            .filter(|&(_, other_size)| other_size > 0)
            .all(|(other, other_size)| address > other + (other_size - 1) || end < other)
    }
}

fn register_bytes(register: &Register) -> u64 {
    width_bytes(register.width())
}

fn width_bytes(width: usize) -> u64 {
    u64::try_from(width.div_ceil(8)).unwrap_or(u64::MAX)
}

fn nearest_aligned(address: u64, size: u64) -> Option<u64> {
    let step = size.checked_next_power_of_two()?;
    address.checked_next_multiple_of(step)
}

fn refuse(error: RegisterError) -> RegisterError {
    tracing::warn!("{error}");
    error
}

/// Read-only view of a register file.
#[derive(Clone, Copy)]
pub struct RegisterFileRef<'a> {
    arena: &'a RegisterArena,
    id: FileId,
    file: &'a RegisterFile,
}

impl<'a> RegisterFileRef<'a> {
    pub(crate) const fn new(arena: &'a RegisterArena, id: FileId, file: &'a RegisterFile) -> Self {
        Self { arena, id, file }
    }

    /// Handle of this file.
    #[must_use]
    pub const fn id(&self) -> FileId {
        self.id
    }

    /// File name.
    #[must_use]
    pub fn name(&self) -> &'a str {
        &self.file.name
    }

    /// File description.
    #[must_use]
    pub fn description(&self) -> &'a str {
        &self.file.description
    }

    /// Configured alignment; zero aligns each element on its own size.
    #[must_use]
    pub const fn alignment(&self) -> u64 {
        self.file.alignment
    }

    /// Size fixed when the file was inserted into a parent.
    #[must_use]
    pub const fn fixed_size(&self) -> Option<u64> {
        self.file.fixed_size
    }

    /// Whether the layout is frozen.
    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.file.fixed_size.is_some()
    }

    /// Whether the file has no direct child.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.file.registers.is_empty() && self.file.files.is_empty()
    }

    /// Direct registers in address order.
    pub fn registers(&self) -> impl Iterator<Item = (u64, RegisterId)> + 'a {
        self.file.registers.iter().map(|(&address, &id)| (address, id))
    }

    /// Direct sub-files in address order.
    pub fn register_files(&self) -> impl Iterator<Item = (u64, FileId)> + 'a {
        self.file.files.iter().map(|(&address, &id)| (address, id))
    }

    /// Every register of the subtree with addresses relative to this file.
    pub fn flattened(&self) -> impl Iterator<Item = (u64, RegisterId)> + 'a {
        self.file.flattened.iter().map(|(&address, &id)| (address, id))
    }

    /// Last byte used by a direct child, `None` when empty.
    #[must_use]
    pub fn last_occupied_address(&self) -> Option<u64> {
        self.file.last_occupied_address(self.arena)
    }

    /// First byte after the last direct child; zero when empty.
    ///
    /// This is also the occupied span of the file.
    #[must_use]
    pub fn next_free_address(&self) -> u64 {
        self.file.next_free_address(self.arena)
    }

    /// Whether `address` is a multiple of `size` rounded up to a power of two
    /// and, when configured, of the file alignment.
    #[must_use]
    pub fn is_aligned(&self, address: u64, size: u64) -> bool {
        self.file.is_aligned(address, size)
    }

    /// Smallest address at or above `address` that [`Self::is_aligned`]
    /// accepts for `size`.
    ///
    /// Returns `None` when the result leaves the address space.
    #[must_use]
    pub fn nearest_aligned_address(&self, address: u64, size: u64) -> Option<u64> {
        self.file.nearest_aligned_address(address, size)
    }

    /// Whether `[address, address + size)` misses every direct child.
    #[must_use]
    pub fn is_space_free(&self, address: u64, size: u64) -> bool {
        self.file.is_space_free(self.arena, address, size)
    }

    /// Handle of the register mapped at `address` anywhere in the subtree.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::NoRegisterAt`] when nothing starts there.
    pub fn register_id_at(&self, address: u64) -> Result<RegisterId> {
        self.file
            .flattened
            .get(&address)
            .copied()
            .ok_or(RegisterError::NoRegisterAt(address))
    }

    /// Register mapped at `address` anywhere in the subtree.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::NoRegisterAt`] when nothing starts there.
    pub fn register_at(&self, address: u64) -> Result<&'a Register> {
        let id = self.register_id_at(address)?;
        self.arena.register(id)
    }

    /// Lowest address of a register with that name in the subtree.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::NoRegisterNamed`] when no register matches.
    pub fn register_address(&self, name: &str) -> Result<u64> {
        self.file
            .flattened
            .iter()
            .find(|(_, &id)| self.arena.register(id).is_ok_and(|reg| reg.name() == name))
            .map(|(&address, _)| address)
            .ok_or_else(|| RegisterError::NoRegisterNamed(name.to_owned()))
    }

    /// Handle of the lowest-addressed register with that name in the subtree.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::NoRegisterNamed`] when no register matches.
    pub fn register_id_named(&self, name: &str) -> Result<RegisterId> {
        let address = self.register_address(name)?;
        self.register_id_at(address)
    }

    /// Lowest-addressed register with that name in the subtree.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::NoRegisterNamed`] when no register matches.
    pub fn register_named(&self, name: &str) -> Result<&'a Register> {
        let address = self.register_address(name)?;
        self.register_at(address)
    }

    /// Direct sub-file mapped at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::NoRegisterFileAt`] when no direct sub-file starts there.
    pub fn register_file_at(&self, address: u64) -> Result<RegisterFileRef<'a>> {
        let id = self
            .file
            .files
            .get(&address)
            .copied()
            .ok_or(RegisterError::NoRegisterFileAt(address))?;
        self.arena.file(id)
    }

    /// Address of the lowest direct sub-file with that name.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::NoRegisterFileNamed`] when no direct sub-file matches.
    pub fn register_file_address(&self, name: &str) -> Result<u64> {
        self.file
            .files
            .iter()
            .find(|(_, &id)| self.arena.file_data(id).is_ok_and(|file| file.name == name))
            .map(|(&address, _)| address)
            .ok_or_else(|| RegisterError::NoRegisterFileNamed(name.to_owned()))
    }

    /// Lowest direct sub-file with that name.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::NoRegisterFileNamed`] when no direct sub-file matches.
    pub fn register_file_named(&self, name: &str) -> Result<RegisterFileRef<'a>> {
        let address = self.register_file_address(name)?;
        self.register_file_at(address)
    }

    /// Table of direct children.
    #[must_use]
    pub fn info(&self) -> String {
        let mut rows = BTreeMap::new();
        for (address, id) in self.registers() {
            if let Ok(register) = self.arena.register(id) {
                rows.insert(address, LayoutRow::register(register));
            }
        }
        for (address, id) in self.register_files() {
            if let Ok(file) = self.arena.file_data(id) {
                rows.insert(address, LayoutRow::file(file));
            }
        }
        LayoutDump {
            name: self.name(),
            description: self.description(),
            rows,
        }
        .to_string()
    }

    /// Detailed dump of the register at `address` in the subtree.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::NoRegisterAt`] when nothing starts there.
    pub fn register_info_at(&self, address: u64) -> Result<String> {
        self.register_at(address).map(|register| register.info(1))
    }

    /// Detailed dump of the lowest-addressed register with that name.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::NoRegisterNamed`] when no register matches.
    pub fn register_info_named(&self, name: &str) -> Result<String> {
        self.register_named(name).map(|register| register.info(1))
    }

    /// Tables of this file and of every nested file, depth first.
    #[must_use]
    pub fn recursive_info(&self, level: u32) -> String {
        let mut out = format!("############## Register files details - level {level} ##############\n");
        out.push_str(&self.info());
        for (_, id) in self.register_files() {
            if let Ok(child) = self.arena.file(id) {
                out.push_str(&child.recursive_info(level + 1));
            }
        }
        if level == 0 {
            out.push_str(&"#".repeat(62));
            out.push('\n');
        }
        out
    }

    /// Table of every register of the subtree.
    #[must_use]
    pub fn flattened_info(&self) -> String {
        let rows = self
            .flattened()
            .filter_map(|(address, id)| {
                self.arena
                    .register(id)
                    .ok()
                    .map(|register| (address, LayoutRow::register(register)))
            })
            .collect();
        LayoutDump {
            name: self.name(),
            description: self.description(),
            rows,
        }
        .to_string()
    }
}

impl fmt::Debug for RegisterFileRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterFile")
            .field("name", &self.file.name)
            .field("alignment", &self.file.alignment)
            .field("registers", &self.file.registers.len())
            .field("files", &self.file.files.len())
            .field("fixed_size", &self.file.fixed_size)
            .finish()
    }
}

/// Mutable view of a register file.
pub struct RegisterFileMut<'a> {
    arena: &'a mut RegisterArena,
    id: FileId,
}

impl<'a> RegisterFileMut<'a> {
    pub(crate) fn new(arena: &'a mut RegisterArena, id: FileId) -> Self {
        Self { arena, id }
    }

    /// Handle of this file.
    #[must_use]
    pub const fn id(&self) -> FileId {
        self.id
    }

    /// Read-only view of the same file.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::StaleHandle`] when the file was removed.
    pub fn view(&self) -> Result<RegisterFileRef<'_>> {
        self.arena.file(self.id)
    }

    /// Maps an existing register at `address` by reference.
    ///
    /// The effective alignment is the file alignment, or the register size
    /// when the file alignment is zero.
    ///
    /// # Errors
    ///
    /// Refusals: [`RegisterError::Frozen`], [`RegisterError::Unaligned`],
    /// [`RegisterError::Occupied`], [`RegisterError::AddressOverflow`].
    /// [`RegisterError::StaleHandle`] for a removed register.
    pub fn add_register(&mut self, address: u64, register: RegisterId) -> Result<()> {
        let file = self.unfrozen()?;
        let size = register_bytes(self.arena.register(register)?);
        let alignment = file.effective_alignment(size);
        if !file.is_aligned(address, alignment) {
            return Err(refuse(RegisterError::Unaligned {
                address,
                size: alignment,
            }));
        }
        if address.checked_add(size).is_none() {
            return Err(refuse(RegisterError::AddressOverflow { address, size }));
        }
        if !file.is_space_free(self.arena, address, size) {
            return Err(refuse(RegisterError::Occupied { address, size }));
        }
        if file.flattened.contains_key(&address) {
            return Err(RegisterError::FlattenCollision(address));
        }
        let data = self.arena.file_data_mut(self.id)?;
        data.registers.insert(address, register);
        data.flattened.insert(address, register);
        let name = data.name.clone();
        let entry = self.arena.register_entry_mut(register)?;
        entry.containers += 1;
        tracing::debug!(
            "mapped register `{}` at {address:#x} in `{name}`",
            entry.value.name()
        );
        Ok(())
    }

    /// Maps an existing register at the next free aligned address.
    ///
    /// # Errors
    ///
    /// Same as [`RegisterFileMut::add_register`].
    pub fn append_register(&mut self, register: RegisterId) -> Result<u64> {
        let file = self.unfrozen()?;
        let size = register_bytes(self.arena.register(register)?);
        let address = self.next_slot(file, file.effective_alignment(size), size)?;
        self.add_register(address, register)?;
        Ok(address)
    }

    /// Maps a register value owned by this file.
    ///
    /// Nothing is left behind in the arena when the insertion is refused.
    ///
    /// # Errors
    ///
    /// Same as [`RegisterFileMut::add_register`].
    pub fn place_register(&mut self, address: u64, register: Register) -> Result<RegisterId> {
        self.unfrozen()?;
        let id = self.arena.insert_register_owned(register, Some(self.id));
        match self.add_register(address, id) {
            Ok(()) => Ok(id),
            Err(error) => {
                self.arena.discard_register(id);
                Err(error)
            }
        }
    }

    /// Maps a copy of `source`, owned by this file. Callbacks are not copied.
    ///
    /// # Errors
    ///
    /// Same as [`RegisterFileMut::add_register`].
    pub fn add_register_copy(&mut self, address: u64, source: RegisterId) -> Result<RegisterId> {
        let copy = self.arena.register(source)?.clone();
        self.place_register(address, copy)
    }

    /// Maps a copy of `source` at the next free aligned address.
    ///
    /// # Errors
    ///
    /// Same as [`RegisterFileMut::add_register`].
    pub fn append_register_copy(&mut self, source: RegisterId) -> Result<(u64, RegisterId)> {
        let copy = self.arena.register(source)?.clone();
        let file = self.unfrozen()?;
        let size = register_bytes(&copy);
        let address = self.next_slot(file, file.effective_alignment(size), size)?;
        let id = self.place_register(address, copy)?;
        Ok((address, id))
    }

    /// Creates a register owned by this file at `address`, reset value zero.
    ///
    /// # Errors
    ///
    /// [`RegisterError::ZeroWidth`] for a zero width, otherwise same as
    /// [`RegisterFileMut::add_register`].
    pub fn create_register(
        &mut self,
        address: u64,
        width: usize,
        name: &str,
        description: &str,
        mode: AccessMode,
    ) -> Result<RegisterId> {
        self.unfrozen()?;
        let register = Register::new(width, name, description, mode)?;
        self.place_register(address, register)
    }

    /// [`RegisterFileMut::create_register`] with an explicit reset value.
    ///
    /// # Errors
    ///
    /// Same as [`RegisterFileMut::create_register`].
    #[allow(clippy::too_many_arguments)]
    pub fn create_register_with_reset(
        &mut self,
        address: u64,
        width: usize,
        name: &str,
        description: &str,
        mode: AccessMode,
        reset: &BitVector,
    ) -> Result<RegisterId> {
        self.unfrozen()?;
        let register = Register::new(width, name, description, mode)?.with_reset_value(reset);
        self.place_register(address, register)
    }

    /// Creates a register owned by this file at the next free aligned address.
    ///
    /// # Errors
    ///
    /// Same as [`RegisterFileMut::create_register`].
    pub fn append_new_register(
        &mut self,
        width: usize,
        name: &str,
        description: &str,
        mode: AccessMode,
    ) -> Result<(u64, RegisterId)> {
        let file = self.unfrozen()?;
        let register = Register::new(width, name, description, mode)?;
        let size = register_bytes(&register);
        let address = self.next_slot(file, file.effective_alignment(size), size)?;
        let id = self.place_register(address, register)?;
        Ok((address, id))
    }

    /// Creates `count` registers named `{base_name}_0` upward at successive
    /// aligned addresses starting at `address`.
    ///
    /// Stops at the first refused insertion; registers created before it stay.
    ///
    /// # Errors
    ///
    /// Same as [`RegisterFileMut::create_register`].
    pub fn create_register_block(
        &mut self,
        address: u64,
        count: usize,
        width: usize,
        base_name: &str,
        description: &str,
        mode: AccessMode,
    ) -> Result<Vec<RegisterId>> {
        let file = self.unfrozen()?;
        let size = width_bytes(width);
        let alignment = file.effective_alignment(size);
        if !file.is_aligned(address, alignment) {
            return Err(refuse(RegisterError::Unaligned {
                address,
                size: alignment,
            }));
        }
        let mut ids = Vec::with_capacity(count);
        let mut cursor = address;
        for index in 0..count {
            cursor = nearest_aligned(cursor, alignment)
                .ok_or(RegisterError::AddressOverflow { address: cursor, size })?;
            let name = format!("{base_name}_{index}");
            ids.push(self.create_register(cursor, width, &name, description, mode)?);
            cursor = cursor
                .checked_add(size)
                .ok_or(RegisterError::AddressOverflow { address: cursor, size })?;
        }
        tracing::debug!("created block `{base_name}` of {count} registers at {address:#x}");
        Ok(ids)
    }

    /// [`RegisterFileMut::create_register_block`] starting at the next free aligned address.
    ///
    /// # Errors
    ///
    /// Same as [`RegisterFileMut::create_register_block`].
    pub fn append_register_block(
        &mut self,
        count: usize,
        width: usize,
        base_name: &str,
        description: &str,
        mode: AccessMode,
    ) -> Result<(u64, Vec<RegisterId>)> {
        let file = self.unfrozen()?;
        let size = width_bytes(width);
        let address = self.next_slot(file, file.effective_alignment(size), size)?;
        let ids = self.create_register_block(address, count, width, base_name, description, mode)?;
        Ok((address, ids))
    }

    /// Maps an existing register file at `address` by reference and freezes it.
    ///
    /// The child's size is its frozen size when already frozen, otherwise
    /// `explicit_size` when given, otherwise its occupied span.
    ///
    /// # Errors
    ///
    /// Refusals: [`RegisterError::Frozen`], [`RegisterError::AlignmentMismatch`],
    /// [`RegisterError::SizeTooSmall`], [`RegisterError::EmptyRegisterFile`],
    /// [`RegisterError::Unaligned`], [`RegisterError::Occupied`],
    /// [`RegisterError::AddressOverflow`]. [`RegisterError::SelfInsertion`]
    /// when `child` is this file.
    pub fn add_register_file(
        &mut self,
        address: u64,
        child: FileId,
        explicit_size: Option<u64>,
    ) -> Result<()> {
        let file = self.unfrozen()?;
        if child == self.id {
            return Err(RegisterError::SelfInsertion {
                name: file.name.clone(),
            });
        }
        let size = self.child_size(file, child, explicit_size)?;
        let alignment = file.effective_alignment(size);
        if !file.is_aligned(address, alignment) {
            return Err(refuse(RegisterError::Unaligned {
                address,
                size: alignment,
            }));
        }
        if address.checked_add(size).is_none() {
            return Err(refuse(RegisterError::AddressOverflow { address, size }));
        }
        if !file.is_space_free(self.arena, address, size) {
            return Err(refuse(RegisterError::Occupied { address, size }));
        }
        let merged: Vec<(u64, RegisterId)> = self
            .arena
            .file_data(child)?
            .flattened
            .iter()
            .map(|(&offset, &id)| (address + offset, id))
            .collect();
        if let Some(&(collision, _)) = merged.iter().find(|(at, _)| file.flattened.contains_key(at)) {
            return Err(RegisterError::FlattenCollision(collision));
        }

        let data = self.arena.file_data_mut(self.id)?;
        data.files.insert(address, child);
        data.flattened.extend(merged);
        let parent = data.name.clone();
        let entry = self
            .arena
            .file_entry_mut(child)
            .ok_or(RegisterError::StaleHandle)?;
        entry.containers += 1;
        entry.value.fixed_size = Some(size);
        tracing::debug!(
            "mapped register file `{}` ({size} bytes) at {address:#x} in `{parent}`",
            entry.value.name
        );
        Ok(())
    }

    /// Maps an existing register file at the next free aligned address.
    ///
    /// The rounding size is the child's resolved size.
    ///
    /// # Errors
    ///
    /// Same as [`RegisterFileMut::add_register_file`].
    pub fn append_register_file(&mut self, child: FileId, explicit_size: Option<u64>) -> Result<u64> {
        let file = self.unfrozen()?;
        if child == self.id {
            return Err(RegisterError::SelfInsertion {
                name: file.name.clone(),
            });
        }
        let size = self.child_size(file, child, explicit_size)?;
        let address = self.next_slot(file, file.effective_alignment(size), size)?;
        self.add_register_file(address, child, explicit_size)?;
        Ok(address)
    }

    /// Maps a deep copy of `source`, owned by this file.
    ///
    /// A frozen source keeps its size unless `explicit_size` is given.
    ///
    /// # Errors
    ///
    /// Same as [`RegisterFileMut::add_register_file`].
    pub fn add_register_file_copy(
        &mut self,
        address: u64,
        source: FileId,
        explicit_size: Option<u64>,
    ) -> Result<FileId> {
        self.unfrozen()?;
        let size = explicit_size.or(self.arena.file_data(source)?.fixed_size);
        let copy = self.arena.clone_file_owned(source, Some(self.id))?;
        if let Some(entry) = self.arena.file_entry_mut(copy) {
            entry.value.fixed_size = None;
        }
        match self.add_register_file(address, copy, size) {
            Ok(()) => Ok(copy),
            Err(error) => {
                self.arena.release_file(copy);
                Err(error)
            }
        }
    }

    /// Mutable access to the register mapped at `address` in the subtree.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::NoRegisterAt`] when nothing starts there.
    pub fn register_at_mut(&mut self, address: u64) -> Result<&mut Register> {
        let id = self.arena.file(self.id)?.register_id_at(address)?;
        self.arena.register_mut(id)
    }

    /// Mutable access to the lowest-addressed register with that name.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::NoRegisterNamed`] when no register matches.
    pub fn register_named_mut(&mut self, name: &str) -> Result<&mut Register> {
        let id = self.arena.file(self.id)?.register_id_named(name)?;
        self.arena.register_mut(id)
    }

    /// Byte read from the register mapped at `address`.
    ///
    /// # Errors
    ///
    /// [`RegisterError::NoRegisterAt`] when nothing starts there, or the
    /// register's own read error.
    pub fn read(&mut self, address: u64, buffer: &mut [u8]) -> Result<AccessOutcome> {
        self.register_at_mut(address)?.read(buffer)
    }

    /// Byte write to the register mapped at `address`.
    ///
    /// # Errors
    ///
    /// [`RegisterError::NoRegisterAt`] when nothing starts there, or the
    /// register's own write error.
    pub fn write(&mut self, address: u64, buffer: &[u8]) -> Result<AccessOutcome> {
        self.register_at_mut(address)?.write(buffer)
    }

    fn unfrozen(&self) -> Result<&RegisterFile> {
        let file = self.arena.file_data(self.id)?;
        if file.fixed_size.is_some() {
            return Err(refuse(RegisterError::Frozen {
                name: file.name.clone(),
            }));
        }
        Ok(file)
    }

    fn next_slot(&self, file: &RegisterFile, alignment: u64, size: u64) -> Result<u64> {
        let start = file.next_free_address(self.arena);
        nearest_aligned(start, alignment).ok_or_else(|| {
            refuse(RegisterError::AddressOverflow {
                address: start,
                size,
            })
        })
    }

    fn child_size(&self, file: &RegisterFile, child: FileId, explicit_size: Option<u64>) -> Result<u64> {
        let child_file = self.arena.file_data(child)?;
        if child_file.alignment != file.alignment {
            return Err(refuse(RegisterError::AlignmentMismatch {
                parent: file.alignment,
                child: child_file.alignment,
            }));
        }
        if let Some(fixed) = child_file.fixed_size {
            return Ok(fixed);
        }
        let occupied = child_file.next_free_address(self.arena);
        let size = match explicit_size {
            Some(requested) if requested < occupied => {
                return Err(refuse(RegisterError::SizeTooSmall {
                    requested,
                    occupied,
                }));
            }
            Some(requested) => requested,
            None => occupied,
        };
        if size == 0 {
            return Err(refuse(RegisterError::EmptyRegisterFile {
                name: child_file.name.clone(),
            }));
        }
        Ok(size)
    }
}

impl fmt::Debug for RegisterFileMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.view() {
            Ok(view) => fmt::Debug::fmt(&view, f),
            Err(_) => f.write_str("RegisterFile(<stale>)"),
        }
    }
}

struct LayoutRow {
    size: u64,
    kind: &'static str,
    name: String,
    description: String,
}

impl LayoutRow {
    fn register(register: &Register) -> Self {
        Self {
            size: register_bytes(register),
            kind: "Reg.",
            name: register.name().to_owned(),
            description: register.description().to_owned(),
        }
    }

    fn file(file: &RegisterFile) -> Self {
        Self {
            size: file.fixed_size.unwrap_or(0),
            kind: "Reg. File",
            name: file.name.clone(),
            description: file.description.clone(),
        }
    }
}

struct LayoutDump<'a> {
    name: &'a str,
    description: &'a str,
    rows: BTreeMap<u64, LayoutRow>,
}

impl fmt::Display for LayoutDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut table = TextTable::new();
        for header in ["Rel. address", "Type", "Size", "Name", "Description"] {
            table.add(header);
        }
        table.end_row();
        for (&address, row) in &self.rows {
            let end = address + row.size.saturating_sub(1);
            table.add(format!("0x{address:X} -> 0x{end:X}"));
            table.add(row.kind);
            let plural = if row.size == 1 { "" } else { "s" };
            table.add(format!("{} byte{plural}", row.size));
            table.add(row.name.as_str());
            table.add(row.description.as_str());
            table.end_row();
        }
        writeln!(f, "Register file:")?;
        writeln!(f, "\tName: {}", self.name)?;
        writeln!(f, "\tDescription: {}", self.description)?;
        write!(f, "{table}")
    }
}
