//! Storage for registers and register files behind generation-checked handles.
//!
//! Register files refer to their children by handle. Every entry carries an
//! ownership flag: caller-owned entries (inserted with
//! [`RegisterArena::insert_register`] or [`RegisterArena::create_file`])
//! stay alive until the caller removes them, while entries created by a file
//! (`create_*`, `*_copy`) are released together with that file.

use crate::error::{RegisterError, Result};
use crate::register::Register;
use crate::register_file::{RegisterFile, RegisterFileMut, RegisterFileRef};

/// Handle to a register stored in a [`RegisterArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegisterId {
    index: usize,
    generation: u64,
}

/// Handle to a register file stored in a [`RegisterArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId {
    index: usize,
    generation: u64,
}

pub(crate) struct Entry<T> {
    pub(crate) value: T,
    pub(crate) owner: Option<FileId>,
    pub(crate) containers: u32,
}

struct Slot<T> {
    generation: u64,
    entry: Option<Entry<T>>,
}

struct Slots<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
}

impl<T> Default for Slots<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }
}

impl<T> Slots<T> {
    fn insert(&mut self, value: T, owner: Option<FileId>) -> (usize, u64) {
        let entry = Entry {
            value,
            owner,
            containers: 0,
        };
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.entry = Some(entry);
            return (index, slot.generation);
        }
        self.slots.push(Slot {
            generation: 0,
            entry: Some(entry),
        });
        (self.slots.len() - 1, 0)
    }

    fn get(&self, index: usize, generation: u64) -> Option<&Entry<T>> {
        self.slots
            .get(index)
            .filter(|slot| slot.generation == generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    fn get_mut(&mut self, index: usize, generation: u64) -> Option<&mut Entry<T>> {
        self.slots
            .get_mut(index)
            .filter(|slot| slot.generation == generation)
            .and_then(|slot| slot.entry.as_mut())
    }

    fn remove(&mut self, index: usize, generation: u64) -> Option<Entry<T>> {
        let slot = self
            .slots
            .get_mut(index)
            .filter(|slot| slot.generation == generation)?;
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        Some(entry)
    }

    fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

/// Owner of every register and register file in one address space model.
#[derive(Default)]
pub struct RegisterArena {
    registers: Slots<Register>,
    files: Slots<RegisterFile>,
}

impl RegisterArena {
    /// Empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a caller-owned register and returns its handle.
    pub fn insert_register(&mut self, register: Register) -> RegisterId {
        self.insert_register_owned(register, None)
    }

    /// Borrows a register.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::StaleHandle`] when the register was removed.
    pub fn register(&self, id: RegisterId) -> Result<&Register> {
        self.register_entry(id).map(|entry| &entry.value)
    }

    /// Mutably borrows a register.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::StaleHandle`] when the register was removed.
    pub fn register_mut(&mut self, id: RegisterId) -> Result<&mut Register> {
        self.register_entry_mut(id).map(|entry| &mut entry.value)
    }

    /// The file that owns the register, `None` for caller-owned registers.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::StaleHandle`] when the register was removed.
    pub fn register_owner(&self, id: RegisterId) -> Result<Option<FileId>> {
        self.register_entry(id).map(|entry| entry.owner)
    }

    /// Takes a caller-owned register back out of the arena.
    ///
    /// # Errors
    ///
    /// - [`RegisterError::StillReferenced`] while a file maps it.
    /// - [`RegisterError::OwnedByFile`] for registers created by a file.
    /// - [`RegisterError::StaleHandle`] when already removed.
    pub fn remove_register(&mut self, id: RegisterId) -> Result<Register> {
        let entry = self.register_entry(id)?;
        if entry.containers > 0 {
            return Err(RegisterError::StillReferenced {
                containers: entry.containers,
            });
        }
        if entry.owner.is_some() {
            return Err(RegisterError::OwnedByFile);
        }
        self.registers
            .remove(id.index, id.generation)
            .map(|entry| entry.value)
            .ok_or(RegisterError::StaleHandle)
    }

    /// Creates an empty caller-owned register file.
    ///
    /// An `alignment` of zero makes every insertion align on the inserted
    /// element's own size.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::InvalidAlignment`] when `alignment` is neither
    /// zero nor a power of two.
    pub fn create_file(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        alignment: u64,
    ) -> Result<FileId> {
        if alignment != 0 && !alignment.is_power_of_two() {
            return Err(RegisterError::InvalidAlignment(alignment));
        }
        Ok(self.insert_file_owned(
            RegisterFile::new(name.into(), description.into(), alignment),
            None,
        ))
    }

    /// Read-only view of a register file.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::StaleHandle`] when the file was removed.
    pub fn file(&self, id: FileId) -> Result<RegisterFileRef<'_>> {
        let file = self.file_data(id)?;
        Ok(RegisterFileRef::new(self, id, file))
    }

    /// Mutable view of a register file.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::StaleHandle`] when the file was removed.
    pub fn file_mut(&mut self, id: FileId) -> Result<RegisterFileMut<'_>> {
        self.file_data(id)?;
        Ok(RegisterFileMut::new(self, id))
    }

    /// The file that owns the file, `None` for caller-owned files.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::StaleHandle`] when the file was removed.
    pub fn file_owner(&self, id: FileId) -> Result<Option<FileId>> {
        self.file_entry(id).map(|entry| entry.owner)
    }

    /// Removes a caller-owned file and releases everything it owns.
    ///
    /// Caller-owned children only lose a reference and stay in the arena.
    ///
    /// # Errors
    ///
    /// - [`RegisterError::StillReferenced`] while a parent file maps it.
    /// - [`RegisterError::OwnedByFile`] for files created by another file.
    /// - [`RegisterError::StaleHandle`] when already removed.
    pub fn remove_file(&mut self, id: FileId) -> Result<()> {
        let entry = self.file_entry(id)?;
        if entry.containers > 0 {
            return Err(RegisterError::StillReferenced {
                containers: entry.containers,
            });
        }
        if entry.owner.is_some() {
            return Err(RegisterError::OwnedByFile);
        }
        self.release_file(id);
        Ok(())
    }

    /// Deep-copies a file into a new caller-owned file.
    ///
    /// Registers are cloned without their callbacks and nested files are
    /// cloned recursively with their frozen sizes. The top-level copy is not
    /// frozen.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::StaleHandle`] when the file was removed.
    pub fn clone_file(&mut self, id: FileId) -> Result<FileId> {
        let copy = self.clone_file_owned(id, None)?;
        if let Some(entry) = self.file_entry_mut(copy) {
            entry.value.fixed_size = None;
        }
        Ok(copy)
    }

    /// Number of live registers.
    #[must_use]
    pub fn register_count(&self) -> usize {
        self.registers.len()
    }

    /// Number of live register files.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub(crate) fn insert_register_owned(
        &mut self,
        register: Register,
        owner: Option<FileId>,
    ) -> RegisterId {
        let (index, generation) = self.registers.insert(register, owner);
        RegisterId { index, generation }
    }

    pub(crate) fn insert_file_owned(&mut self, file: RegisterFile, owner: Option<FileId>) -> FileId {
        let (index, generation) = self.files.insert(file, owner);
        FileId { index, generation }
    }

    pub(crate) fn register_entry(&self, id: RegisterId) -> Result<&Entry<Register>> {
        self.registers
            .get(id.index, id.generation)
            .ok_or(RegisterError::StaleHandle)
    }

    pub(crate) fn register_entry_mut(&mut self, id: RegisterId) -> Result<&mut Entry<Register>> {
        self.registers
            .get_mut(id.index, id.generation)
            .ok_or(RegisterError::StaleHandle)
    }

    pub(crate) fn file_entry(&self, id: FileId) -> Result<&Entry<RegisterFile>> {
        self.files
            .get(id.index, id.generation)
            .ok_or(RegisterError::StaleHandle)
    }

    pub(crate) fn file_entry_mut(&mut self, id: FileId) -> Option<&mut Entry<RegisterFile>> {
        self.files.get_mut(id.index, id.generation)
    }

    pub(crate) fn file_data(&self, id: FileId) -> Result<&RegisterFile> {
        self.file_entry(id).map(|entry| &entry.value)
    }

    pub(crate) fn file_data_mut(&mut self, id: FileId) -> Result<&mut RegisterFile> {
        self.file_entry_mut(id)
            .map(|entry| &mut entry.value)
            .ok_or(RegisterError::StaleHandle)
    }

    /// Drops a register created by `owner` that never made it into the file.
    pub(crate) fn discard_register(&mut self, id: RegisterId) {
        self.registers.remove(id.index, id.generation);
    }

    /// Removes a file and drops one reference on each direct child; owned
    /// children left without references are released too.
    pub(crate) fn release_file(&mut self, id: FileId) {
        let Some(entry) = self.files.remove(id.index, id.generation) else {
            return;
        };
        for register in entry.value.registers.into_values() {
            let Some(child) = self.registers.get_mut(register.index, register.generation) else {
                continue;
            };
            child.containers = child.containers.saturating_sub(1);
            if child.owner == Some(id) {
                if child.containers == 0 {
                    self.registers.remove(register.index, register.generation);
                } else {
                    child.owner = None;
                }
            }
        }
        for file in entry.value.files.into_values() {
            let Some(child) = self.files.get_mut(file.index, file.generation) else {
                continue;
            };
            child.containers = child.containers.saturating_sub(1);
            if child.owner == Some(id) {
                if child.containers == 0 {
                    self.release_file(file);
                } else {
                    child.owner = None;
                }
            }
        }
    }

    pub(crate) fn clone_file_owned(&mut self, id: FileId, owner: Option<FileId>) -> Result<FileId> {
        let source = self.file_data(id)?;
        let skeleton = RegisterFile::new(
            source.name.clone(),
            source.description.clone(),
            source.alignment,
        );
        let fixed_size = source.fixed_size;
        let registers: Vec<(u64, Register)> = source
            .registers
            .iter()
            .map(|(&address, &register)| self.register(register).map(|r| (address, r.clone())))
            .collect::<Result<_>>()?;
        let files: Vec<(u64, FileId)> = source
            .files
            .iter()
            .map(|(&address, &file)| (address, file))
            .collect();

        let copy = self.insert_file_owned(skeleton, owner);
        match self.fill_copy(copy, registers, files) {
            Ok(()) => {
                self.file_data_mut(copy)?.fixed_size = fixed_size;
                Ok(copy)
            }
            Err(error) => {
                self.release_file(copy);
                Err(error)
            }
        }
    }

    /// Populates a fresh copy, recording each child as soon as it exists so a
    /// failed copy can be released as a whole.
    fn fill_copy(
        &mut self,
        copy: FileId,
        registers: Vec<(u64, Register)>,
        files: Vec<(u64, FileId)>,
    ) -> Result<()> {
        for (address, register) in registers {
            let register = self.insert_register_owned(register, Some(copy));
            if let Ok(entry) = self.register_entry_mut(register) {
                entry.containers = 1;
            }
            let data = self.file_data_mut(copy)?;
            data.registers.insert(address, register);
            data.flattened.insert(address, register);
        }
        for (address, file) in files {
            let child = self.clone_file_owned(file, Some(copy))?;
            let mut inherited = Vec::new();
            if let Some(entry) = self.file_entry_mut(child) {
                entry.containers = 1;
                inherited.extend(
                    entry
                        .value
                        .flattened
                        .iter()
                        .map(|(&offset, &register)| (address + offset, register)),
                );
            }
            let data = self.file_data_mut(copy)?;
            data.files.insert(address, child);
            data.flattened.extend(inherited);
        }
        Ok(())
    }
}

impl std::fmt::Debug for RegisterArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterArena")
            .field("registers", &self.registers.len())
            .field("files", &self.files.len())
            .finish()
    }
}
