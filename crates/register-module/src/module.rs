//! Register module: a main register file served on a memory-mapped bus.
//!
//! Wide transactions are split into register-sized chunks and stop at the
//! first unmapped address or refused access.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use register_model::{AccessOutcome, FileId, RegisterArena, RegisterFileMut, RegisterId};

use crate::config::ModuleConfig;
use crate::error::{ModuleError, Result};
use crate::transaction::{Command, MemoryMappedTarget, ResponseStatus, Transaction};

/// Arena shared by every module of a register map.
pub type SharedArena = Rc<RefCell<RegisterArena>>;

/// Named register map served on a memory-mapped bus.
///
/// All registers live in the shared arena; the module only holds the handle
/// of its main register file.
pub struct RegModule {
    name: String,
    arena: SharedArena,
    main: FileId,
    config: ModuleConfig,
}

impl RegModule {
    /// Creates the module and its empty main register file.
    ///
    /// # Errors
    ///
    /// - [`ModuleError::InvalidBusWidth`] for an invalid bus width.
    /// - [`ModuleError::Register`] for an invalid alignment.
    /// - [`ModuleError::ArenaBusy`] while the arena is borrowed.
    pub fn new(arena: SharedArena, name: impl Into<String>, config: ModuleConfig) -> Result<Self> {
        config.validate()?;
        let name = name.into();
        let main = arena.try_borrow_mut().map_err(|_| ModuleError::ArenaBusy)?.create_file(
            format!("{name}_mainRegFile"),
            format!("Main Register File of {name}"),
            config.alignment,
        )?;
        tracing::debug!("created register module `{name}`");
        Ok(Self {
            name,
            arena,
            main,
            config,
        })
    }

    /// Module name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Construction parameters.
    #[must_use]
    pub const fn config(&self) -> ModuleConfig {
        self.config
    }

    /// Arena holding the module's registers.
    #[must_use]
    pub const fn arena(&self) -> &SharedArena {
        &self.arena
    }

    /// Handle of the main register file.
    #[must_use]
    pub const fn main_file(&self) -> FileId {
        self.main
    }

    /// Runs `edit` against the main register file.
    ///
    /// # Errors
    ///
    /// [`ModuleError::ArenaBusy`] while the arena is borrowed, or the error
    /// returned by `edit`.
    pub fn with_main_file<T>(
        &self,
        edit: impl FnOnce(&mut RegisterFileMut<'_>) -> register_model::Result<T>,
    ) -> Result<T> {
        let mut arena = self.arena.try_borrow_mut().map_err(|_| ModuleError::ArenaBusy)?;
        let mut file = arena.file_mut(self.main)?;
        edit(&mut file).map_err(ModuleError::from)
    }

    /// Maps a register of the shared arena at `address`.
    ///
    /// # Errors
    ///
    /// Same as [`RegisterFileMut::add_register`], plus [`ModuleError::ArenaBusy`].
    pub fn add_register(&self, address: u64, register: RegisterId) -> Result<()> {
        self.with_main_file(|file| file.add_register(address, register))
    }

    /// Maps a register at the next free aligned address.
    ///
    /// # Errors
    ///
    /// Same as [`RegisterFileMut::append_register`], plus [`ModuleError::ArenaBusy`].
    pub fn append_register(&self, register: RegisterId) -> Result<u64> {
        self.with_main_file(|file| file.append_register(register))
    }

    /// Maps a register file of the shared arena at `address`.
    ///
    /// # Errors
    ///
    /// Same as [`RegisterFileMut::add_register_file`], plus [`ModuleError::ArenaBusy`].
    pub fn add_register_file(&self, address: u64, file: FileId, size: Option<u64>) -> Result<()> {
        self.with_main_file(|main| main.add_register_file(address, file, size))
    }

    /// Maps a register file at the next free aligned address.
    ///
    /// # Errors
    ///
    /// Same as [`RegisterFileMut::append_register_file`], plus [`ModuleError::ArenaBusy`].
    pub fn append_register_file(&self, file: FileId, size: Option<u64>) -> Result<u64> {
        self.with_main_file(|main| main.append_register_file(file, size))
    }

    /// Maps the main register file of `other` at `address`.
    ///
    /// # Errors
    ///
    /// [`ModuleError::ForeignArena`] when `other` uses another arena, otherwise
    /// same as [`RegModule::add_register_file`].
    pub fn add_reg_module(&self, address: u64, other: &Self) -> Result<()> {
        self.check_same_arena(other)?;
        self.add_register_file(address, other.main, None)
    }

    /// Maps the main register file of `other` at the next free aligned address.
    ///
    /// # Errors
    ///
    /// Same as [`RegModule::add_reg_module`].
    pub fn append_reg_module(&self, other: &Self) -> Result<u64> {
        self.check_same_arena(other)?;
        self.append_register_file(other.main, None)
    }

    /// Recursive dump of the main register file.
    ///
    /// # Errors
    ///
    /// [`ModuleError::ArenaBusy`] while the arena is mutably borrowed.
    pub fn info(&self) -> Result<String> {
        let arena = self.arena.try_borrow().map_err(|_| ModuleError::ArenaBusy)?;
        Ok(arena.file(self.main)?.recursive_info(0))
    }

    fn check_same_arena(&self, other: &Self) -> Result<()> {
        if Rc::ptr_eq(&self.arena, &other.arena) {
            Ok(())
        } else {
            Err(ModuleError::ForeignArena(other.name.clone()))
        }
    }

    fn transfer(&self, transaction: &mut Transaction<'_>) -> ResponseStatus {
        let Ok(mut arena) = self.arena.try_borrow_mut() else {
            tracing::warn!("module `{}`: arena busy, transaction dropped", self.name);
            return ResponseStatus::GenericError;
        };
        let Ok(mut file) = arena.file_mut(self.main) else {
            return ResponseStatus::GenericError;
        };

        let command = transaction.command();
        let length = transaction.len();
        let mut address = transaction.address();
        let mut offset = 0;
        while offset < length {
            let register = match file.register_at_mut(address) {
                Ok(register) => register,
                Err(error) => {
                    tracing::warn!("module `{}`: {error}", self.name);
                    return ResponseStatus::AddressError;
                }
            };
            let size = register.size_in_bytes();
            let chunk = (length - offset).min(size);
            let window = &mut transaction.data_mut()[offset..offset + chunk];
            let outcome = match command {
                Command::Read => register.read(window),
                Command::Write => register.write(window),
            };
            match outcome {
                Ok(AccessOutcome::Completed) => {}
                Ok(AccessOutcome::Refused) => {
                    tracing::debug!(
                        "module `{}`: register `{}` refused {command:?} at {address:#x}",
                        self.name,
                        register.name()
                    );
                    return ResponseStatus::GenericError;
                }
                Err(error) => {
                    tracing::warn!("module `{}`: {error}", self.name);
                    return ResponseStatus::GenericError;
                }
            }
            tracing::trace!(
                "module `{}`: {command:?} {chunk} byte(s) of `{}` at {address:#x}",
                self.name,
                register.name()
            );

            offset += chunk;
            if offset < length {
                let Some(next) = u64::try_from(size).ok().and_then(|size| address.checked_add(size)) else {
                    return ResponseStatus::AddressError;
                };
                address = next;
            }
        }
        ResponseStatus::Ok
    }
}

impl MemoryMappedTarget for RegModule {
    fn b_transport(&mut self, transaction: &mut Transaction<'_>) {
        let status = self.transfer(transaction);
        transaction.set_response(status);
    }
}

impl fmt::Debug for RegModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegModule")
            .field("name", &self.name)
            .field("main", &self.main)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
