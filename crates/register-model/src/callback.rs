//! Callback chains run around register accesses.
//!
//! Pre callbacks may veto an access by returning `false`; the first veto stops
//! the chain. Post callbacks always all run. Callbacks receive mutable access
//! to the register so they can perform nested accesses; the register's
//! reentrancy guards keep the same chain from running twice.

use std::fmt;
use std::rc::Rc;

use crate::bits::BitVector;
use crate::register::Register;

/// Identifier returned by callback registration; unique per register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CallbackId(u64);

impl CallbackId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw counter value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cb#{}", self.0)
    }
}

/// Result of a read or write that passed argument validation.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum AccessOutcome {
    /// The access ran to completion.
    Completed,
    /// A pre-access callback vetoed the access; register data is unchanged.
    Refused,
}

impl AccessOutcome {
    /// Whether the access completed.
    #[must_use]
    pub const fn is_completed(self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Event passed to read callbacks.
pub struct RegisterReadEvent<'a> {
    value: BitVector,
    register: &'a mut Register,
}

impl<'a> RegisterReadEvent<'a> {
    pub(crate) fn new(value: BitVector, register: &'a mut Register) -> Self {
        Self { value, register }
    }

    /// Raw register data when the access started.
    #[must_use]
    pub const fn value(&self) -> &BitVector {
        &self.value
    }

    /// The register being read.
    #[must_use]
    pub fn register(&self) -> &Register {
        &*self.register
    }

    /// Mutable handle for nested accesses on the same register.
    pub fn register_mut(&mut self) -> &mut Register {
        &mut *self.register
    }
}

/// Event passed to write callbacks.
pub struct RegisterWriteEvent<'a> {
    old_value: BitVector,
    new_value: BitVector,
    register: &'a mut Register,
}

impl<'a> RegisterWriteEvent<'a> {
    pub(crate) fn new(old_value: BitVector, new_value: BitVector, register: &'a mut Register) -> Self {
        Self {
            old_value,
            new_value,
            register,
        }
    }

    /// Data before the write.
    #[must_use]
    pub const fn old_value(&self) -> &BitVector {
        &self.old_value
    }

    /// Data the write commits, already merged through the write mask.
    #[must_use]
    pub const fn new_value(&self) -> &BitVector {
        &self.new_value
    }

    /// The register being written.
    #[must_use]
    pub fn register(&self) -> &Register {
        &*self.register
    }

    /// Mutable handle for nested accesses on the same register.
    pub fn register_mut(&mut self) -> &mut Register {
        &mut *self.register
    }
}

/// Vetoable pre-read callback.
pub type PreReadFn = dyn Fn(&mut RegisterReadEvent<'_>) -> bool;
/// Post-read callback.
pub type PostReadFn = dyn Fn(&mut RegisterReadEvent<'_>);
/// Vetoable pre-write callback.
pub type PreWriteFn = dyn Fn(&mut RegisterWriteEvent<'_>) -> bool;
/// Post-write callback.
pub type PostWriteFn = dyn Fn(&mut RegisterWriteEvent<'_>);

/// Ordered list of callbacks keyed by id.
pub(crate) struct CallbackChain<F: ?Sized> {
    entries: Vec<(CallbackId, Rc<F>)>,
}

impl<F: ?Sized> Default for CallbackChain<F> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<F: ?Sized> CallbackChain<F> {
    pub(crate) fn push(&mut self, id: CallbackId, callback: Rc<F>) {
        self.entries.push((id, callback));
    }

    pub(crate) fn remove(&mut self, id: CallbackId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Copies the callback handles so the chain can run while callbacks
    /// mutate the register that owns it.
    pub(crate) fn snapshot(&self) -> Vec<Rc<F>> {
        self.entries.iter().map(|(_, cb)| Rc::clone(cb)).collect()
    }
}

/// The four chains attached to one access view of a register.
pub(crate) struct AccessHooks<PreR: ?Sized, PostR: ?Sized, PreW: ?Sized, PostW: ?Sized> {
    pub(crate) pre_read: CallbackChain<PreR>,
    pub(crate) post_read: CallbackChain<PostR>,
    pub(crate) pre_write: CallbackChain<PreW>,
    pub(crate) post_write: CallbackChain<PostW>,
}

impl<PreR: ?Sized, PostR: ?Sized, PreW: ?Sized, PostW: ?Sized> Default
    for AccessHooks<PreR, PostR, PreW, PostW>
{
    fn default() -> Self {
        Self {
            pre_read: CallbackChain::default(),
            post_read: CallbackChain::default(),
            pre_write: CallbackChain::default(),
            post_write: CallbackChain::default(),
        }
    }
}

impl<PreR: ?Sized, PostR: ?Sized, PreW: ?Sized, PostW: ?Sized> AccessHooks<PreR, PostR, PreW, PostW> {
    pub(crate) fn count(&self) -> usize {
        self.pre_read.len() + self.post_read.len() + self.pre_write.len() + self.post_write.len()
    }

    pub(crate) fn clear(&mut self) {
        self.pre_read.clear();
        self.post_read.clear();
        self.pre_write.clear();
        self.post_write.clear();
    }
}

/// Callbacks registered through the native register API.
pub(crate) type NativeHooks = AccessHooks<PreReadFn, PostReadFn, PreWriteFn, PostWriteFn>;

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::{CallbackChain, CallbackId};

    #[test]
    fn removal_only_matches_registered_id() {
        let mut chain: CallbackChain<dyn Fn() -> u8> = CallbackChain::default();
        chain.push(CallbackId::new(0), Rc::new(|| 1_u8));
        chain.push(CallbackId::new(1), Rc::new(|| 2_u8));
        assert!(!chain.remove(CallbackId::new(7)));
        assert!(chain.remove(CallbackId::new(0)));
        assert!(!chain.remove(CallbackId::new(0)));
        let remaining: Vec<u8> = chain.snapshot().iter().map(|cb| cb()).collect();
        assert_eq!(remaining, vec![2]);
    }

    #[test]
    fn ids_format_with_prefix() {
        assert_eq!(CallbackId::new(3).to_string(), "cb#3");
        assert_eq!(CallbackId::new(3).get(), 3);
    }
}
