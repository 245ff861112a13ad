//! Defines the [`Interrupt`] trait, responsible for executing host-provided code when a program
//! executes an `INT` instruction.
//!
//! Interrupts let the host extend the instruction set without touching the decoder. They are
//! plain synchronous calls: the handler runs on the caller's thread, in the middle of the
//! step that executed `INT`, and gets full mutable access to the [`Machine`].

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::error::Error;
use crate::Machine;

/// An error returned by an [`Interrupt`] handler.
///
/// It is turned into [`Error::Interrupt`] by the machine, which then halts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterruptFailed(pub String);

impl From<Error> for InterruptFailed {
    fn from(value: Error) -> Self {
        InterruptFailed(value.to_string())
    }
}

impl fmt::Display for InterruptFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A handler that may be invoked by the `INT` instruction.
pub trait Interrupt {
    /// Handles interrupt `index`.
    ///
    /// When this is called, the program counter already points past the `INT` instruction.
    fn handle(&mut self, vm: &mut Machine, index: u8) -> Result<(), InterruptFailed>;
}

impl<F> Interrupt for F
where
    F: FnMut(&mut Machine, u8) -> Result<(), InterruptFailed>,
{
    #[inline]
    fn handle(&mut self, vm: &mut Machine, index: u8) -> Result<(), InterruptFailed> {
        self(vm, index)
    }
}

/// A handler shared between the table and the dispatch currently running it.
pub(crate) type SharedInterrupt = Rc<RefCell<dyn Interrupt>>;

/// Maps interrupt indices to their handler.
///
/// Registering a handler for an index that already has one replaces it. Entries are never
/// removed, not even while their handler runs.
#[derive(Default)]
pub struct InterruptTable {
    handlers: BTreeMap<u8, SharedInterrupt>,
}

impl InterruptTable {
    /// Registers `handler` for interrupt `index`, replacing any previous handler.
    pub fn register<I>(&mut self, index: u8, handler: I)
    where
        I: Interrupt + 'static,
    {
        self.handlers.insert(index, Rc::new(RefCell::new(handler)));
    }

    /// Returns whether a handler is registered for `index`.
    #[inline]
    pub fn contains(&self, index: u8) -> bool {
        self.handlers.contains_key(&index)
    }

    /// Returns the number of registered handlers.
    #[inline]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns whether no handler is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Returns a handle on the handler for `index`, leaving the entry in the table.
    ///
    /// The handle outlives a replacement of the entry made while the handler runs.
    #[inline]
    pub(crate) fn get(&self, index: u8) -> Option<SharedInterrupt> {
        self.handlers.get(&index).cloned()
    }
}

impl fmt::Debug for InterruptTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterruptTable")
            .field("indices", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
