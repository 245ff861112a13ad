//! Defines the [`Trace`] trait, used to gather information about the execution of a program
//! within the virtual machine.

use std::fmt;

use crate::instr::Opcode;

/// A non-fatal condition reported while executing a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// The program counter reached the end of the memory. The machine halts.
    DeadEnd,
    /// An `INT` instruction named an interrupt with no registered handler. Execution
    /// continues.
    UnhandledInterrupt(u8),
    /// An arithmetic instruction wrapped around. Execution continues with the wrapped result.
    Overflowed,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::DeadEnd => f.write_str("DEADEND"),
            Signal::UnhandledInterrupt(index) => write!(f, "UNHANDLED_INTERRUPT({index:#04x})"),
            Signal::Overflowed => f.write_str("OVERFLOWED"),
        }
    }
}

/// A collection of callbacks to be called during the execution of a program.
#[allow(unused_variables)]
pub trait Trace {
    /// Called after an opcode has been fetched, before its operands are decoded.
    ///
    /// `pc` is the address of the opcode byte.
    fn instruction(&mut self, pc: u64, opcode: Opcode) {}

    /// Called when a [`Signal`] is raised.
    ///
    /// `pc` is the value of the program counter at the time the signal is raised.
    fn signal(&mut self, pc: u64, signal: Signal) {}
}

/// An implementation of [`Trace`] that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTrace;
impl Trace for NoopTrace {}

/// An implementation of [`Trace`] that records every signal it receives.
#[derive(Debug, Default, Clone)]
pub struct SignalLog {
    /// The signals received so far, along with the program counter at which they were raised.
    pub signals: Vec<(u64, Signal)>,
}

impl Trace for SignalLog {
    fn signal(&mut self, pc: u64, signal: Signal) {
        self.signals.push((pc, signal));
    }
}
