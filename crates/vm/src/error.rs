//! Defines the [`Error`] type of the crate.

use crate::instr::Opcode;

/// An error that might occur when executing a program.
///
/// Every variant except [`Error::StepLimitExceeded`] is a *fault*: it halts the
/// [`Machine`](crate::Machine) that produced it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The machine was stepped after it had already halted.
    #[error("the machine is halted")]
    Halted,
    /// The opcode byte at the program counter does not name any instruction.
    #[error("invalid opcode {0:#04x}")]
    InvalidOpcode(u8),
    /// The instruction exists but has no executable semantics yet.
    #[error("instruction {0} is not implemented")]
    Unimplemented(Opcode),
    /// A register operand referred to a register outside of the register file.
    #[error("register index {0} out of range")]
    InvalidRegister(u8),
    /// A width-dependent operand declared a width outside of `1..=8`.
    #[error("invalid operand width {0}")]
    InvalidWidth(u8),
    /// A `MOV` operand used the reserved kind `0b11`.
    #[error("invalid operand kind {0:#04b}")]
    InvalidOperandKind(u8),
    /// A `MOV` instruction used a constant as its destination.
    #[error("a constant cannot be the destination of a move")]
    ConstantDestination,
    /// An interrupt handler caused its own interrupt to be dispatched again before returning.
    #[error("interrupt {0:#04x} re-entered its own handler")]
    InterruptReentered(u8),
    /// Attempted to divide by zero.
    #[error("division by zero")]
    DivideByZero,
    /// A `RET` instruction was executed with an empty call stack.
    #[error("return with an empty call stack")]
    StackUnderflow,
    /// A memory access touched bytes past the end of the memory.
    #[error("memory access of {width} byte(s) at {address:#x} is out of bounds (length {length})")]
    OutOfBounds {
        /// The first address of the access.
        address: u64,
        /// The number of bytes accessed.
        width: u8,
        /// The length of the memory at the time of the access.
        length: usize,
    },
    /// An interrupt handler reported a failure.
    #[error("interrupt {index:#04x} failed: {message}")]
    Interrupt {
        /// The index of the interrupt that failed.
        index: u8,
        /// A description of the failure, provided by the handler.
        message: String,
    },
    /// [`Machine::run`](crate::Machine::run) performed the configured number of steps without
    /// the machine halting.
    ///
    /// This does not halt the machine.
    #[error("step limit of {0} exceeded")]
    StepLimitExceeded(u64),
}

impl Error {
    /// Returns whether this error halts the machine that produced it.
    #[inline]
    pub fn is_fault(&self) -> bool {
        !matches!(self, Error::StepLimitExceeded(_) | Error::Halted)
    }
}
