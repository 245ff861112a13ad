//! Defines the [`Cpu`] type, responsible for describing the state of the CPU.
//!
//! More information in the documentation for [`Cpu`].

use crate::error::Error;

/// The number of general-purpose registers of the [`Cpu`].
pub const REGISTER_COUNT: usize = 16;

/// Whether the machine should keep stepping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    /// The machine can execute the next instruction.
    #[default]
    Running,
    /// The machine executed `END`, ran off the end of its memory, or faulted.
    ///
    /// Only [`Machine::reset`](crate::Machine::reset) brings it back to [`Status::Running`].
    Halted,
}

/// The general-purpose register file: 16 signed 64-bit slots.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Registers([i64; REGISTER_COUNT]);

impl Registers {
    /// Returns the value of register `index`.
    #[inline]
    pub fn get(&self, index: u8) -> Result<i64, Error> {
        self.0
            .get(index as usize)
            .copied()
            .ok_or(Error::InvalidRegister(index))
    }

    /// Sets the value of register `index`.
    #[inline]
    pub fn set(&mut self, index: u8, value: i64) -> Result<(), Error> {
        let slot = self
            .0
            .get_mut(index as usize)
            .ok_or(Error::InvalidRegister(index))?;
        *slot = value;
        Ok(())
    }

    /// Returns every register, in index order.
    #[inline(always)]
    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }
}

/// The operands recorded by the last `CMP` instruction.
///
/// Only the raw values are stored. Conditional jumps derive their relation on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Comparison {
    /// The value of the first register operand.
    pub lhs: i64,
    /// The value of the second register operand.
    pub rhs: i64,
}

/// The Central Processing Unit (CPU) responsible for executing bytecode instructions.
///
/// By itself, a [`Cpu`] is not enough to execute a program. In order to do anything
/// useful, it has to be connected to a [`Memory`](crate::memory::Memory).
#[derive(Debug, Clone, Default)]
pub struct Cpu {
    /// The Program Counter of the CPU, pointing to the next byte to be fetched from memory.
    ///
    /// Every byte consumed while decoding advances it by one. Jumps overwrite it.
    pub pc: u64,
    /// Whether the CPU is still running.
    pub status: Status,
    /// The general-purpose registers.
    pub registers: Registers,
    /// The return addresses saved by `JMP`, most recent last.
    pub call_stack: Vec<u64>,
    /// The operands of the last `CMP` instruction.
    pub comparison: Comparison,
}

impl Cpu {
    /// Puts the CPU back in its initial state.
    ///
    /// The call stack keeps its allocation.
    pub fn reset(&mut self) {
        self.pc = 0;
        self.status = Status::Running;
        self.registers = Registers::default();
        self.call_stack.clear();
        self.comparison = Comparison::default();
    }

    /// Returns whether the CPU is still running.
    #[inline(always)]
    pub fn is_running(&self) -> bool {
        self.status == Status::Running
    }

    /// Saves `address` on the call stack.
    #[inline]
    pub fn push_return(&mut self, address: u64) {
        self.call_stack.push(address);
    }

    /// Removes the most recent return address from the call stack.
    #[inline]
    pub fn pop_return(&mut self) -> Result<u64, Error> {
        self.call_stack.pop().ok_or(Error::StackUnderflow)
    }
}
