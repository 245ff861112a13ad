//! # xvm
//!
//! A small register-based bytecode virtual machine.
//!
//! A [`Machine`] owns a flat byte-addressable [`Memory`] holding the program, a [`Cpu`] with
//! sixteen signed 64-bit registers, a call stack and a comparison latch, and an
//! [`InterruptTable`] through which the host extends the instruction set.
//!
//! Programs are built by appending encoded bytes to the memory, then driven one instruction at
//! a time with [`Machine::step`] (or all at once with [`Machine::run`]).
//!
//! # Encoding
//!
//! Every instruction starts with a one-byte [`Opcode`], followed by its operands. Register
//! operands are one byte, addresses and immediates are little-endian. See [`Opcode`] and
//! [`MoveFlags`](instr::MoveFlags) for the layout of each instruction.

#![warn(missing_docs, missing_debug_implementations)]
#![forbid(unsafe_code)]

use tracing::{debug, error, warn};

use config::Config;
use cpu::{Comparison, Cpu, Registers, Status};
use error::Error;
use instr::{MoveFlags, Opcode, OperandKind};
use interrupt::{Interrupt, InterruptTable};
use memory::Memory;
use trace::{Signal, Trace};

pub mod config;
pub mod cpu;
pub mod error;
pub mod instr;
pub mod interrupt;
pub mod memory;
pub mod trace;


/// Contains the full state of the virtual machine.
///
/// # Components
///
/// The [`Machine`] is composed of three main components:
///
/// - [`Cpu`]: The central processing unit of the virtual machine, holding the program counter,
///   the registers, the call stack and the comparison latch.
///
/// - [`Memory`]: The memory associated with the virtual machine. Instructions and working memory
///   are stored here.
///
/// - [`InterruptTable`]: The host-provided handlers invoked by the `INT` instruction.
///
/// # Faults
///
/// Any [`Error`] returned by [`Machine::step`] halts the machine. It stays halted until
/// [`Machine::reset`] is called.
#[derive(Debug, Default)]
pub struct Machine {
    /// The central processing unit of the virtual machine.
    cpu: Cpu,
    /// The memory associated with the virtual machine.
    ///
    /// Instructions and working memory are stored here.
    memory: Memory,
    /// The handlers invoked by the `INT` instruction.
    interrupts: InterruptTable,
    /// The host-chosen configuration.
    config: Config,
}

impl Machine {
    /// Creates a new running [`Machine`] with an empty memory and no interrupt handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new running [`Machine`] using the provided [`Config`].
    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Returns the current state of the [`Cpu`].
    #[inline(always)]
    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    /// Returns the current state of the [`Memory`].
    #[inline(always)]
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Returns the [`Memory`] of the machine, to load a program or let an interrupt handler
    /// poke at it.
    #[inline(always)]
    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    /// Returns the register file.
    #[inline(always)]
    pub fn registers(&self) -> &Registers {
        &self.cpu.registers
    }

    /// Returns the register file mutably.
    #[inline(always)]
    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.cpu.registers
    }

    /// Returns the saved return addresses, most recent last.
    #[inline(always)]
    pub fn call_stack(&self) -> &[u64] {
        &self.cpu.call_stack
    }

    /// Returns the operands of the last `CMP` instruction.
    #[inline(always)]
    pub fn comparison(&self) -> Comparison {
        self.cpu.comparison
    }

    /// Returns the current value of the program counter.
    #[inline(always)]
    pub fn pc(&self) -> u64 {
        self.cpu.pc
    }

    /// Returns the current [`Status`] of the machine.
    #[inline(always)]
    pub fn status(&self) -> Status {
        self.cpu.status
    }

    /// Returns whether the machine can execute another instruction.
    #[inline(always)]
    pub fn is_running(&self) -> bool {
        self.cpu.is_running()
    }

    /// Returns the configuration of the machine.
    #[inline(always)]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the interrupt handlers of the machine.
    #[inline(always)]
    pub fn interrupts(&self) -> &InterruptTable {
        &self.interrupts
    }

    /// Registers `handler` for interrupt `index`, replacing any previous handler.
    ///
    /// This may be called before or during execution, including from another handler.
    pub fn register_interrupt<I>(&mut self, index: u8, handler: I)
    where
        I: Interrupt + 'static,
    {
        self.interrupts.register(index, handler);
    }

    /// Puts the [`Cpu`] back in its initial state: program counter at zero, registers cleared,
    /// empty call stack, running.
    ///
    /// The memory and the interrupt handlers are left untouched.
    pub fn reset(&mut self) {
        self.cpu.reset();
    }

    /// Advances the virtual machine by a single instruction, tracing events using the provided
    /// [`Trace`] implementation.
    ///
    /// # Returns
    ///
    /// - `Ok(status)` with the status of the machine after the instruction.
    ///
    /// - `Err(Error::Halted)` if the machine was already halted. Nothing changes.
    ///
    /// - `Err(_)` if the instruction faulted. The machine is halted.
    pub fn step<T>(&mut self, trace: &mut T) -> Result<Status, Error>
    where
        T: ?Sized + Trace,
    {
        if !self.cpu.is_running() {
            return Err(Error::Halted);
        }

        if self.cpu.pc >= self.memory.len() as u64 {
            self.raise(trace, Signal::DeadEnd);
            self.cpu.status = Status::Halted;
            return Ok(Status::Halted);
        }

        let pc = self.cpu.pc;
        match self.execute(trace) {
            Ok(()) => Ok(self.cpu.status),
            Err(err) => {
                error!(pc, fault = %err, "machine faulted");
                self.cpu.status = Status::Halted;
                Err(err)
            }
        }
    }

    /// Steps the machine until it halts.
    ///
    /// If a step limit is configured and reached first, [`Error::StepLimitExceeded`] is
    /// returned and the machine is left running.
    ///
    /// # Returns
    ///
    /// The number of steps performed.
    pub fn run<T>(&mut self, trace: &mut T) -> Result<u64, Error>
    where
        T: ?Sized + Trace,
    {
        let mut steps = 0;

        while self.cpu.is_running() {
            if let Some(limit) = self.config.step_limit {
                if steps >= limit {
                    return Err(Error::StepLimitExceeded(limit));
                }
            }

            self.step(trace)?;
            steps += 1;
        }

        Ok(steps)
    }

    /// Invokes the handler registered for interrupt `index`.
    ///
    /// If no handler is registered, [`Signal::UnhandledInterrupt`] is raised and nothing else
    /// happens. A handler that ends up dispatching its own interrupt again, before returning,
    /// faults with [`Error::InterruptReentered`].
    pub fn dispatch_interrupt<T>(&mut self, index: u8, trace: &mut T) -> Result<(), Error>
    where
        T: ?Sized + Trace,
    {
        let Some(shared) = self.interrupts.get(index) else {
            self.raise(trace, Signal::UnhandledInterrupt(index));
            return Ok(());
        };

        let Ok(mut handler) = shared.try_borrow_mut() else {
            return Err(Error::InterruptReentered(index));
        };

        debug!(pc = self.cpu.pc, index, "dispatching interrupt");
        handler
            .handle(self, index)
            .map_err(|err| Error::Interrupt {
                index,
                message: err.0,
            })
    }

    /// Reports a [`Signal`] to the host.
    fn raise<T>(&self, trace: &mut T, signal: Signal)
    where
        T: ?Sized + Trace,
    {
        let pc = self.cpu.pc;
        match signal {
            Signal::DeadEnd => debug!(pc, %signal, "signal raised"),
            _ => warn!(pc, %signal, "signal raised"),
        }
        trace.signal(pc, signal);
    }

    /// Reads the byte at the program counter and advances it.
    #[inline]
    fn fetch_byte(&mut self) -> Result<u8, Error> {
        let byte = self.memory.read_byte(self.cpu.pc)?;
        self.cpu.pc += 1;
        Ok(byte)
    }

    /// Reads a little-endian value of `width` bytes at the program counter and advances it.
    #[inline]
    fn fetch(&mut self, width: u8) -> Result<u64, Error> {
        let value = self.memory.read(self.cpu.pc, width)?;
        self.cpu.pc += width as u64;
        Ok(value)
    }

    /// Decodes and executes the instruction at the program counter.
    fn execute<T>(&mut self, trace: &mut T) -> Result<(), Error>
    where
        T: ?Sized + Trace,
    {
        let pc = self.cpu.pc;
        let opcode = Opcode::try_from(self.fetch_byte()?)?;

        trace.instruction(pc, opcode);
        if self.config.trace_instructions {
            tracing::trace!(pc, %opcode, "executing");
        }

        match opcode {
            Opcode::Nop => (),
            Opcode::Load1
            | Opcode::Load2
            | Opcode::Load3
            | Opcode::Load4
            | Opcode::Load5
            | Opcode::Load6
            | Opcode::Load7
            | Opcode::Load8 => {
                let width = opcode.load_width().ok_or(Error::InvalidOpcode(opcode.byte()))?;
                let reg = self.fetch_byte()?;
                let value = self.fetch(width)?;
                self.cpu.registers.set(reg, value as i64)?;
            }
            Opcode::Mov => self.execute_move()?,
            Opcode::Add => self.arithmetic(trace, |lhs, rhs| Ok(lhs.overflowing_add(rhs)))?,
            Opcode::Sub => self.arithmetic(trace, |lhs, rhs| Ok(lhs.overflowing_sub(rhs)))?,
            Opcode::Mul => self.arithmetic(trace, |lhs, rhs| Ok(lhs.overflowing_mul(rhs)))?,
            Opcode::Div => self.arithmetic(trace, |lhs, rhs| {
                if rhs == 0 {
                    Err(Error::DivideByZero)
                } else {
                    Ok(lhs.overflowing_div(rhs))
                }
            })?,
            Opcode::Je
            | Opcode::Jne
            | Opcode::Jg
            | Opcode::Jl
            | Opcode::Jge
            | Opcode::Jle => {
                let address = self.fetch(8)?;
                let Comparison { lhs, rhs } = self.cpu.comparison;
                if opcode.condition().is_some_and(|c| c.holds(lhs, rhs)) {
                    self.cpu.pc = address;
                }
            }
            Opcode::Cmp => {
                let reg1 = self.fetch_byte()?;
                let reg2 = self.fetch_byte()?;
                self.cpu.comparison = Comparison {
                    lhs: self.cpu.registers.get(reg1)?,
                    rhs: self.cpu.registers.get(reg2)?,
                };
            }
            Opcode::Not => {
                let reg = self.fetch_byte()?;
                let value = self.cpu.registers.get(reg)?;
                self.cpu.registers.set(reg, !value)?;
            }
            Opcode::And => self.bitwise(|a, b| a & b)?,
            Opcode::Or => self.bitwise(|a, b| a | b)?,
            Opcode::Xor => self.bitwise(|a, b| a ^ b)?,
            Opcode::Jmp => {
                let address = self.fetch(8)?;
                self.cpu.push_return(self.cpu.pc);
                self.cpu.pc = address;
            }
            Opcode::Ret => self.cpu.pc = self.cpu.pop_return()?,
            Opcode::End => self.cpu.status = Status::Halted,
            Opcode::Cpuid => return Err(Error::Unimplemented(opcode)),
            Opcode::Int => {
                let index = self.fetch_byte()?;
                self.dispatch_interrupt(index, trace)?;
            }
        }

        Ok(())
    }

    /// Executes the operands of an `ADD`, `SUB`, `MUL` or `DIV` instruction.
    ///
    /// `op` returns the wrapped result and whether it overflowed.
    fn arithmetic<T, F>(&mut self, trace: &mut T, op: F) -> Result<(), Error>
    where
        T: ?Sized + Trace,
        F: FnOnce(i64, i64) -> Result<(i64, bool), Error>,
    {
        let reg1 = self.fetch_byte()?;
        let reg2 = self.fetch_byte()?;
        let store = self.fetch_byte()?;

        let lhs = self.cpu.registers.get(reg1)?;
        let rhs = self.cpu.registers.get(reg2)?;
        let (result, overflowed) = op(lhs, rhs)?;

        self.cpu.registers.set(store, result)?;
        if overflowed {
            self.raise(trace, Signal::Overflowed);
        }

        Ok(())
    }

    /// Executes an `AND`, `OR` or `XOR` instruction: `reg1 = op(reg1, reg2)`.
    fn bitwise(&mut self, op: impl FnOnce(i64, i64) -> i64) -> Result<(), Error> {
        let reg1 = self.fetch_byte()?;
        let reg2 = self.fetch_byte()?;

        let lhs = self.cpu.registers.get(reg1)?;
        let rhs = self.cpu.registers.get(reg2)?;
        self.cpu.registers.set(reg1, op(lhs, rhs))
    }

    /// Executes a `MOV` instruction.
    ///
    /// The source operand is decoded and read first, then the destination operand is decoded
    /// and written.
    fn execute_move(&mut self) -> Result<(), Error> {
        let flags = MoveFlags::from_bits_retain(self.fetch_byte()?);
        let width = flags.width();

        let value = match flags.source()? {
            OperandKind::Register => {
                let reg = self.fetch_byte()?;
                self.cpu.registers.get(reg)? as u64
            }
            OperandKind::Memory => {
                let address = self.fetch(width)?;
                self.memory.read(address, width)?
            }
            OperandKind::Constant => self.fetch(width)?,
        };

        match flags.destination()? {
            OperandKind::Register => {
                let reg = self.fetch_byte()?;
                self.cpu.registers.set(reg, value as i64)
            }
            OperandKind::Memory => {
                let address = self.fetch(width)?;
                self.memory.write(address, value, width)
            }
            OperandKind::Constant => Err(Error::ConstantDestination),
        }
    }
}
