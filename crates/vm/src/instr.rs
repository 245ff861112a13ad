//! Defines the [`Opcode`] type, responsible for identifying a single bytecode instruction, as
//! well as the types used to decode the operands of the more involved instructions.

use std::fmt;

use bitflags::bitflags;

use crate::error::Error;

/// The opcode of an instruction, stored as the first byte of its encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Does nothing.
    Nop = 0,
    /// Loads a 1-byte immediate into a register.
    Load1 = 1,
    /// Loads a 2-byte immediate into a register.
    Load2 = 2,
    /// Loads a 3-byte immediate into a register.
    Load3 = 3,
    /// Loads a 4-byte immediate into a register.
    Load4 = 4,
    /// Loads a 5-byte immediate into a register.
    Load5 = 5,
    /// Loads a 6-byte immediate into a register.
    Load6 = 6,
    /// Loads a 7-byte immediate into a register.
    Load7 = 7,
    /// Loads an 8-byte immediate into a register.
    Load8 = 8,
    /// Moves a value between registers, memory and constants. See [`MoveFlags`].
    Mov = 9,
    /// `store = reg1 + reg2`
    Add = 10,
    /// `store = reg1 - reg2`
    Sub = 11,
    /// `store = reg1 * reg2`
    Mul = 12,
    /// `store = reg1 / reg2`
    Div = 13,
    /// Jumps if the last comparison found both operands equal.
    Je = 14,
    /// Jumps if the last comparison found both operands different.
    Jne = 15,
    /// Jumps if the left operand of the last comparison was greater.
    Jg = 16,
    /// Jumps if the left operand of the last comparison was lower.
    Jl = 17,
    /// Jumps if the left operand of the last comparison was greater or equal.
    Jge = 18,
    /// Jumps if the left operand of the last comparison was lower or equal.
    Jle = 19,
    /// Records the values of two registers for the next conditional jump.
    Cmp = 20,
    /// `reg = !reg`
    Not = 21,
    /// `reg1 &= reg2`
    And = 22,
    /// `reg1 |= reg2`
    Or = 23,
    /// `reg1 ^= reg2`
    Xor = 24,
    /// Pushes the program counter on the call stack and jumps to an absolute address.
    Jmp = 25,
    /// Pops the call stack into the program counter.
    Ret = 26,
    /// Halts the machine.
    End = 27,
    /// Reserved.
    Cpuid = 28,
    /// Invokes a host-registered interrupt handler.
    Int = 29,
}

impl Opcode {
    /// Every opcode, indexed by its byte value.
    const ALL: [Opcode; 30] = [
        Opcode::Nop,
        Opcode::Load1,
        Opcode::Load2,
        Opcode::Load3,
        Opcode::Load4,
        Opcode::Load5,
        Opcode::Load6,
        Opcode::Load7,
        Opcode::Load8,
        Opcode::Mov,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::Div,
        Opcode::Je,
        Opcode::Jne,
        Opcode::Jg,
        Opcode::Jl,
        Opcode::Jge,
        Opcode::Jle,
        Opcode::Cmp,
        Opcode::Not,
        Opcode::And,
        Opcode::Or,
        Opcode::Xor,
        Opcode::Jmp,
        Opcode::Ret,
        Opcode::End,
        Opcode::Cpuid,
        Opcode::Int,
    ];

    /// Returns the byte value of this opcode.
    #[inline(always)]
    pub const fn byte(self) -> u8 {
        self as u8
    }

    /// Returns the mnemonic of this opcode.
    pub const fn name(self) -> &'static str {
        match self {
            Opcode::Nop => "NOP",
            Opcode::Load1 => "LOAD1B",
            Opcode::Load2 => "LOAD2B",
            Opcode::Load3 => "LOAD3B",
            Opcode::Load4 => "LOAD4B",
            Opcode::Load5 => "LOAD5B",
            Opcode::Load6 => "LOAD6B",
            Opcode::Load7 => "LOAD7B",
            Opcode::Load8 => "LOAD8B",
            Opcode::Mov => "MOV",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Je => "JE",
            Opcode::Jne => "JNE",
            Opcode::Jg => "JG",
            Opcode::Jl => "JL",
            Opcode::Jge => "JGE",
            Opcode::Jle => "JLE",
            Opcode::Cmp => "CMP",
            Opcode::Not => "NOT",
            Opcode::And => "AND",
            Opcode::Or => "OR",
            Opcode::Xor => "XOR",
            Opcode::Jmp => "JMP",
            Opcode::Ret => "RET",
            Opcode::End => "END",
            Opcode::Cpuid => "CPUID",
            Opcode::Int => "INT",
        }
    }

    /// If this opcode is one of the `LOAD*B` family, returns the number of immediate bytes it
    /// consumes.
    #[inline]
    pub const fn load_width(self) -> Option<u8> {
        match self {
            Opcode::Load1
            | Opcode::Load2
            | Opcode::Load3
            | Opcode::Load4
            | Opcode::Load5
            | Opcode::Load6
            | Opcode::Load7
            | Opcode::Load8 => Some(self as u8),
            _ => None,
        }
    }

    /// Returns the `LOAD*B` opcode that loads an immediate of `width` bytes.
    pub fn load(width: u8) -> Result<Opcode, Error> {
        match width {
            1..=8 => Ok(Self::ALL[width as usize]),
            _ => Err(Error::InvalidWidth(width)),
        }
    }

    /// If this opcode is a conditional jump, returns the condition it tests.
    #[inline]
    pub const fn condition(self) -> Option<Condition> {
        match self {
            Opcode::Je => Some(Condition::Equal),
            Opcode::Jne => Some(Condition::NotEqual),
            Opcode::Jg => Some(Condition::Greater),
            Opcode::Jl => Some(Condition::Less),
            Opcode::Jge => Some(Condition::GreaterOrEqual),
            Opcode::Jle => Some(Condition::LessOrEqual),
            _ => None,
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = Error;

    #[inline]
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or(Error::InvalidOpcode(value))
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The relation a conditional jump tests between the two operands of the last comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    /// `lhs == rhs`
    Equal,
    /// `lhs != rhs`
    NotEqual,
    /// `lhs > rhs`
    Greater,
    /// `lhs < rhs`
    Less,
    /// `lhs >= rhs`
    GreaterOrEqual,
    /// `lhs <= rhs`
    LessOrEqual,
}

impl Condition {
    /// Evaluates the condition on a pair of signed operands.
    #[inline]
    pub fn holds(self, lhs: i64, rhs: i64) -> bool {
        match self {
            Condition::Equal => lhs == rhs,
            Condition::NotEqual => lhs != rhs,
            Condition::Greater => lhs > rhs,
            Condition::Less => lhs < rhs,
            Condition::GreaterOrEqual => lhs >= rhs,
            Condition::LessOrEqual => lhs <= rhs,
        }
    }
}

/// Where the source or the destination of a `MOV` instruction lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OperandKind {
    /// A 1-byte register index follows.
    Register = 0b00,
    /// A `width`-byte little-endian address follows. `width` bytes of memory are accessed
    /// at that address.
    Memory = 0b01,
    /// A `width`-byte little-endian literal follows. Only valid as a source.
    Constant = 0b10,
}

impl OperandKind {
    /// Decodes a 2-bit operand kind.
    #[inline]
    fn from_bits(bits: u8) -> Result<Self, Error> {
        match bits {
            0b00 => Ok(OperandKind::Register),
            0b01 => Ok(OperandKind::Memory),
            0b10 => Ok(OperandKind::Constant),
            _ => Err(Error::InvalidOperandKind(bits)),
        }
    }
}

bitflags! {
    /// The flags byte following a `MOV` opcode.
    ///
    /// ```text
    ///   7 6   5 4   3 2 1 0
    /// [ dst ][ src ][ width ]
    /// ```
    ///
    /// The width field is only meaningful when one of the operands is a memory address or a
    /// constant.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MoveFlags: u8 {
        /// The kind of the destination operand.
        const DESTINATION = 0b1100_0000;
        /// The kind of the source operand.
        const SOURCE = 0b0011_0000;
        /// The width, in bytes, of memory addresses, memory accesses and constants.
        const WIDTH = 0b0000_1111;
    }
}

impl MoveFlags {
    /// Builds the flags byte of a `MOV` instruction.
    #[inline]
    pub const fn new(destination: OperandKind, source: OperandKind, width: u8) -> Self {
        Self::from_bits_retain(
            (destination as u8) << 6 | (source as u8) << 4 | (width & Self::WIDTH.bits()),
        )
    }

    /// Returns the kind of the destination operand.
    #[inline]
    pub fn destination(self) -> Result<OperandKind, Error> {
        OperandKind::from_bits((self.bits() & Self::DESTINATION.bits()) >> 6)
    }

    /// Returns the kind of the source operand.
    #[inline]
    pub fn source(self) -> Result<OperandKind, Error> {
        OperandKind::from_bits((self.bits() & Self::SOURCE.bits()) >> 4)
    }

    /// Returns the raw width field, which may be outside of `1..=8`.
    #[inline(always)]
    pub const fn width(self) -> u8 {
        self.bits() & Self::WIDTH.bits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_bytes_are_dense() {
        for byte in 0..30u8 {
            assert_eq!(Opcode::try_from(byte).map(Opcode::byte), Ok(byte));
        }
        assert_eq!(Opcode::try_from(30), Err(Error::InvalidOpcode(30)));
        assert_eq!(Opcode::try_from(0xFF), Err(Error::InvalidOpcode(0xFF)));
    }

    #[test]
    fn load_family() {
        assert_eq!(Opcode::load(1), Ok(Opcode::Load1));
        assert_eq!(Opcode::load(8), Ok(Opcode::Load8));
        assert_eq!(Opcode::load(0), Err(Error::InvalidWidth(0)));
        assert_eq!(Opcode::Load5.load_width(), Some(5));
        assert_eq!(Opcode::Mov.load_width(), None);
    }

    #[test]
    fn move_flags_layout() {
        let flags = MoveFlags::new(OperandKind::Memory, OperandKind::Constant, 4);
        assert_eq!(flags.bits(), 0b0110_0100);
        assert_eq!(flags.destination(), Ok(OperandKind::Memory));
        assert_eq!(flags.source(), Ok(OperandKind::Constant));
        assert_eq!(flags.width(), 4);

        let reserved = MoveFlags::from_bits_retain(0b1100_0001);
        assert_eq!(reserved.destination(), Err(Error::InvalidOperandKind(0b11)));
    }

    #[test]
    fn conditions() {
        assert!(Condition::Greater.holds(2, -1));
        assert!(!Condition::Less.holds(2, -1));
        assert!(Condition::LessOrEqual.holds(3, 3));
        assert_eq!(Opcode::Jne.condition(), Some(Condition::NotEqual));
        assert_eq!(Opcode::Jmp.condition(), None);
    }
}
