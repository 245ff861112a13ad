//! Defines the [`Memory`] type, responsible for representing the memory of the virtual machine.
//!
//! # Flat Memory
//!
//! The memory is a single growable sequence of bytes, addressed from zero. Code and data share
//! the same address space: the program counter and the addresses computed by instructions
//! index into the same sequence.
//!
//! The memory only grows through [`Memory::push`] and friends, which are meant to be used by
//! the host while assembling a program. Instructions may read and overwrite existing bytes but
//! never change the length of the memory.
//!
//! # Multi-byte Values
//!
//! Values of 1 to 8 bytes are stored little-endian (least significant byte first). Every
//! access is checked against the current length of the memory.

use num_traits::ToPrimitive;

use crate::error::Error;

/// The maximum width, in bytes, of a single memory access.
pub const MAX_WIDTH: u8 = 8;

/// Represents the memory of the virtual machine.
///
/// More information on memory can be found in [module-level documentation](self).
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    /// The bytes making up the memory.
    bytes: Vec<u8>,
}

impl Memory {
    /// Creates a new empty [`Memory`].
    pub const fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    /// Returns the number of bytes in the memory.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns whether the memory is empty.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns the content of the memory.
    #[inline(always)]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the address of the last byte of the memory, if any.
    ///
    /// Useful to remember the address of an instruction that was just emitted.
    #[inline]
    pub fn last_address(&self) -> Option<u64> {
        self.bytes.len().checked_sub(1).map(|last| last as u64)
    }

    /// Appends a single byte at the end of the memory.
    #[inline]
    pub fn push(&mut self, byte: u8) {
        self.bytes.push(byte);
    }

    /// Appends a sequence of bytes at the end of the memory.
    #[inline]
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// Appends the `width` least significant bytes of `value`, little-endian.
    pub fn push_value(&mut self, value: u64, width: u8) -> Result<(), Error> {
        check_width(width)?;
        self.bytes
            .extend_from_slice(&value.to_le_bytes()[..width as usize]);
        Ok(())
    }

    /// Returns the range of bytes covered by an access of `width` bytes at `address`.
    fn range(&self, address: u64, width: u8) -> Result<std::ops::Range<usize>, Error> {
        let out_of_bounds = || Error::OutOfBounds {
            address,
            width,
            length: self.bytes.len(),
        };

        let start = address.to_usize().ok_or_else(out_of_bounds)?;
        let end = start
            .checked_add(width as usize)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(out_of_bounds)?;

        Ok(start..end)
    }

    /// Reads the byte at `address`.
    #[inline]
    pub fn read_byte(&self, address: u64) -> Result<u8, Error> {
        let range = self.range(address, 1)?;
        Ok(self.bytes[range.start])
    }

    /// Reads a little-endian unsigned value of `width` bytes at `address`, zero-extended.
    pub fn read(&self, address: u64, width: u8) -> Result<u64, Error> {
        check_width(width)?;
        let range = self.range(address, width)?;

        let mut buf = [0u8; MAX_WIDTH as usize];
        buf[..width as usize].copy_from_slice(&self.bytes[range]);
        Ok(u64::from_le_bytes(buf))
    }

    /// Writes the `width` least significant bytes of `value` at `address`, little-endian.
    ///
    /// The memory never grows: the whole access must fit within the current length.
    pub fn write(&mut self, address: u64, value: u64, width: u8) -> Result<(), Error> {
        check_width(width)?;
        let range = self.range(address, width)?;
        self.bytes[range].copy_from_slice(&value.to_le_bytes()[..width as usize]);
        Ok(())
    }
}

/// Ensures that `width` is a valid access width.
#[inline]
fn check_width(width: u8) -> Result<(), Error> {
    if (1..=MAX_WIDTH).contains(&width) {
        Ok(())
    } else {
        Err(Error::InvalidWidth(width))
    }
}
