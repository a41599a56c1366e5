//! LS-8 CPU registers.
//!
//! The LS-8 has eight general purpose 8-bit registers, R0-R7, and a
//! program counter:
//! - R7 doubles as the stack pointer (SP)
//! - PC holds the address of the instruction about to execute. It can
//!   reach 256 once the last instruction in memory has run; the next
//!   fetch then fails.

use crate::cpu::memory::{MemoryError, MEMORY_SIZE};
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Number of general purpose registers.
pub const REGISTER_COUNT: usize = 8;

/// Index of the register reserved as the stack pointer.
pub const SP: u8 = 7;

/// Value of SP when the stack is empty.
pub const STACK_START: u8 = 0xF4;

/// The LS-8 register file.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// R0-R7. R7 is the stack pointer.
    reg: [u8; REGISTER_COUNT],

    /// PC: address of the instruction about to execute
    pub pc: u16,
}

impl Registers {
    /// Create a new register file: everything zeroed except SP.
    pub fn new() -> Self {
        let mut reg = [0; REGISTER_COUNT];
        reg[SP as usize] = STACK_START;
        Self { reg, pc: 0 }
    }

    /// Reset all registers to their power-on values.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Read register `index` (0-7).
    #[inline]
    pub fn get(&self, index: u8) -> Result<u8, RegisterError> {
        self.reg
            .get(index as usize)
            .copied()
            .ok_or(RegisterError::InvalidRegister(index))
    }

    /// Write register `index` (0-7).
    #[inline]
    pub fn set(&mut self, index: u8, value: u8) -> Result<(), RegisterError> {
        let slot = self.reg
            .get_mut(index as usize)
            .ok_or(RegisterError::InvalidRegister(index))?;
        *slot = value;
        Ok(())
    }

    /// The stack pointer (R7).
    #[inline]
    pub fn sp(&self) -> u8 {
        self.reg[SP as usize]
    }

    /// Set the stack pointer (R7).
    #[inline]
    pub fn set_sp(&mut self, value: u8) {
        self.reg[SP as usize] = value;
    }

    /// All eight registers, R0 first.
    pub fn as_slice(&self) -> &[u8] {
        &self.reg
    }

    /// The address just past an instruction of `width` bytes at PC.
    ///
    /// One past the end of memory is allowed; anything further fails.
    pub fn next_pc(&self, width: u8) -> Result<u16, MemoryError> {
        let next = self.pc + width as u16;
        if next as usize > MEMORY_SIZE {
            return Err(MemoryError::OutOfBoundsAddress(next as i32));
        }
        Ok(next)
    }

    /// Set the program counter to an absolute address.
    pub fn jump(&mut self, addr: u8) {
        self.pc = addr as u16;
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PC={:02X}", self.pc)?;
        for (i, value) in self.reg.iter().enumerate() {
            write!(f, " R{}={:02X}", i, value)?;
        }
        Ok(())
    }
}

/// Errors that can occur when addressing the register file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegisterError {
    #[error("invalid register index {0} (expected 0-7)")]
    InvalidRegister(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_on_values() {
        let regs = Registers::new();

        for i in 0..SP {
            assert_eq!(regs.get(i), Ok(0));
        }
        assert_eq!(regs.sp(), 0xF4);
        assert_eq!(regs.get(SP), Ok(0xF4));
        assert_eq!(regs.pc, 0);
    }

    #[test]
    fn test_sp_aliases_r7() {
        let mut regs = Registers::new();

        regs.set_sp(0xE0);
        assert_eq!(regs.get(7), Ok(0xE0));

        regs.set(7, 0x10).unwrap();
        assert_eq!(regs.sp(), 0x10);
    }

    #[test]
    fn test_invalid_register() {
        let mut regs = Registers::new();

        assert_eq!(regs.get(8), Err(RegisterError::InvalidRegister(8)));
        assert_eq!(regs.set(255, 1), Err(RegisterError::InvalidRegister(255)));
    }

    #[test]
    fn test_next_pc() {
        let mut regs = Registers::new();
        regs.jump(10);

        assert_eq!(regs.next_pc(3), Ok(13));
        assert_eq!(regs.pc, 10);
    }

    #[test]
    fn test_next_pc_past_end() {
        let mut regs = Registers::new();
        regs.jump(254);

        assert_eq!(regs.next_pc(1), Ok(255));
        assert_eq!(regs.next_pc(2), Ok(256));
        assert_eq!(regs.next_pc(3), Err(MemoryError::OutOfBoundsAddress(257)));
    }

    #[test]
    fn test_reset() {
        let mut regs = Registers::new();
        regs.set(0, 9).unwrap();
        regs.set_sp(0x20);
        regs.jump(0x40);

        regs.reset();
        assert_eq!(regs, Registers::new());
    }
}
