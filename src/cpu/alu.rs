//! Arithmetic logic unit.
//!
//! The ALU has no state of its own: it reads two registers, combines them,
//! and writes the result back into the first one. All arithmetic wraps at
//! 8 bits, matching the register width.

use crate::cpu::registers::{Registers, RegisterError};
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// An ALU operation.
///
/// The discriminant is the operation tag carried in the low nibble of an
/// ALU-class opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AluOp {
    /// dest := dest + src
    Add = 0b0000,
    /// dest := dest * src
    Mul = 0b0010,
}

impl AluOp {
    /// Every supported operation.
    pub const ALL: [AluOp; 2] = [AluOp::Add, AluOp::Mul];

    /// The operation tag (low nibble of the opcode).
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Assembly mnemonic.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            AluOp::Add => "ADD",
            AluOp::Mul => "MUL",
        }
    }

    /// Combine two operands.
    #[inline]
    pub fn compute(self, a: u8, b: u8) -> u8 {
        match self {
            AluOp::Add => a.wrapping_add(b),
            AluOp::Mul => a.wrapping_mul(b),
        }
    }
}

impl TryFrom<u8> for AluOp {
    type Error = AluError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        AluOp::ALL
            .into_iter()
            .find(|op| op.tag() == tag)
            .ok_or(AluError::UnsupportedAluOperation(tag))
    }
}

impl std::fmt::Display for AluOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Apply `op` to registers `dest` and `src`, storing into `dest`.
///
/// Both indices are validated before anything is written. Returns the
/// value stored.
pub fn apply(regs: &mut Registers, op: AluOp, dest: u8, src: u8) -> Result<u8, RegisterError> {
    let a = regs.get(dest)?;
    let b = regs.get(src)?;
    let result = op.compute(a, b);
    regs.set(dest, result)?;
    Ok(result)
}

/// Errors raised by the ALU.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AluError {
    #[error("unsupported ALU operation tag {0:#06b}")]
    UnsupportedAluOperation(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add() {
        let mut regs = Registers::new();
        regs.set(0, 3).unwrap();
        regs.set(1, 4).unwrap();

        assert_eq!(apply(&mut regs, AluOp::Add, 0, 1), Ok(7));
        assert_eq!(regs.get(0), Ok(7));
        assert_eq!(regs.get(1), Ok(4));
    }

    #[test]
    fn test_add_wraps() {
        let mut regs = Registers::new();
        regs.set(2, 200).unwrap();
        regs.set(3, 100).unwrap();

        apply(&mut regs, AluOp::Add, 2, 3).unwrap();
        assert_eq!(regs.get(2), Ok(44));
    }

    #[test]
    fn test_mul_wraps() {
        let mut regs = Registers::new();
        regs.set(0, 16).unwrap();
        regs.set(1, 17).unwrap();

        apply(&mut regs, AluOp::Mul, 0, 1).unwrap();
        assert_eq!(regs.get(0), Ok((16 * 17 % 256) as u8));
    }

    #[test]
    fn test_same_register_operands() {
        let mut regs = Registers::new();
        regs.set(4, 12).unwrap();

        apply(&mut regs, AluOp::Mul, 4, 4).unwrap();
        assert_eq!(regs.get(4), Ok(144));
    }

    #[test]
    fn test_invalid_register_leaves_dest_untouched() {
        let mut regs = Registers::new();
        regs.set(0, 5).unwrap();

        assert_eq!(
            apply(&mut regs, AluOp::Add, 0, 9),
            Err(RegisterError::InvalidRegister(9))
        );
        assert_eq!(regs.get(0), Ok(5));
    }

    #[test]
    fn test_tag_lookup() {
        assert_eq!(AluOp::try_from(0b0000), Ok(AluOp::Add));
        assert_eq!(AluOp::try_from(0b0010), Ok(AluOp::Mul));
        assert_eq!(AluOp::try_from(0b0001), Err(AluError::UnsupportedAluOperation(0b0001)));
    }
}
