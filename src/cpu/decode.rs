//! Instruction decoder for the LS-8.
//!
//! Every instruction is one opcode byte followed by zero to two operand
//! bytes. The opcode byte is laid out as `AABCDDDD`:
//!
//! - `AA`: number of operands
//! - `B`: ALU operation
//! - `C`: instruction sets the PC itself
//! - `DDDD`: instruction identifier (the ALU operation tag for ALU ops)

use crate::cpu::alu::AluOp;
use crate::cpu::memory::MemoryError;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Opcode byte values. These must match existing program images bit for bit.
pub struct Opcode;

impl Opcode {
    pub const HLT: u8 = 0b0000_0001;
    pub const LDI: u8 = 0b1000_0010;
    pub const PRN: u8 = 0b0100_0111;
    pub const ADD: u8 = 0b1010_0000;
    pub const MUL: u8 = 0b1010_0010;
    pub const PUSH: u8 = 0b0100_0101;
    pub const POP: u8 = 0b0100_0110;
    pub const CALL: u8 = 0b0101_0000;
    pub const RET: u8 = 0b0001_0001;
}

const ALU_FLAG: u8 = 0b0010_0000;
const SETS_PC_FLAG: u8 = 0b0001_0000;

/// Number of operand bytes following `opcode`.
pub const fn operand_count(opcode: u8) -> u8 {
    opcode >> 6
}

/// Whether `opcode` is routed to the ALU.
pub const fn is_alu(opcode: u8) -> bool {
    opcode & ALU_FLAG != 0
}

/// Whether `opcode` writes the PC itself.
pub const fn sets_pc(opcode: u8) -> bool {
    opcode & SETS_PC_FLAG != 0
}

/// Decoded LS-8 instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// Halt the machine.
    Hlt,

    /// Load immediate: R[reg] := value
    Ldi { reg: u8, value: u8 },

    /// Print the value of R[reg].
    Prn { reg: u8 },

    /// R[reg_a] := R[reg_a] <op> R[reg_b]
    Alu { op: AluOp, reg_a: u8, reg_b: u8 },

    /// SP -= 1; M[SP] := R[reg]
    Push { reg: u8 },

    /// R[reg] := M[SP]; SP += 1
    Pop { reg: u8 },

    /// Push the return address, then PC := R[reg]
    Call { reg: u8 },

    /// PC := M[SP]; SP += 1
    Ret,
}

impl Instruction {
    /// The opcode byte for this instruction.
    pub fn opcode(&self) -> u8 {
        match self {
            Instruction::Hlt => Opcode::HLT,
            Instruction::Ldi { .. } => Opcode::LDI,
            Instruction::Prn { .. } => Opcode::PRN,
            Instruction::Alu { op, .. } => 0b1000_0000 | ALU_FLAG | op.tag(),
            Instruction::Push { .. } => Opcode::PUSH,
            Instruction::Pop { .. } => Opcode::POP,
            Instruction::Call { .. } => Opcode::CALL,
            Instruction::Ret => Opcode::RET,
        }
    }

    /// Encoded size in bytes: the opcode plus its operands.
    pub fn width(&self) -> u8 {
        1 + operand_count(self.opcode())
    }

    /// Whether executing this instruction sets the PC directly.
    pub fn sets_pc(&self) -> bool {
        sets_pc(self.opcode())
    }

    /// Assembly mnemonic.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Hlt => "HLT",
            Instruction::Ldi { .. } => "LDI",
            Instruction::Prn { .. } => "PRN",
            Instruction::Alu { op, .. } => op.mnemonic(),
            Instruction::Push { .. } => "PUSH",
            Instruction::Pop { .. } => "POP",
            Instruction::Call { .. } => "CALL",
            Instruction::Ret => "RET",
        }
    }
}

/// Decode the instruction starting at `pc` in `code`.
///
/// Dispatch is on the whole opcode byte: any byte outside the table is an
/// unknown opcode, even at the very end of memory.
pub fn decode(code: &[u8], pc: usize) -> Result<Instruction, DecodeError> {
    let byte_at = |addr: usize| {
        code.get(addr)
            .copied()
            .ok_or(MemoryError::OutOfBoundsAddress(addr as i32))
    };
    let opcode = byte_at(pc)?;
    let operand = |n: usize| byte_at(pc + n);

    let instruction = match opcode {
        Opcode::HLT => Instruction::Hlt,
        Opcode::RET => Instruction::Ret,
        Opcode::LDI => Instruction::Ldi { reg: operand(1)?, value: operand(2)? },
        Opcode::PRN => Instruction::Prn { reg: operand(1)? },
        Opcode::PUSH => Instruction::Push { reg: operand(1)? },
        Opcode::POP => Instruction::Pop { reg: operand(1)? },
        Opcode::CALL => Instruction::Call { reg: operand(1)? },
        Opcode::ADD => Instruction::Alu { op: AluOp::Add, reg_a: operand(1)?, reg_b: operand(2)? },
        Opcode::MUL => Instruction::Alu { op: AluOp::Mul, reg_a: operand(1)?, reg_b: operand(2)? },
        _ => return Err(DecodeError::UnknownOpcode { opcode, pc }),
    };

    Ok(instruction)
}

/// Encode an instruction to its opcode and operand bytes.
pub fn encode(instr: &Instruction) -> Vec<u8> {
    let opcode = instr.opcode();
    match *instr {
        Instruction::Hlt | Instruction::Ret => vec![opcode],
        Instruction::Ldi { reg, value } => vec![opcode, reg, value],
        Instruction::Prn { reg }
        | Instruction::Push { reg }
        | Instruction::Pop { reg }
        | Instruction::Call { reg } => vec![opcode, reg],
        Instruction::Alu { reg_a, reg_b, .. } => vec![opcode, reg_a, reg_b],
    }
}

/// Encode a sequence of instructions into one contiguous image.
pub fn encode_all(instrs: &[Instruction]) -> Vec<u8> {
    instrs.iter().flat_map(encode).collect()
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown opcode {opcode:#010b} at address {pc}")]
    UnknownOpcode { opcode: u8, pc: usize },

    #[error(transparent)]
    Memory(#[from] MemoryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_table_matches_encoding() {
        assert_eq!(Instruction::Alu { op: AluOp::Add, reg_a: 0, reg_b: 0 }.opcode(), Opcode::ADD);
        assert_eq!(Instruction::Alu { op: AluOp::Mul, reg_a: 0, reg_b: 0 }.opcode(), Opcode::MUL);

        assert_eq!(operand_count(Opcode::HLT), 0);
        assert_eq!(operand_count(Opcode::PRN), 1);
        assert_eq!(operand_count(Opcode::LDI), 2);
        assert!(is_alu(Opcode::MUL));
        assert!(!is_alu(Opcode::LDI));
        assert!(sets_pc(Opcode::CALL));
        assert!(sets_pc(Opcode::RET));
        assert!(!sets_pc(Opcode::PUSH));
    }

    #[test]
    fn test_decode_print8() {
        let code = [0b1000_0010, 0, 8, 0b0100_0111, 0, 0b0000_0001];

        assert_eq!(decode(&code, 0), Ok(Instruction::Ldi { reg: 0, value: 8 }));
        assert_eq!(decode(&code, 3), Ok(Instruction::Prn { reg: 0 }));
        assert_eq!(decode(&code, 5), Ok(Instruction::Hlt));
    }

    #[test]
    fn test_decode_alu() {
        let code = [Opcode::MUL, 0, 1];
        assert_eq!(
            decode(&code, 0),
            Ok(Instruction::Alu { op: AluOp::Mul, reg_a: 0, reg_b: 1 })
        );
    }

    #[test]
    fn test_decode_unlisted_alu_class_byte() {
        // ALU-class layout, but no ADD/MUL: SUB, DIV and friends are not part of this set
        for opcode in [0b1010_0001, 0b1010_0011, 0b1010_1111] {
            assert_eq!(
                decode(&[opcode, 0, 1], 0),
                Err(DecodeError::UnknownOpcode { opcode, pc: 0 })
            );
        }
    }

    #[test]
    fn test_decode_unknown_opcode() {
        for opcode in [0x00, 0xFF, 0b0101_0100] {
            assert_eq!(
                decode(&[opcode], 0),
                Err(DecodeError::UnknownOpcode { opcode, pc: 0 })
            );
        }
    }

    #[test]
    fn test_decode_truncated_operand() {
        let code = [Opcode::LDI, 0];
        assert_eq!(
            decode(&code, 0),
            Err(DecodeError::Memory(MemoryError::OutOfBoundsAddress(2)))
        );
    }

    #[test]
    fn test_width() {
        assert_eq!(Instruction::Hlt.width(), 1);
        assert_eq!(Instruction::Push { reg: 0 }.width(), 2);
        assert_eq!(Instruction::Ldi { reg: 0, value: 0 }.width(), 3);
        assert_eq!(Instruction::Call { reg: 1 }.width(), 2);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let test_cases = [
            Instruction::Hlt,
            Instruction::Ret,
            Instruction::Ldi { reg: 3, value: 0xAB },
            Instruction::Prn { reg: 2 },
            Instruction::Alu { op: AluOp::Add, reg_a: 1, reg_b: 2 },
            Instruction::Push { reg: 4 },
            Instruction::Pop { reg: 5 },
            Instruction::Call { reg: 6 },
        ];

        for instr in test_cases {
            let bytes = encode(&instr);
            assert_eq!(bytes.len(), instr.width() as usize);
            assert_eq!(decode(&bytes, 0), Ok(instr));
        }
    }
}
