//! CPU emulation for the LS-8.
//!
//! This module implements the complete LS-8 architecture:
//! - 256 byte-wide memory cells
//! - 8 registers R0-R7, with R7 serving as the stack pointer
//! - 9-instruction set: load, print, add, multiply, push, pop, call, return, halt

pub mod memory;
pub mod registers;
pub mod alu;
pub mod decode;
pub mod execute;

pub use memory::{Memory, MemoryError};
pub use registers::{Registers, RegisterError};
pub use alu::{AluOp, AluError};
pub use decode::{Instruction, Opcode, DecodeError};
pub use execute::{Cpu, CpuError, CpuState};
