//! Assembler, disassembler and program image I/O for LS-8 programs.
//!
//! This module provides:
//! - A simple two-pass assembler (text → program bytes)
//! - A disassembler (program bytes → readable text)
//! - The `.ls8` program image format (one binary byte per line)

pub mod assembler;
pub mod disasm;
pub mod image;

pub use assembler::{assemble, AssemblerError};
pub use disasm::disassemble;
pub use image::{ProgramImage, ImageError, load_image, parse_image, save_image};
