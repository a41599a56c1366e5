//! # LS-8 Emulator
//!
//! An emulator for the LS-8, a minimal 8-bit von Neumann machine.
//!
//! Programs are byte images loaded at address 0 and executed by a
//! fetch-decode-execute loop over 256 bytes of memory, eight registers
//! and a descending stack shared by PUSH/POP and CALL/RET.

pub mod cpu;
pub mod asm;

#[cfg(feature = "tui")]
pub mod tui;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use cpu::{Cpu, CpuState, CpuError, Memory, Registers, Instruction, AluOp};
pub use asm::{assemble, disassemble, AssemblerError, ProgramImage, ImageError, load_image, parse_image, save_image};

#[cfg(feature = "tui")]
pub use tui::run_debugger;

#[cfg(test)]
mod tests {
    use super::*;

    fn run_to_halt(program: &[u8]) -> Vec<u8> {
        let mut cpu = Cpu::new();
        cpu.load_program(program).unwrap();
        cpu.run().unwrap();
        assert!(cpu.is_halted());
        cpu.take_output()
    }

    #[test]
    fn test_demo_images() {
        let print8 = parse_image(include_str!("../demos/print8.ls8")).unwrap();
        assert_eq!(run_to_halt(&print8.bytes), vec![8]);

        let mult = parse_image(include_str!("../demos/mult.ls8")).unwrap();
        assert_eq!(run_to_halt(&mult.bytes), vec![72]);
    }

    #[test]
    fn test_demo_sources() {
        let stack = assemble(include_str!("../demos/stack.asm")).unwrap();
        assert_eq!(run_to_halt(&stack), vec![2, 4, 1]);

        let call = assemble(include_str!("../demos/call.asm")).unwrap();
        assert_eq!(run_to_halt(&call), vec![20, 30, 36, 60]);
    }

    #[test]
    fn test_assembled_demo_matches_image() {
        let image = parse_image(include_str!("../demos/mult.ls8")).unwrap();
        let source = disassemble(&image.bytes)
            .lines()
            .filter_map(|line| line.split_once(": ").map(|(_, rest)| rest.to_string()))
            .collect::<Vec<_>>()
            .join("\n");

        assert_eq!(assemble(&source).unwrap(), image.bytes);
    }
}
