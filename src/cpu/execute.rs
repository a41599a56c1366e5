//! CPU execution engine for the LS-8.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.

use crate::cpu::{Memory, Registers};
use crate::cpu::alu::{self, AluError};
use crate::cpu::decode::{self, Instruction, DecodeError};
use crate::cpu::memory::MemoryError;
use crate::cpu::registers::{RegisterError, SP};
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU has halted (executed HLT instruction).
    Halted,
}

/// The LS-8 CPU.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// CPU registers.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Current execution state.
    pub state: CpuState,
    /// Instruction count (for profiling).
    pub cycles: u64,
    /// Values printed by PRN and not yet taken by the caller.
    output: Vec<u8>,
    /// Last executed instruction (for debugging).
    last_instr: Option<Instruction>,
}

impl Cpu {
    /// Create a new CPU with power-on state.
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            mem: Memory::new(),
            state: CpuState::Running,
            cycles: 0,
            output: Vec::new(),
            last_instr: None,
        }
    }

    /// Reset the CPU to initial state.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.mem.clear();
        self.state = CpuState::Running;
        self.cycles = 0;
        self.output.clear();
        self.last_instr = None;
    }

    /// Load a program image into memory at address 0.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), MemoryError> {
        self.mem.load_program(0, program)?;
        tracing::debug!(bytes = program.len(), "program loaded");
        Ok(())
    }

    /// Execute a single instruction.
    ///
    /// Returns the instruction that was executed, or an error. A failing
    /// instruction leaves registers, memory and PC as they were.
    pub fn step(&mut self) -> Result<Instruction, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }

        // Fetch + decode
        let pc = self.regs.pc;
        let instr = decode::decode(self.mem.as_slice(), pc as usize)?;

        // Work out where the next instruction starts before touching any state
        let next_pc = match instr {
            Instruction::Hlt => None,
            _ if instr.sets_pc() => None,
            _ => Some(self.regs.next_pc(instr.width())?),
        };

        tracing::trace!(pc, ?instr, "execute");

        // Execute
        self.execute(instr)?;
        if let Some(next_pc) = next_pc {
            self.regs.pc = next_pc;
        }

        // Update state
        self.cycles += 1;
        self.last_instr = Some(instr);

        Ok(instr)
    }

    /// Run until halt or error.
    ///
    /// Returns the number of instructions executed.
    pub fn run(&mut self) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;

        while self.state == CpuState::Running {
            self.step()?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Run for at most `max_cycles` instructions.
    pub fn run_limited(&mut self, max_cycles: u64) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;
        let limit = self.cycles.saturating_add(max_cycles);

        while self.state == CpuState::Running && self.cycles < limit {
            self.step()?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Execute a decoded instruction. PC advance is handled by the caller.
    fn execute(&mut self, instr: Instruction) -> Result<(), CpuError> {
        match instr {
            Instruction::Hlt => {
                self.state = CpuState::Halted;
                tracing::debug!(cycles = self.cycles + 1, "halted");
            }

            Instruction::Ldi { reg, value } => {
                self.regs.set(reg, value)?;
            }

            Instruction::Prn { reg } => {
                let value = self.regs.get(reg)?;
                self.output.push(value);
            }

            Instruction::Alu { op, reg_a, reg_b } => {
                alu::apply(&mut self.regs, op, reg_a, reg_b)?;
            }

            // ==================== Stack ====================

            Instruction::Push { reg } => {
                let value = self.regs.get(reg)?;
                self.push(value)?;
            }

            Instruction::Pop { reg } => {
                self.regs.get(reg)?;
                let sp = self.regs.sp();
                let value = self.mem.read(sp as usize)?;
                // R[reg] is written before SP moves, so POP R7 lands on value + 1
                let base = if reg == SP { value } else { sp };
                let new_sp = base
                    .checked_add(1)
                    .ok_or(MemoryError::OutOfBoundsAddress(base as i32 + 1))?;
                self.regs.set(reg, value)?;
                self.regs.set_sp(new_sp);
            }

            // ==================== Control Flow ====================

            Instruction::Call { reg } => {
                self.regs.get(reg)?;
                let next = self.regs.next_pc(instr.width())?;
                let return_addr = u8::try_from(next)
                    .map_err(|_| MemoryError::OutOfBoundsAddress(next as i32))?;
                // The target is read after the push, so CALL R7 jumps to the new SP
                self.push(return_addr)?;
                let target = self.regs.get(reg)?;
                self.regs.jump(target);
            }

            Instruction::Ret => {
                let sp = self.regs.sp();
                let return_addr = self.mem.read(sp as usize)?;
                let new_sp = sp
                    .checked_add(1)
                    .ok_or(MemoryError::OutOfBoundsAddress(sp as i32 + 1))?;
                self.regs.set_sp(new_sp);
                self.regs.jump(return_addr);
            }
        }

        Ok(())
    }

    /// Decrement SP and store `value` at the new top of stack.
    fn push(&mut self, value: u8) -> Result<(), CpuError> {
        let sp = self.regs.sp();
        let new_sp = sp
            .checked_sub(1)
            .ok_or(MemoryError::OutOfBoundsAddress(sp as i32 - 1))?;
        self.mem.write(new_sp as usize, value)?;
        self.regs.set_sp(new_sp);
        Ok(())
    }

    /// Values printed since the last call, in execution order.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    /// Values printed and not yet taken.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// One line of machine state: PC, the three bytes at PC, and R0-R7.
    pub fn trace_line(&self) -> String {
        let pc = self.regs.pc as usize;
        let mut line = format!(
            "TRACE: {:02X} | {:02X} {:02X} {:02X} |",
            pc,
            self.mem.peek(pc),
            self.mem.peek(pc + 1),
            self.mem.peek(pc + 2),
        );
        for value in self.regs.as_slice() {
            line.push_str(&format!(" {:02X}", value));
        }
        line
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("unknown opcode {opcode:#010b} at PC={pc}")]
    UnknownOpcode { opcode: u8, pc: usize },

    #[error("register error: {0}")]
    RegisterError(#[from] RegisterError),

    #[error("memory error: {0}")]
    MemoryError(#[from] MemoryError),

    /// Raised when the ALU is driven by a raw operation tag it does not know.
    #[error("ALU error: {0}")]
    AluError(#[from] AluError),
}

impl From<DecodeError> for CpuError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::UnknownOpcode { opcode, pc } => CpuError::UnknownOpcode { opcode, pc },
            DecodeError::Memory(e) => CpuError::MemoryError(e),
        }
    }
}
