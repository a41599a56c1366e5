//! Simple assembler for LS-8 programs.
//!
//! Syntax:
//! ```text
//! ; Comment (`#` works too)
//! MAIN:               ; Define a label
//!     LDI R0,8        ; Load immediate
//!     LDI R1,PRINT    ; Labels can be used as immediates
//!     CALL R1         ; Call subroutine at R1
//!     HLT             ; Halt
//! PRINT:
//!     PRN R0
//!     RET
//!     DB 0x2A         ; Define a raw byte
//! ```

use crate::cpu::AluOp;
use crate::cpu::decode::{Instruction, encode};
use crate::cpu::registers::REGISTER_COUNT;
use std::collections::HashMap;
use thiserror::Error;

/// Assemble source code to program bytes.
pub fn assemble(source: &str) -> Result<Vec<u8>, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// The assembler state.
struct Assembler {
    /// Symbol table (label -> address).
    symbols: HashMap<String, usize>,
    /// Pending references: (output_index, label, source_line).
    pending: Vec<(usize, String, usize)>,
    /// Output bytes. The index of a byte is its load address.
    output: Vec<u8>,
}

/// An immediate operand: either known now or a label resolved in pass 2.
enum Immediate {
    Value(u8),
    Label(String),
}

impl Assembler {
    fn new() -> Self {
        Self {
            symbols: HashMap::new(),
            pending: Vec::new(),
            output: Vec::new(),
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Vec<u8>, AssemblerError> {
        // Pass 1: Collect labels and generate code
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }

        // Pass 2: Resolve forward references
        self.resolve_references()?;

        Ok(std::mem::take(&mut self.output))
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        // Remove comments
        let line = line
            .split(|c: char| c == ';' || c == '#')
            .next()
            .unwrap_or("")
            .trim();

        if line.is_empty() {
            return Ok(());
        }

        // Check for label definition
        if let Some(colon_idx) = line.find(':') {
            let label = line[..colon_idx].trim().to_uppercase();
            if label.is_empty() || label.contains(char::is_whitespace) {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("invalid label {:?}", &line[..colon_idx]),
                });
            }
            if self.symbols.insert(label.clone(), self.output.len()).is_some() {
                return Err(AssemblerError::DuplicateLabel { line: line_num, label });
            }

            // Process rest of line if any
            let rest = line[colon_idx + 1..].trim();
            if !rest.is_empty() {
                return self.process_instruction(rest, line_num);
            }
            return Ok(());
        }

        self.process_instruction(line, line_num)
    }

    fn process_instruction(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let (mnemonic, rest) = match line.split_once(char::is_whitespace) {
            Some((mnemonic, rest)) => (mnemonic, rest.trim()),
            None => (line, ""),
        };
        let mnemonic = mnemonic.to_uppercase();
        let operands: Vec<&str> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split(',').map(str::trim).collect()
        };

        let operand_count = |count: usize| {
            if operands.len() == count {
                Ok(())
            } else {
                Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("{} takes {} operand(s), found {}", mnemonic, count, operands.len()),
                })
            }
        };

        let instr = match mnemonic.as_str() {
            // Directives
            "DB" => {
                operand_count(1)?;
                let value = self.parse_immediate(operands[0], line_num)?;
                let at = self.output.len();
                self.output.push(0);
                self.place(at, value, line_num);
                return Ok(());
            }

            "HLT" => {
                operand_count(0)?;
                Instruction::Hlt
            }
            "RET" => {
                operand_count(0)?;
                Instruction::Ret
            }

            "LDI" => {
                operand_count(2)?;
                let reg = parse_register(operands[0], line_num)?;
                let value = self.parse_immediate(operands[1], line_num)?;
                let at = self.output.len() + 2;
                self.emit(&Instruction::Ldi { reg, value: 0 });
                self.place(at, value, line_num);
                return Ok(());
            }

            "ADD" | "MUL" => {
                operand_count(2)?;
                let op = if mnemonic == "ADD" { AluOp::Add } else { AluOp::Mul };
                Instruction::Alu {
                    op,
                    reg_a: parse_register(operands[0], line_num)?,
                    reg_b: parse_register(operands[1], line_num)?,
                }
            }

            "PRN" | "PUSH" | "POP" | "CALL" => {
                operand_count(1)?;
                let reg = parse_register(operands[0], line_num)?;
                match mnemonic.as_str() {
                    "PRN" => Instruction::Prn { reg },
                    "PUSH" => Instruction::Push { reg },
                    "POP" => Instruction::Pop { reg },
                    _ => Instruction::Call { reg },
                }
            }

            _ => return Err(AssemblerError::UnknownMnemonic {
                line: line_num,
                mnemonic: mnemonic.clone(),
            }),
        };

        self.emit(&instr);
        Ok(())
    }

    fn parse_immediate(&self, operand: &str, line_num: usize) -> Result<Immediate, AssemblerError> {
        let parsed = if let Some(hex) = operand.strip_prefix("0x").or_else(|| operand.strip_prefix("0X")) {
            i64::from_str_radix(hex, 16)
        } else if let Some(bin) = operand.strip_prefix("0b").or_else(|| operand.strip_prefix("0B")) {
            i64::from_str_radix(bin, 2)
        } else if operand.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
            operand.parse::<i64>()
        } else {
            // Must be a label reference - resolved in pass 2
            if operand.is_empty() || operand.contains(char::is_whitespace) {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("invalid operand {:?}", operand),
                });
            }
            return Ok(Immediate::Label(operand.to_uppercase()));
        };

        let value = parsed.map_err(|_| AssemblerError::SyntaxError {
            line: line_num,
            message: format!("invalid number {:?}", operand),
        })?;

        u8::try_from(value)
            .map(Immediate::Value)
            .map_err(|_| AssemblerError::ValueOutOfRange { line: line_num, value })
    }

    /// Fill in the byte at `at`, now or once the label is known.
    fn place(&mut self, at: usize, value: Immediate, line_num: usize) {
        match value {
            Immediate::Value(byte) => self.output[at] = byte,
            Immediate::Label(label) => self.pending.push((at, label, line_num)),
        }
    }

    fn emit(&mut self, instr: &Instruction) {
        self.output.extend(encode(instr));
    }

    fn resolve_references(&mut self) -> Result<(), AssemblerError> {
        for (out_idx, label, line_num) in &self.pending {
            let addr = *self.symbols.get(label)
                .ok_or_else(|| AssemblerError::UndefinedLabel {
                    line: *line_num,
                    label: label.clone(),
                })?;

            self.output[*out_idx] = u8::try_from(addr)
                .map_err(|_| AssemblerError::ValueOutOfRange { line: *line_num, value: addr as i64 })?;
        }
        Ok(())
    }
}

/// Parse a register operand `R0`-`R7` (case-insensitive). `SP` names R7.
fn parse_register(operand: &str, line_num: usize) -> Result<u8, AssemblerError> {
    let upper = operand.to_uppercase();
    let index = if upper == "SP" {
        Some(7)
    } else {
        upper.strip_prefix('R').and_then(|n| n.parse::<u8>().ok())
    };

    index
        .filter(|&i| (i as usize) < REGISTER_COUNT)
        .ok_or_else(|| AssemblerError::InvalidRegister {
            line: line_num,
            operand: operand.to_string(),
        })
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("duplicate label on line {line}: {label}")]
    DuplicateLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: i64 },

    #[error("invalid register on line {line}: {operand}")]
    InvalidRegister { line: usize, operand: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::Cpu;

    #[test]
    fn test_assemble_print8() {
        let source = r#"
            ; print8: print the number 8
            LDI R0,8
            PRN R0
            HLT
        "#;

        let result = assemble(source).unwrap();
        assert_eq!(result, vec![0b1000_0010, 0, 8, 0b0100_0111, 0, 0b0000_0001]);
    }

    #[test]
    fn test_assemble_mult() {
        let source = "LDI R0, 8\nLDI R1, 9\nMUL R0, R1\nPRN R0\nHLT\n";

        let program = assemble(source).unwrap();
        let mut cpu = Cpu::new();
        cpu.load_program(&program).unwrap();
        cpu.run().unwrap();

        assert_eq!(cpu.take_output(), vec![72]);
    }

    #[test]
    fn test_assemble_with_labels() {
        let source = r#"
        MAIN:
            LDI R1,DOUBLE   # forward reference
            LDI R0,21
            CALL R1
            PRN R0
            HLT
        DOUBLE: ADD R0,R0
            RET
        "#;

        let program = assemble(source).unwrap();
        // LDI(3) LDI(3) CALL(2) PRN(2) HLT(1) -> DOUBLE at 11
        assert_eq!(program[2], 11);

        let mut cpu = Cpu::new();
        cpu.load_program(&program).unwrap();
        cpu.run().unwrap();
        assert_eq!(cpu.take_output(), vec![42]);
        assert_eq!(cpu.regs.sp(), 0xF4);
    }

    #[test]
    fn test_assemble_data() {
        let source = r#"
            DB 42
            DB 0xFF
            DB 0b1010
            DB END
        END:
        "#;

        let result = assemble(source).unwrap();
        assert_eq!(result, vec![42, 0xFF, 0b1010, 4]);
    }

    #[test]
    fn test_stack_pointer_alias() {
        assert_eq!(assemble("PUSH SP").unwrap(), vec![0b0100_0101, 7]);
    }

    #[test]
    fn test_unknown_mnemonic() {
        let err = assemble("HLT\nJMP R0\n").unwrap_err();
        assert_eq!(err, AssemblerError::UnknownMnemonic { line: 2, mnemonic: "JMP".into() });
    }

    #[test]
    fn test_invalid_register() {
        let err = assemble("PRN R8").unwrap_err();
        assert!(matches!(err, AssemblerError::InvalidRegister { line: 1, .. }));
    }

    #[test]
    fn test_value_out_of_range() {
        let err = assemble("LDI R0,256").unwrap_err();
        assert_eq!(err, AssemblerError::ValueOutOfRange { line: 1, value: 256 });
    }

    #[test]
    fn test_undefined_label() {
        let err = assemble("LDI R0,NOWHERE\nHLT").unwrap_err();
        assert_eq!(err, AssemblerError::UndefinedLabel { line: 1, label: "NOWHERE".into() });
    }

    #[test]
    fn test_duplicate_label() {
        let err = assemble("A:\nHLT\nA:\n").unwrap_err();
        assert_eq!(err, AssemblerError::DuplicateLabel { line: 3, label: "A".into() });
    }

    #[test]
    fn test_operand_count() {
        assert!(matches!(assemble("ADD R0"), Err(AssemblerError::SyntaxError { line: 1, .. })));
        assert!(matches!(assemble("HLT R0"), Err(AssemblerError::SyntaxError { line: 1, .. })));
    }
}
