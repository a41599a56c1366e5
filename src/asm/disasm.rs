//! Disassembler for LS-8 programs.
//!
//! Converts program bytes back to readable assembly.

use crate::cpu::decode::{decode, Instruction};

/// Disassemble the instruction at the start of `bytes`.
pub fn disassemble_instruction(bytes: &[u8]) -> String {
    disassemble_at(bytes, 0).0
}

/// Disassemble the instruction at `addr`, returning its text and width.
///
/// Bytes that do not decode are rendered as a one-byte `DB` directive.
pub fn disassemble_at(code: &[u8], addr: usize) -> (String, usize) {
    match decode(code, addr) {
        Ok(decoded) => (format_instruction(&decoded), decoded.width() as usize),
        Err(_) => (format!("DB {:#010b}", code.get(addr).copied().unwrap_or(0)), 1),
    }
}

/// Walk `code` instruction by instruction: `(address, width, text)`.
pub fn listing(code: &[u8]) -> Vec<(usize, usize, String)> {
    let mut lines = Vec::new();
    let mut addr = 0;

    while addr < code.len() {
        let (text, width) = disassemble_at(code, addr);
        lines.push((addr, width, text));
        addr += width;
    }

    lines
}

/// Disassemble a whole program.
pub fn disassemble(code: &[u8]) -> String {
    let mut output = String::new();
    output.push_str("; LS-8 Disassembly\n");
    output.push_str("; ----------------\n\n");

    for (addr, width, text) in listing(code) {
        let raw: Vec<String> = code[addr..addr + width]
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect();
        output.push_str(&format!("{:03}: {:<12}; {}\n", addr, text, raw.join(" ")));
    }

    output
}

/// Format a decoded instruction as assembly text.
pub fn format_instruction(instr: &Instruction) -> String {
    match instr {
        Instruction::Hlt | Instruction::Ret => instr.mnemonic().to_string(),
        Instruction::Ldi { reg, value } => format!("LDI R{},{}", reg, value),
        Instruction::Alu { op, reg_a, reg_b } => format!("{} R{},R{}", op, reg_a, reg_b),
        Instruction::Prn { reg }
        | Instruction::Push { reg }
        | Instruction::Pop { reg }
        | Instruction::Call { reg } => format!("{} R{}", instr.mnemonic(), reg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::AluOp;
    use crate::cpu::decode::encode;

    #[test]
    fn test_disassemble_hlt() {
        let hlt = encode(&Instruction::Hlt);
        assert_eq!(disassemble_instruction(&hlt), "HLT");
    }

    #[test]
    fn test_disassemble_mul() {
        let mul = encode(&Instruction::Alu { op: AluOp::Mul, reg_a: 0, reg_b: 1 });
        assert_eq!(disassemble_instruction(&mul), "MUL R0,R1");
    }

    #[test]
    fn test_disassemble_unknown_byte() {
        assert_eq!(disassemble_instruction(&[0xFF]), "DB 0b11111111");
    }

    #[test]
    fn test_listing_walks_widths() {
        let code = [0b1000_0010, 0, 8, 0b0100_0111, 0, 0b0000_0001];
        let lines = listing(&code);

        assert_eq!(lines, vec![
            (0, 3, "LDI R0,8".to_string()),
            (3, 2, "PRN R0".to_string()),
            (5, 1, "HLT".to_string()),
        ]);
    }

    #[test]
    fn test_truncated_instruction_is_data() {
        // LDI with its immediate missing
        let lines = listing(&[0b1000_0010, 0]);
        assert_eq!(lines[0], (0, 1, "DB 0b10000010".to_string()));
        assert_eq!(lines[1], (1, 1, "DB 0b00000000".to_string()));
    }

    #[test]
    fn test_disassemble_program() {
        let code = [0b0101_0000, 1, 0b0001_0001];
        let text = disassemble(&code);

        assert!(text.contains("000: CALL R1"));
        assert!(text.contains("; 50 01"));
        assert!(text.contains("002: RET"));
    }
}
