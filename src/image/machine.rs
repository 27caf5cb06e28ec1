//! Machine-code view.
//!
//! Renders memory words as the 16-bit patterns printed on the reference card:
//!
//! ```text
//! memory reference:   I | opcode (4) | address (11)
//! register reference: 0111 1 + one-hot operation bit
//! input/output:       1111 1 + one-hot operation bit
//! ```
//!
//! Data words show their value; blank slots show zero. DIV and CMP have no
//! assigned pattern, so they (and text that does not decode) have no
//! encoding.

use crate::cpu::decode::{self, AddrMode, Opcode, Operand};
use crate::word::Word;

const ADDRESS_MASK: u16 = 0x07FF;

/// 4-bit opcode field of memory-reference instructions.
fn memory_opcode(opcode: Opcode) -> Option<u16> {
    let code = match opcode {
        Opcode::Lda => 0b0000,
        Opcode::Str => 0b0001,
        Opcode::Jmp => 0b0010,
        Opcode::Jze => 0b0011,
        Opcode::Jsa => 0b0100,
        Opcode::And => 0b0101,
        Opcode::Or => 0b0110,
        Opcode::Xor => 0b0111,
        Opcode::Add => 0b1000,
        Opcode::Sub => 0b1001,
        Opcode::Mul => 0b1010,
        Opcode::Inc => 0b1011,
        Opcode::Dec => 0b1100,
        _ => return None,
    };
    Some(code)
}

/// Fixed pattern of register-reference and I/O instructions.
fn fixed_pattern(opcode: Opcode) -> Option<u16> {
    let pattern = match opcode {
        Opcode::Clr => 0b0111_1100_0000_0000,
        Opcode::Cre => 0b0111_1010_0000_0000,
        Opcode::Cta => 0b0111_1001_0000_0000,
        Opcode::Cte => 0b0111_1000_1000_0000,
        Opcode::Skz => 0b0111_1000_0100_0000,
        Opcode::Ina => 0b0111_1000_0010_0000,
        Opcode::Skp => 0b0111_1000_0001_0000,
        Opcode::Skn => 0b0111_1000_0000_1000,
        Opcode::Cra => 0b0111_1000_0000_0100,
        Opcode::Cla => 0b0111_1000_0000_0010,
        Opcode::Hal => 0b0111_1000_0000_0001,

        Opcode::Inp => 0b1111_1100_0000_0000,
        Opcode::Out => 0b1111_1010_0000_0000,
        Opcode::Sfi => 0b1111_1001_0000_0000,
        Opcode::Sfo => 0b1111_1000_1000_0000,
        Opcode::Put => 0b1111_1000_0100_0000,
        Opcode::Opt => 0b1111_1000_0010_0000,
        Opcode::Spi => 0b1111_1000_0001_0000,
        Opcode::Spo => 0b1111_1000_0000_1000,
        Opcode::Sie => 0b1111_1000_0000_0100,
        _ => return None,
    };
    Some(pattern)
}

/// Encode a memory word to its 16-bit machine form.
pub fn encode(word: &Word) -> Option<u16> {
    let text = match word {
        Word::Empty => return Some(0),
        Word::Data(value) => return Some(*value),
        Word::Code(text) => text,
    };

    let instr = decode::parse(text).ok()?;
    if let Some(code) = memory_opcode(instr.opcode) {
        let (addr, indirect) = match instr.operand {
            Operand::Address { addr, mode } => (addr, mode == AddrMode::Indirect),
            _ => (0, false),
        };
        // Addresses must fit the 11-bit field
        let addr = u16::try_from(addr).ok().filter(|&a| a <= ADDRESS_MASK)?;
        return Some(u16::from(indirect) << 15 | code << 11 | addr);
    }

    // INP's literal is not part of the pattern
    fixed_pattern(instr.opcode)
}

/// Encode a word as a 16-character binary string.
///
/// Words without an encoding render as `?`s.
pub fn format_binary(word: &Word) -> String {
    match encode(word) {
        Some(bits) => format!("{:016b}", bits),
        None => "?".repeat(16),
    }
}
