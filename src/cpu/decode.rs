//! Instruction decoder.
//!
//! Instructions are stored as text: a mnemonic, an optional `I` marker for
//! indirect addressing, and an optional operand.
//!
//! ```text
//! HAL          ; register-reference, no operand
//! LDA 5        ; memory-reference, direct
//! JMP I 12     ; memory-reference, indirect through slot 12
//! INP 7        ; I/O with an immediate literal
//! ```

use std::fmt;
use crate::word::Word;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Instruction class, as printed on the operator's reference card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpClass {
    /// Operates on a memory word through the address register.
    MemoryReference,
    /// Operates on AC/E only.
    RegisterReference,
    /// Talks to the I/O device.
    InputOutput,
}

/// What kind of operand a mnemonic takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OperandKind {
    /// Memory address, direct or indirect.
    Address,
    /// Literal value, direct only.
    Literal,
    /// Literal value or nothing.
    OptionalLiteral,
    /// No operand.
    None,
}

/// The 35 opcodes of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    // ==================== Memory reference ====================

    /// AC := M[AR]
    Lda,
    /// M[AR] := AC
    Str,
    /// PC := AR
    Jmp,
    /// if AC = 0 then PC := AR
    Jze,
    /// M[AR] := return address, PC := AR
    Jsa,
    /// AC := AC & M[AR]
    And,
    /// AC := AC | M[AR]
    Or,
    /// AC := AC ^ M[AR]
    Xor,
    /// AC := AC + M[AR], E on carry
    Add,
    /// AC := AC - M[AR]
    Sub,
    /// AC := AC * M[AR], E := 1
    Mul,
    /// AC := AC / M[AR]
    Div,
    /// M[AR] := M[AR] + 1, skip on zero
    Inc,
    /// M[AR] := M[AR] - 1, skip on zero
    Dec,
    /// Compare AC with a literal
    Cmp,

    // ==================== Register reference ====================

    /// AC := 0
    Clr,
    /// E := 0
    Cre,
    /// AC := !AC
    Cta,
    /// E := !E
    Cte,
    /// Skip if AC = 0
    Skz,
    /// AC := AC + 1, E on carry
    Ina,
    /// Skip if AC > 0
    Skp,
    /// Skip if AC < 0
    Skn,
    /// Rotate AC right
    Cra,
    /// Rotate AC left
    Cla,
    /// Halt
    Hal,

    // ==================== Input/output ====================

    /// AC := AC + input
    Inp,
    /// Output AC
    Out,
    Sfi,
    Sfo,
    Put,
    Opt,
    Spi,
    Spo,
    Sie,
}

impl Opcode {
    /// Every opcode, in reference-card order.
    pub const ALL: [Opcode; 35] = [
        Opcode::Lda, Opcode::Str, Opcode::Jmp, Opcode::Jze, Opcode::Jsa,
        Opcode::And, Opcode::Or, Opcode::Xor, Opcode::Add, Opcode::Sub,
        Opcode::Mul, Opcode::Div, Opcode::Inc, Opcode::Dec, Opcode::Cmp,
        Opcode::Clr, Opcode::Cre, Opcode::Cta, Opcode::Cte, Opcode::Skz,
        Opcode::Ina, Opcode::Skp, Opcode::Skn, Opcode::Cra, Opcode::Cla,
        Opcode::Hal, Opcode::Inp, Opcode::Out, Opcode::Sfi, Opcode::Sfo,
        Opcode::Put, Opcode::Opt, Opcode::Spi, Opcode::Spo, Opcode::Sie,
    ];

    /// The assembly mnemonic.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Lda => "LDA",
            Opcode::Str => "STR",
            Opcode::Jmp => "JMP",
            Opcode::Jze => "JZE",
            Opcode::Jsa => "JSA",
            Opcode::And => "AND",
            Opcode::Or => "OR",
            Opcode::Xor => "XOR",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Inc => "INC",
            Opcode::Dec => "DEC",
            Opcode::Cmp => "CMP",
            Opcode::Clr => "CLR",
            Opcode::Cre => "CRE",
            Opcode::Cta => "CTA",
            Opcode::Cte => "CTE",
            Opcode::Skz => "SKZ",
            Opcode::Ina => "INA",
            Opcode::Skp => "SKP",
            Opcode::Skn => "SKN",
            Opcode::Cra => "CRA",
            Opcode::Cla => "CLA",
            Opcode::Hal => "HAL",
            Opcode::Inp => "INP",
            Opcode::Out => "OUT",
            Opcode::Sfi => "SFI",
            Opcode::Sfo => "SFO",
            Opcode::Put => "PUT",
            Opcode::Opt => "OPT",
            Opcode::Spi => "SPI",
            Opcode::Spo => "SPO",
            Opcode::Sie => "SIE",
        }
    }

    /// Look up a mnemonic, ignoring case.
    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.mnemonic().eq_ignore_ascii_case(mnemonic))
    }

    /// The instruction class.
    pub const fn class(self) -> OpClass {
        match self {
            Opcode::Lda | Opcode::Str | Opcode::Jmp | Opcode::Jze | Opcode::Jsa
            | Opcode::And | Opcode::Or | Opcode::Xor | Opcode::Add | Opcode::Sub
            | Opcode::Mul | Opcode::Div | Opcode::Inc | Opcode::Dec | Opcode::Cmp => {
                OpClass::MemoryReference
            }
            Opcode::Clr | Opcode::Cre | Opcode::Cta | Opcode::Cte | Opcode::Skz
            | Opcode::Ina | Opcode::Skp | Opcode::Skn | Opcode::Cra | Opcode::Cla
            | Opcode::Hal => OpClass::RegisterReference,
            Opcode::Inp | Opcode::Out | Opcode::Sfi | Opcode::Sfo | Opcode::Put
            | Opcode::Opt | Opcode::Spi | Opcode::Spo | Opcode::Sie => OpClass::InputOutput,
        }
    }

    fn operand_kind(self) -> OperandKind {
        match self {
            Opcode::Cmp => OperandKind::Literal,
            Opcode::Inp => OperandKind::OptionalLiteral,
            op if op.class() == OpClass::MemoryReference => OperandKind::Address,
            _ => OperandKind::None,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Addressing mode of a memory operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddrMode {
    /// The operand is the effective address.
    Direct,
    /// The operand names a slot holding the effective address.
    Indirect,
}

/// A decoded operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    /// Register-reference and most I/O instructions.
    None,
    /// A memory address.
    /// Kept as written; range is checked when the address is resolved.
    Address { addr: i64, mode: AddrMode },
    /// An immediate value (CMP, INP).
    Literal(i32),
}

/// A decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operand: Operand,
}

impl Instruction {
    /// Instruction without an operand.
    pub const fn implied(opcode: Opcode) -> Self {
        Self { opcode, operand: Operand::None }
    }

    /// Memory-reference instruction, direct mode.
    pub const fn direct(opcode: Opcode, addr: i64) -> Self {
        Self { opcode, operand: Operand::Address { addr, mode: AddrMode::Direct } }
    }

    /// Memory-reference instruction, indirect mode.
    pub const fn indirect(opcode: Opcode, addr: i64) -> Self {
        Self { opcode, operand: Operand::Address { addr, mode: AddrMode::Indirect } }
    }

    /// Addressing mode, if the operand is an address.
    pub fn addressing_mode(&self) -> Option<AddrMode> {
        match self.operand {
            Operand::Address { mode, .. } => Some(mode),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operand {
            Operand::None => write!(f, "{}", self.opcode),
            Operand::Address { addr, mode: AddrMode::Direct } => write!(f, "{} {}", self.opcode, addr),
            Operand::Address { addr, mode: AddrMode::Indirect } => write!(f, "{} I {}", self.opcode, addr),
            Operand::Literal(value) => write!(f, "{} {}", self.opcode, value),
        }
    }
}

/// Decode a memory word.
///
/// Blank slots and data are not instructions; the engine skips them before
/// ever calling this.
pub fn decode(word: &Word) -> Result<Instruction, DecodeError> {
    match word {
        Word::Code(text) => parse(text),
        _ => Err(DecodeError::NotAnInstruction),
    }
}

/// Parse instruction text.
///
/// Three shapes are legal: `MNEMONIC`, `MNEMONIC operand` and
/// `MNEMONIC I operand`. The operand must also suit the mnemonic.
pub fn parse(text: &str) -> Result<Instruction, DecodeError> {
    let tokens: Vec<&str> = text.split_whitespace().collect();

    let (mnemonic, mode, operand) = match tokens.as_slice() {
        [mnemonic] => (*mnemonic, AddrMode::Direct, None),
        [mnemonic, operand] => (*mnemonic, AddrMode::Direct, Some(*operand)),
        [mnemonic, marker, operand] => {
            if !marker.eq_ignore_ascii_case("I") {
                return Err(malformed(text, "expected `I` between mnemonic and operand"));
            }
            (*mnemonic, AddrMode::Indirect, Some(*operand))
        }
        [] => return Err(malformed(text, "empty instruction")),
        _ => return Err(malformed(text, "too many tokens")),
    };

    let opcode = Opcode::from_mnemonic(mnemonic)
        .ok_or_else(|| DecodeError::UnknownMnemonic(mnemonic.to_string()))?;

    let operand = match (opcode.operand_kind(), operand) {
        (OperandKind::Address, Some(op)) => {
            let addr = op
                .parse::<i64>()
                .map_err(|_| malformed(text, "operand is not an address"))?;
            Operand::Address { addr, mode }
        }
        (OperandKind::Address, None) => {
            return Err(malformed(text, "missing operand address"));
        }
        (OperandKind::Literal | OperandKind::OptionalLiteral, Some(op)) => {
            if mode == AddrMode::Indirect {
                return Err(malformed(text, "literal operand cannot be indirect"));
            }
            let value = op
                .parse::<i32>()
                .map_err(|_| malformed(text, "operand is not a number"))?;
            Operand::Literal(value)
        }
        (OperandKind::Literal, None) => {
            return Err(malformed(text, "missing literal operand"));
        }
        (OperandKind::OptionalLiteral | OperandKind::None, None) => Operand::None,
        (OperandKind::None, Some(_)) => {
            return Err(malformed(text, "instruction takes no operand"));
        }
    };

    Ok(Instruction { opcode, operand })
}

fn malformed(text: &str, reason: &'static str) -> DecodeError {
    DecodeError::MalformedInstruction {
        text: text.to_string(),
        reason,
    }
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown mnemonic: {0}")]
    UnknownMnemonic(String),

    #[error("malformed instruction `{text}`: {reason}")]
    MalformedInstruction { text: String, reason: &'static str },

    #[error("slot does not hold an instruction")]
    NotAnInstruction,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_table() {
        assert_eq!(Opcode::ALL.len(), 35);
        for op in Opcode::ALL {
            assert_eq!(Opcode::from_mnemonic(op.mnemonic()), Some(op));
        }
        assert_eq!(Opcode::from_mnemonic("lda"), Some(Opcode::Lda));
        assert_eq!(Opcode::from_mnemonic("CPA"), None);
    }

    #[test]
    fn test_class_counts() {
        let count = |class| Opcode::ALL.iter().filter(|op| op.class() == class).count();
        assert_eq!(count(OpClass::MemoryReference), 15);
        assert_eq!(count(OpClass::RegisterReference), 11);
        assert_eq!(count(OpClass::InputOutput), 9);
    }

    #[test]
    fn test_parse_shapes() {
        assert_eq!(parse("HAL").unwrap(), Instruction::implied(Opcode::Hal));
        assert_eq!(parse("LDA 5").unwrap(), Instruction::direct(Opcode::Lda, 5));
        assert_eq!(parse("JMP I 12").unwrap(), Instruction::indirect(Opcode::Jmp, 12));
        assert_eq!(
            parse("CMP 7").unwrap(),
            Instruction { opcode: Opcode::Cmp, operand: Operand::Literal(7) }
        );
        assert_eq!(parse("INP").unwrap(), Instruction::implied(Opcode::Inp));
    }

    #[test]
    fn test_addressing_mode() {
        assert_eq!(parse("ADD 3").unwrap().addressing_mode(), Some(AddrMode::Direct));
        assert_eq!(parse("ADD I 3").unwrap().addressing_mode(), Some(AddrMode::Indirect));
        assert_eq!(parse("CLR").unwrap().addressing_mode(), None);
    }

    #[test]
    fn test_unknown_mnemonic() {
        assert_eq!(parse("FOO 3"), Err(DecodeError::UnknownMnemonic("FOO".into())));
    }

    #[test]
    fn test_malformed() {
        for text in ["LDA I 3 4", "LDA X 3", "LDA", "LDA abc", "HAL 3", "CMP", "CMP I 3", "LDA 1.5"] {
            assert!(
                matches!(parse(text), Err(DecodeError::MalformedInstruction { .. })),
                "{text} should be malformed"
            );
        }
    }

    #[test]
    fn test_numeric_address_is_not_range_checked() {
        // Out-of-range numbers decode; resolving the address rejects them
        assert_eq!(parse("LDA -1").unwrap(), Instruction::direct(Opcode::Lda, -1));
        assert_eq!(parse("JMP 99999").unwrap(), Instruction::direct(Opcode::Jmp, 99999));
        assert_eq!(parse("ADD I 70000").unwrap(), Instruction::indirect(Opcode::Add, 70000));
    }

    #[test]
    fn test_decode_rejects_data() {
        assert_eq!(decode(&Word::Empty), Err(DecodeError::NotAnInstruction));
        assert_eq!(decode(&Word::Data(3)), Err(DecodeError::NotAnInstruction));
        assert!(decode(&Word::parse("SKZ")).is_ok());
    }

    #[test]
    fn test_display_matches_source_text() {
        for text in ["LDA 5", "JMP I 12", "HAL", "INP 7", "CMP -2"] {
            assert_eq!(parse(text).unwrap().to_string(), text);
        }
    }
}
