//! Memory words.
//!
//! A memory slot holds one of three things:
//! - nothing at all (a blank slot),
//! - a decimal data literal, kept as a 16-bit value,
//! - an assembly-style instruction such as `LDA 5` or `JMP I 12`.
//!
//! Instructions are kept as text and only decoded when fetched, the way an
//! operator would type them into the memory panel.

use std::fmt;
use serde::{Serialize, Deserialize};

/// Modulus of the 16-bit word width.
pub const WORD_MODULUS: i64 = 1 << 16;

/// The contents of a single memory slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Word {
    /// Blank slot. Reads as zero, skipped by fetch.
    #[default]
    Empty,
    /// A data value.
    Data(u16),
    /// Instruction text, trimmed.
    Code(String),
}

impl Word {
    /// Create a data word.
    #[inline]
    pub const fn data(value: u16) -> Self {
        Word::Data(value)
    }

    /// Parse the text of a memory slot.
    ///
    /// Blank text is [`Word::Empty`]. An integer literal (optionally signed)
    /// becomes [`Word::Data`], reduced modulo 2^16 so that `-1` is stored as
    /// `65535`. Anything else is kept verbatim as [`Word::Code`].
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() {
            return Word::Empty;
        }

        match parse_literal(text) {
            Some(value) => Word::Data(value),
            None => Word::Code(text.to_string()),
        }
    }

    /// Is this a blank slot?
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, Word::Empty)
    }

    /// Does this slot hold something fetch would execute?
    #[inline]
    pub fn is_code(&self) -> bool {
        matches!(self, Word::Code(_))
    }

    /// The instruction text, if any.
    pub fn as_code(&self) -> Option<&str> {
        match self {
            Word::Code(text) => Some(text),
            _ => None,
        }
    }
}

/// Parse a signed decimal literal and wrap it into 16 bits.
fn parse_literal(text: &str) -> Option<u16> {
    let digits = text.strip_prefix(['-', '+']).unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: i64 = text.parse().ok()?;
    Some(value.rem_euclid(WORD_MODULUS) as u16)
}

impl From<&str> for Word {
    fn from(text: &str) -> Self {
        Word::parse(text)
    }
}

impl From<u16> for Word {
    fn from(value: u16) -> Self {
        Word::Data(value)
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Word::Empty => Ok(()),
            Word::Data(value) => write!(f, "{}", value),
            Word::Code(text) => f.write_str(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shapes() {
        assert_eq!(Word::parse(""), Word::Empty);
        assert_eq!(Word::parse("   "), Word::Empty);
        assert_eq!(Word::parse("42"), Word::Data(42));
        assert_eq!(Word::parse(" 7 "), Word::Data(7));
        assert_eq!(Word::parse("LDA 5"), Word::Code("LDA 5".into()));
        assert_eq!(Word::parse("  JMP I 3 "), Word::Code("JMP I 3".into()));
    }

    #[test]
    fn test_literals_wrap_to_16_bits() {
        assert_eq!(Word::parse("-1"), Word::Data(65535));
        assert_eq!(Word::parse("65536"), Word::Data(0));
        assert_eq!(Word::parse("+3"), Word::Data(3));
    }

    #[test]
    fn test_sign_alone_is_not_data() {
        assert!(Word::parse("-").is_code());
        assert!(Word::parse("1x").is_code());
    }

    #[test]
    fn test_display_matches_slot_text() {
        assert_eq!(Word::Empty.to_string(), "");
        assert_eq!(Word::Data(12).to_string(), "12");
        assert_eq!(Word::parse("STR 4").to_string(), "STR 4");
    }
}
