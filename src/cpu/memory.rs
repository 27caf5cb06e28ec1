//! Word store.
//!
//! 32 slots, addressed 0-31. Capacity is fixed for the lifetime of the
//! machine; loading a shorter program clears the slots it does not cover.

use crate::word::Word;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// The number of memory slots.
pub const MEMORY_SIZE: usize = 32;

/// Main memory: 32 words.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
    cells: Vec<Word>,
}

impl Memory {
    /// Create a new memory with every slot empty.
    pub fn new() -> Self {
        Self {
            cells: vec![Word::Empty; MEMORY_SIZE],
        }
    }

    /// Validate an address.
    #[inline]
    pub fn check_addr(addr: usize) -> Result<usize, MemoryError> {
        if addr < MEMORY_SIZE {
            Ok(addr)
        } else {
            Err(MemoryError::AddressOutOfRange(addr as i64))
        }
    }

    /// Validate an address operand as written, sign included.
    pub fn resolve(addr: i64) -> Result<usize, MemoryError> {
        usize::try_from(addr)
            .ok()
            .filter(|&index| index < MEMORY_SIZE)
            .ok_or(MemoryError::AddressOutOfRange(addr))
    }

    /// Read a slot.
    pub fn read(&self, addr: usize) -> Result<&Word, MemoryError> {
        let index = Self::check_addr(addr)?;
        Ok(&self.cells[index])
    }

    /// Write a slot.
    pub fn write(&mut self, addr: usize, word: Word) -> Result<(), MemoryError> {
        let index = Self::check_addr(addr)?;
        self.cells[index] = word;
        Ok(())
    }

    /// Read a slot as a data operand.
    ///
    /// Blank slots read as zero. Instruction text is not a number.
    pub fn read_value(&self, addr: usize) -> Result<u16, MemoryError> {
        match self.read(addr)? {
            Word::Empty => Ok(0),
            Word::Data(value) => Ok(*value),
            Word::Code(text) => Err(MemoryError::NotData {
                addr,
                text: text.clone(),
            }),
        }
    }

    /// Store a data value.
    #[inline]
    pub fn write_value(&mut self, addr: usize, value: u16) -> Result<(), MemoryError> {
        self.write(addr, Word::Data(value))
    }

    /// Empty every slot.
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            *cell = Word::Empty;
        }
    }

    /// Replace the contents with `words`, starting at address 0.
    ///
    /// Slots beyond the supplied words are cleared.
    pub fn load(&mut self, words: &[Word]) -> Result<(), MemoryError> {
        if words.len() > MEMORY_SIZE {
            return Err(MemoryError::ProgramTooLarge {
                size: words.len(),
                available: MEMORY_SIZE,
            });
        }

        self.clear();
        self.cells[..words.len()].clone_from_slice(words);
        Ok(())
    }

    /// Snapshot of all 32 slots.
    pub fn dump(&self) -> Vec<Word> {
        self.cells.clone()
    }

    /// Iterate over `(address, word)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Word)> {
        self.cells.iter().enumerate()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Only count occupied slots
        let occupied = self.cells.iter().filter(|cell| !cell.is_empty()).count();

        f.debug_struct("Memory")
            .field("occupied", &occupied)
            .field("total", &MEMORY_SIZE)
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("memory address {0} out of range (0-{max})", max = MEMORY_SIZE - 1)]
    AddressOutOfRange(i64),

    #[error("memory address {addr} holds `{text}`, not a number")]
    NotData { addr: usize, text: String },

    #[error("program size {size} exceeds available space {available}")]
    ProgramTooLarge { size: usize, available: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_read_write() {
        let mut mem = Memory::new();
        mem.write(10, Word::data(42)).unwrap();
        assert_eq!(mem.read(10).unwrap(), &Word::Data(42));
        assert_eq!(mem.read_value(10).unwrap(), 42);
    }

    #[test]
    fn test_memory_bounds() {
        let mut mem = Memory::new();
        assert!(mem.read(0).is_ok());
        assert!(mem.read(31).is_ok());
        assert_eq!(mem.read(32), Err(MemoryError::AddressOutOfRange(32)));
        assert!(mem.write(32, Word::data(1)).is_err());
    }

    #[test]
    fn test_resolve_operand() {
        assert_eq!(Memory::resolve(0), Ok(0));
        assert_eq!(Memory::resolve(31), Ok(31));
        assert_eq!(Memory::resolve(32), Err(MemoryError::AddressOutOfRange(32)));
        assert_eq!(Memory::resolve(-1), Err(MemoryError::AddressOutOfRange(-1)));
        assert_eq!(Memory::resolve(70000), Err(MemoryError::AddressOutOfRange(70000)));
    }

    #[test]
    fn test_read_value_of_blank_and_code() {
        let mut mem = Memory::new();
        assert_eq!(mem.read_value(3).unwrap(), 0);

        mem.write(3, Word::parse("HAL")).unwrap();
        assert!(matches!(mem.read_value(3), Err(MemoryError::NotData { addr: 3, .. })));
    }

    #[test]
    fn test_load_clears_remaining_slots() {
        let mut mem = Memory::new();
        mem.write(20, Word::data(9)).unwrap();

        mem.load(&[Word::parse("HAL"), Word::data(1)]).unwrap();

        assert_eq!(mem.read(0).unwrap(), &Word::parse("HAL"));
        assert_eq!(mem.read(1).unwrap(), &Word::Data(1));
        assert!(mem.read(20).unwrap().is_empty());
        assert_eq!(mem.dump().len(), MEMORY_SIZE);
    }

    #[test]
    fn test_load_too_large() {
        let mut mem = Memory::new();
        let words = vec![Word::data(0); MEMORY_SIZE + 1];
        assert!(matches!(
            mem.load(&words),
            Err(MemoryError::ProgramTooLarge { size: 33, available: 32 })
        ));
    }
}
