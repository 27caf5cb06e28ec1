//! CPU registers.
//!
//! The machine has 5 registers:
//! - AC: 16-bit accumulator
//! - PC: program counter (memory index)
//! - AR: address register, the effective address of the current operand
//! - IR: instruction register, the text of the current instruction
//! - E: 1-bit overflow/extend flag

use serde::{Serialize, Deserialize};

/// The register file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// AC: accumulator, arithmetic wraps modulo 2^16
    pub ac: u16,

    /// PC: address of the next instruction
    pub pc: usize,

    /// AR: effective address of the current operand
    pub ar: usize,

    /// IR: text of the instruction being (or last) executed
    pub ir: String,

    /// E: overflow flag.
    /// Set by ADD/INA carry-out and by every MUL. Nothing branches on it.
    pub e: bool,
}

impl Registers {
    /// Create a register file with all values zeroed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all registers to zero.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// AC read as a two's complement value.
    #[inline]
    pub fn ac_signed(&self) -> i16 {
        self.ac as i16
    }

    /// Add to AC, setting E on carry out of bit 15.
    ///
    /// E is left alone when there is no carry.
    pub fn add_to_ac(&mut self, value: u16) {
        let (sum, carry) = self.ac.overflowing_add(value);
        if carry {
            self.e = true;
        }
        self.ac = sum;
    }

    /// Increment the program counter by 1.
    /// Returns the old value.
    pub fn advance_pc(&mut self) -> usize {
        let old = self.pc;
        self.pc += 1;
        old
    }

    /// Set the program counter to an absolute address.
    #[inline]
    pub fn jump(&mut self, addr: usize) {
        self.pc = addr;
    }
}
