//! CPU emulation for the accumulator machine.
//!
//! This module implements the complete architecture:
//! - 32 memory slots holding data or instruction text
//! - 5 registers: AC (accumulator), PC, AR (address), IR (instruction), E (overflow)
//! - 35-instruction set in memory-reference, register-reference and I/O classes

pub mod memory;
pub mod registers;
pub mod decode;
pub mod execute;

pub use memory::{Memory, MemoryError, MEMORY_SIZE};
pub use registers::Registers;
pub use decode::{Instruction, Opcode, OpClass, Operand, AddrMode, DecodeError};
pub use execute::{Cpu, CpuError, CpuState, Executed, FaultKind, Pacing, Snapshot, StopHandle};
