//! # Accumulator Computer Simulator
//!
//! An instructional simulator of a small accumulator machine: 32 words of
//! memory, five registers, and 35 instructions split into memory-reference,
//! register-reference and I/O classes.
//!
//! The core is the instruction-cycle engine in [`cpu`]. Displays, animation
//! and operator front-ends stay outside; they talk to the engine through
//! [`Cpu`] snapshots and the [`IoDevice`] trait.

pub mod word;
pub mod cpu;
pub mod io;
pub mod image;

mod property_tests;

// Re-export commonly used types
pub use word::Word;
pub use cpu::{Cpu, CpuState, CpuError, FaultKind, Memory, Registers, Instruction, Opcode, Pacing, Snapshot, StopHandle};
pub use io::{Console, IoDevice, IoSignal, Keypad, NullDevice};
pub use image::{load_image, save_image, parse_image, MemoryImage};
