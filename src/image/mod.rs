//! Memory images and their machine-code view.
//!
//! This module provides:
//! - The `index:value` text format used to save and load memory
//! - The 16-bit binary encoding shown by the machine-code view

pub mod file;
pub mod machine;

pub use file::{parse_image, format_image, load_image, save_image, MemoryImage, LineIssue, IssueKind, ImageError};
pub use machine::{encode, format_binary};
