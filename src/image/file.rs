//! Memory image text format.
//!
//! One slot per line, `index:value`:
//!
//! ```text
//! 0:LDA 5
//! 1:ADD 6
//! 2:HAL
//! 3:
//! 5:12
//! ```
//!
//! Saving writes all 32 slots, blank ones included. Loading is forgiving:
//! lines without a `:` are ignored, and lines with a bad or out-of-range
//! index are reported and skipped without aborting the rest of the file.

use std::fmt;
use std::path::Path;
use crate::cpu::MEMORY_SIZE;
use crate::word::Word;
use thiserror::Error;
use tracing::{debug, warn};

/// A parsed memory image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryImage {
    /// All 32 slots; slots the file did not mention are empty.
    pub words: Vec<Word>,
    /// Lines that were skipped.
    pub issues: Vec<LineIssue>,
}

impl MemoryImage {
    /// An image with every slot empty.
    pub fn new() -> Self {
        Self {
            words: vec![Word::Empty; MEMORY_SIZE],
            issues: Vec::new(),
        }
    }

    /// Number of slots that hold something.
    pub fn occupied(&self) -> usize {
        self.words.iter().filter(|w| !w.is_empty()).count()
    }
}

impl Default for MemoryImage {
    fn default() -> Self {
        Self::new()
    }
}

/// A skipped line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIssue {
    /// 1-based line number.
    pub line: usize,
    pub text: String,
    pub kind: IssueKind,
}

/// Why a line was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    /// The index is not a number.
    InvalidIndex,
    /// The index is outside 0-31.
    IndexOutOfRange(i64),
}

impl fmt::Display for LineIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            IssueKind::InvalidIndex => {
                write!(f, "line {}: skipping invalid line: {}", self.line, self.text)
            }
            IssueKind::IndexOutOfRange(index) => {
                write!(f, "line {}: skipping out-of-bounds index: {}", self.line, index)
            }
        }
    }
}

/// Parse image text.
pub fn parse_image(text: &str) -> MemoryImage {
    let mut image = MemoryImage::new();

    for (line_num, line) in text.lines().enumerate() {
        let line = line.trim();
        let Some((index, value)) = line.split_once(':') else {
            continue;
        };

        let issue = |kind| LineIssue {
            line: line_num + 1,
            text: line.to_string(),
            kind,
        };

        let index: i64 = match index.trim().parse() {
            Ok(index) => index,
            Err(_) => {
                image.issues.push(issue(IssueKind::InvalidIndex));
                continue;
            }
        };

        match usize::try_from(index) {
            Ok(slot) if slot < MEMORY_SIZE => {
                image.words[slot] = Word::parse(value);
                debug!(slot, value = value.trim(), "loaded memory slot");
            }
            _ => image.issues.push(issue(IssueKind::IndexOutOfRange(index))),
        }
    }

    for issue in &image.issues {
        warn!("{}", issue);
    }

    image
}

/// Format words as image text, one line per slot.
pub fn format_image(words: &[Word]) -> String {
    let mut output = String::new();
    for (i, word) in words.iter().enumerate() {
        output.push_str(&format!("{}:{}\n", i, word));
    }
    output
}

/// Load an image file from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<MemoryImage, ImageError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| ImageError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(parse_image(&text))
}

/// Save words to an image file.
pub fn save_image<P: AsRef<Path>>(path: P, words: &[Word]) -> Result<(), ImageError> {
    let path = path.as_ref();
    std::fs::write(path, format_image(words)).map_err(|e| ImageError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Errors that can occur reading or writing image files.
#[derive(Debug, Clone, Error)]
pub enum ImageError {
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },
}
