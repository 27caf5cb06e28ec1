//! I/O collaborators.
//!
//! The CPU never talks to a terminal or a window directly. OUT, INP and the
//! flag instructions go through an [`IoDevice`]; the host decides what that
//! means. [`Console`] is the reference device: an output log, a queue of
//! operator inputs, and the keypad buffer used to type them in.

use std::collections::VecDeque;
use crate::cpu::decode::Opcode;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Largest value the keypad accepts.
pub const KEYPAD_MAX: u16 = 2048;

/// Maximum number of digits in the keypad buffer.
pub const KEYPAD_DIGITS: usize = 11;

/// Handshake and flag instructions forwarded to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IoSignal {
    Sfi,
    Sfo,
    Put,
    Opt,
    Spi,
    Spo,
    Sie,
}

impl IoSignal {
    /// The signal raised by a flag opcode, if it is one.
    pub fn from_opcode(opcode: Opcode) -> Option<Self> {
        match opcode {
            Opcode::Sfi => Some(IoSignal::Sfi),
            Opcode::Sfo => Some(IoSignal::Sfo),
            Opcode::Put => Some(IoSignal::Put),
            Opcode::Opt => Some(IoSignal::Opt),
            Opcode::Spi => Some(IoSignal::Spi),
            Opcode::Spo => Some(IoSignal::Spo),
            Opcode::Sie => Some(IoSignal::Sie),
            _ => None,
        }
    }
}

/// Something the CPU can do I/O with.
pub trait IoDevice {
    /// OUT: the current accumulator value.
    fn output(&mut self, value: u16);

    /// INP without an operand: the next operator-supplied value, if any.
    ///
    /// Values come from the keypad and so stay within `0..=KEYPAD_MAX`.
    fn input(&mut self) -> Option<u16>;

    /// Flag instructions. They have no effect on the CPU itself.
    fn signal(&mut self, _signal: IoSignal) {}
}

/// Device that discards output and never has input.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDevice;

impl IoDevice for NullDevice {
    fn output(&mut self, _value: u16) {}

    fn input(&mut self) -> Option<u16> {
        None
    }
}

/// The operator keypad: a digit buffer with an 11-digit, 2048-max limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keypad {
    buffer: String,
}

impl Keypad {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a digit. The buffer is left unchanged on error.
    pub fn press(&mut self, digit: u8) -> Result<(), KeypadError> {
        if digit > 9 {
            return Err(KeypadError::InvalidDigit(digit));
        }
        if self.buffer.len() >= KEYPAD_DIGITS {
            return Err(KeypadError::TooManyDigits);
        }

        let candidate = format!("{}{}", self.buffer, digit);
        let value: u64 = candidate.parse().map_err(|_| KeypadError::TooManyDigits)?;
        if value > u64::from(KEYPAD_MAX) {
            return Err(KeypadError::ValueTooLarge(value));
        }

        self.buffer = candidate;
        Ok(())
    }

    /// Current buffer contents, as typed.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Value of the buffer, if anything has been typed.
    pub fn value(&self) -> Option<u16> {
        self.buffer.parse().ok()
    }

    /// Take the value and clear the buffer.
    pub fn take(&mut self) -> Option<u16> {
        let value = self.value();
        self.clear();
        value
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Reference console: output log, input queue, keypad and FGI/FGO flags.
#[derive(Debug, Clone, Default)]
pub struct Console {
    /// FGI: input flag. Keypad entries only reach the queue while it is set.
    fgi: bool,
    keypad: Keypad,
    inputs: VecDeque<u16>,
    /// Last value shown on the FGO display.
    fgo: Option<u16>,
    outputs: Vec<u16>,
    signals: Vec<IoSignal>,
}

impl Console {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an input value directly, bypassing the keypad.
    pub fn queue_input(&mut self, value: u16) -> Result<(), KeypadError> {
        if value > KEYPAD_MAX {
            return Err(KeypadError::ValueTooLarge(u64::from(value)));
        }
        self.inputs.push_back(value);
        Ok(())
    }

    pub fn set_fgi(&mut self, enabled: bool) {
        self.fgi = enabled;
    }

    pub fn fgi(&self) -> bool {
        self.fgi
    }

    pub fn keypad(&self) -> &Keypad {
        &self.keypad
    }

    /// Press a keypad digit.
    pub fn press(&mut self, digit: u8) -> Result<(), KeypadError> {
        self.keypad.press(digit)
    }

    /// Keypad ENTER: submit the buffer to the input queue.
    ///
    /// The buffer is cleared either way; the value is only queued while FGI
    /// is set.
    pub fn enter(&mut self) -> Option<u16> {
        let value = self.keypad.take()?;
        if !self.fgi {
            tracing::debug!(value, "FGI not set, keypad entry dropped");
            return None;
        }
        self.inputs.push_back(value);
        tracing::debug!(value, "keypad entry queued");
        Some(value)
    }

    pub fn clear_keypad(&mut self) {
        self.keypad.clear();
    }

    /// FGO: copy the most recent queued input to the output display.
    pub fn fgo(&mut self) -> Result<u16, KeypadError> {
        if !self.fgi {
            return Err(KeypadError::FlagNotSet);
        }
        let value = *self.inputs.back().ok_or(KeypadError::NoInput)?;
        self.fgo = Some(value);
        tracing::info!(value, "FGO output");
        Ok(value)
    }

    /// Value on the FGO display.
    pub fn fgo_display(&self) -> Option<u16> {
        self.fgo
    }

    /// Values queued but not yet read by INP.
    pub fn pending_inputs(&self) -> usize {
        self.inputs.len()
    }

    /// Everything OUT has emitted.
    pub fn outputs(&self) -> &[u16] {
        &self.outputs
    }

    /// Flag instructions seen so far.
    pub fn signals(&self) -> &[IoSignal] {
        &self.signals
    }
}

impl IoDevice for Console {
    fn output(&mut self, value: u16) {
        tracing::info!(value, "output");
        self.outputs.push(value);
    }

    fn input(&mut self) -> Option<u16> {
        self.inputs.pop_front()
    }

    fn signal(&mut self, signal: IoSignal) {
        tracing::debug!(?signal, "I/O signal");
        self.signals.push(signal);
    }
}

/// Errors from the keypad and console flags.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeypadError {
    #[error("not a digit: {0}")]
    InvalidDigit(u8),

    #[error("input length exceeds the maximum of {KEYPAD_DIGITS} digits")]
    TooManyDigits,

    #[error("input {0} exceeds the maximum value of {KEYPAD_MAX}")]
    ValueTooLarge(u64),

    #[error("FGI flag is not set")]
    FlagNotSet,

    #[error("no input has been entered")]
    NoInput,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypad_limits_value() {
        let mut keypad = Keypad::new();
        for digit in [2, 0, 4, 8] {
            keypad.press(digit).unwrap();
        }
        assert_eq!(keypad.value(), Some(2048));

        // 20480 is over the limit; buffer is unchanged
        assert_eq!(keypad.press(0), Err(KeypadError::ValueTooLarge(20480)));
        assert_eq!(keypad.buffer(), "2048");
    }

    #[test]
    fn test_keypad_limits_length() {
        let mut keypad = Keypad::new();
        for _ in 0..KEYPAD_DIGITS {
            keypad.press(0).unwrap();
        }
        assert_eq!(keypad.press(1), Err(KeypadError::TooManyDigits));
        assert_eq!(keypad.take(), Some(0));
        assert_eq!(keypad.buffer(), "");
    }

    #[test]
    fn test_keypad_rejects_non_digit() {
        let mut keypad = Keypad::new();
        assert_eq!(keypad.press(10), Err(KeypadError::InvalidDigit(10)));
    }

    #[test]
    fn test_enter_requires_fgi() {
        let mut console = Console::new();
        console.press(7).unwrap();
        assert_eq!(console.enter(), None);
        assert_eq!(console.pending_inputs(), 0);
        assert_eq!(console.keypad().buffer(), "");

        console.set_fgi(true);
        console.press(4).unwrap();
        console.press(2).unwrap();
        assert_eq!(console.enter(), Some(42));
        assert_eq!(console.input(), Some(42));
        assert_eq!(console.input(), None);
    }

    #[test]
    fn test_fgo_echoes_latest_input() {
        let mut console = Console::new();
        assert_eq!(console.fgo(), Err(KeypadError::FlagNotSet));

        console.set_fgi(true);
        assert_eq!(console.fgo(), Err(KeypadError::NoInput));

        console.queue_input(5).unwrap();
        console.queue_input(9).unwrap();
        assert_eq!(console.fgo(), Ok(9));
        assert_eq!(console.fgo_display(), Some(9));
    }

    #[test]
    fn test_queue_input_bound() {
        let mut console = Console::new();
        assert!(console.queue_input(KEYPAD_MAX).is_ok());
        assert!(console.queue_input(KEYPAD_MAX + 1).is_err());
    }

    #[test]
    fn test_signal_mapping() {
        assert_eq!(IoSignal::from_opcode(Opcode::Sie), Some(IoSignal::Sie));
        assert_eq!(IoSignal::from_opcode(Opcode::Out), None);
    }
}
