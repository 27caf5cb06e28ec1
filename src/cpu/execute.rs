//! CPU execution engine.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.
//!
//! Every handler reports how control continues ([`Flow`]); the engine is the
//! only place PC moves. Jumps land exactly on their target, everything else
//! advances by one (or two for a taken skip).

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::cpu::{Memory, Registers};
use crate::cpu::decode::{self, AddrMode, DecodeError, Instruction, Opcode, Operand};
use crate::cpu::memory::MemoryError;
use crate::io::{Console, IoDevice, IoSignal};
use crate::word::{Word, WORD_MODULUS};
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// Nothing executing. Initial state, and the state after a step.
    Idle,
    /// Inside `run`.
    Running,
    /// Executed HAL. Only `reset` or `load` leave this state.
    Halted,
    /// Stopped from outside, or by a fault.
    Stopped,
}

/// How control continues after an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    /// PC := PC + 1
    Next,
    /// PC := PC + 2
    Skip,
    /// PC := target
    Jump(usize),
    /// PC unchanged, CPU halts.
    Halt,
}

/// An instruction the CPU has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Executed {
    /// Address it was fetched from.
    pub addr: usize,
    pub instruction: Instruction,
}

/// Pacing between instructions during `run`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pacing {
    /// Delay at each suspension point. Zero runs flat out.
    pub delay: Duration,
}

impl Pacing {
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }
}

/// Requests a stop from outside the run loop.
///
/// The request is honored at the next suspension point, never in the middle
/// of an instruction.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Registers, state and memory at a suspension point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub state: CpuState,
    pub cycles: u64,
    pub registers: Registers,
    pub memory: Vec<Word>,
}

/// The CPU.
pub struct Cpu<D = Console> {
    regs: Registers,
    mem: Memory,
    state: CpuState,
    /// Instructions executed since the last reset.
    cycles: u64,
    last_instr: Option<Executed>,
    last_fault: Option<CpuError>,
    stop: StopHandle,
    device: D,
}

impl Cpu<Console> {
    /// Create a CPU with zeroed state and a fresh console.
    pub fn new() -> Self {
        Self::with_device(Console::new())
    }
}

impl<D: IoDevice> Cpu<D> {
    /// Create a CPU that does its I/O through `device`.
    pub fn with_device(device: D) -> Self {
        Self {
            regs: Registers::new(),
            mem: Memory::new(),
            state: CpuState::Idle,
            cycles: 0,
            last_instr: None,
            last_fault: None,
            stop: StopHandle::default(),
            device,
        }
    }

    /// Clear registers and memory, back to `Idle`.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.mem.clear();
        self.state = CpuState::Idle;
        self.cycles = 0;
        self.last_instr = None;
        self.last_fault = None;
        self.stop.clear();
        debug!("memory and registers cleared");
    }

    /// Replace memory contents. Registers are left as they are.
    pub fn load(&mut self, words: &[Word]) -> Result<(), MemoryError> {
        self.mem.load(words)?;
        self.state = CpuState::Idle;
        self.last_fault = None;
        debug!(words = words.len(), "memory loaded");
        Ok(())
    }

    /// Snapshot of all 32 memory slots.
    pub fn dump(&self) -> Vec<Word> {
        self.mem.dump()
    }

    /// Execute a single instruction.
    ///
    /// Blank and data slots at PC are skipped first. Returns the instruction
    /// that was executed, or an error.
    pub fn step(&mut self) -> Result<Executed, CpuError> {
        self.enter()?;
        let result = self.cycle();
        if self.state == CpuState::Running {
            self.state = CpuState::Idle;
        }
        result
    }

    /// Run until halt, stop or fault, without pacing.
    ///
    /// Returns the number of instructions executed.
    pub fn run(&mut self) -> Result<u64, CpuError> {
        self.run_with(Pacing::default(), |_| ControlFlow::Continue(()))
    }

    /// Run for at most `max_cycles` instructions.
    ///
    /// Reaching the limit stops the CPU as an external stop would.
    pub fn run_limited(&mut self, max_cycles: u64) -> Result<u64, CpuError> {
        if max_cycles == 0 {
            return Ok(0);
        }
        let limit = self.cycles + max_cycles;
        self.run_with(Pacing::default(), |cpu| {
            if cpu.cycles >= limit {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
    }

    /// Run, calling `observer` at every suspension point.
    ///
    /// The observer sees the CPU between instructions and can stop the run by
    /// returning `Break`. A [`StopHandle`] request is honored at the next
    /// suspension point, including one made before the run started.
    /// `pacing` delays each suspension point.
    pub fn run_with<F>(&mut self, pacing: Pacing, mut observer: F) -> Result<u64, CpuError>
    where
        F: FnMut(&Self) -> ControlFlow<()>,
    {
        self.enter()?;
        info!(pc = self.regs.pc, "program started");

        let start_cycles = self.cycles;
        loop {
            // Suspension point; a request made before the run is honored here
            if self.stop.take() {
                self.state = CpuState::Stopped;
                info!(pc = self.regs.pc, "program stopped");
                break;
            }

            self.cycle()?;
            if self.state != CpuState::Running {
                break;
            }

            if observer(self).is_break() {
                self.state = CpuState::Stopped;
                info!(pc = self.regs.pc, "program stopped");
                break;
            }
            if !pacing.delay.is_zero() {
                std::thread::sleep(pacing.delay);
            }
        }

        Ok(self.cycles - start_cycles)
    }

    /// Stop the CPU.
    ///
    /// Outside a run this takes effect immediately; during a run use a
    /// [`StopHandle`] or the observer.
    pub fn stop(&mut self) {
        if self.state != CpuState::Halted {
            self.state = CpuState::Stopped;
            info!("program stopped");
        }
    }

    /// A handle that can stop a run from elsewhere.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    fn enter(&mut self) -> Result<(), CpuError> {
        if self.state == CpuState::Halted {
            return Err(CpuError::NotRunning(self.state));
        }
        self.state = CpuState::Running;
        Ok(())
    }

    /// One fetch-decode-execute cycle.
    ///
    /// AR and IR are written only once the instruction has completed, so a
    /// fault leaves them describing the last instruction that did.
    fn cycle(&mut self) -> Result<Executed, CpuError> {
        // Fetch, skipping blank and data slots
        let (addr, text) = loop {
            let pc = self.regs.pc;
            let fetched = self.mem.read(pc).cloned();
            match fetched {
                Ok(Word::Code(text)) => break (pc, text),
                Err(e) => return Err(self.fault(pc, Word::Empty, e.into())),
                _ => {
                    debug!(pc, "no instruction at memory location");
                    self.regs.advance_pc();
                }
            }
        };

        // Decode
        let instr = decode::parse(&text)
            .map_err(|e| self.fault(addr, Word::Code(text.clone()), e.into()))?;

        // Resolve the effective address, then execute
        let (ar, flow) = self
            .effective_address(&instr.operand)
            .map_err(FaultKind::from)
            .and_then(|ar| self.execute(&instr, ar).map(|flow| (ar, flow)))
            .map_err(|kind| self.fault(addr, Word::Code(text.clone()), kind))?;

        self.regs.ar = ar;
        self.regs.ir = text;
        match flow {
            Flow::Next => {
                self.regs.advance_pc();
            }
            Flow::Skip => self.regs.pc += 2,
            Flow::Jump(target) => self.regs.jump(target),
            Flow::Halt => {
                self.state = CpuState::Halted;
                info!(pc = addr, "program halted");
            }
        }

        debug!(addr, %instr, ac = self.regs.ac, pc = self.regs.pc, "executed");
        let executed = Executed { addr, instruction: instr };
        self.cycles += 1;
        self.last_instr = Some(executed);
        Ok(executed)
    }

    /// Resolve an operand to the address AR should hold.
    ///
    /// Instructions without an address operand leave AR at PC.
    fn effective_address(&self, operand: &Operand) -> Result<usize, MemoryError> {
        match *operand {
            Operand::Address { addr, mode: AddrMode::Direct } => Memory::resolve(addr),
            Operand::Address { addr, mode: AddrMode::Indirect } => {
                let pointer = Memory::resolve(addr)?;
                let target = self.mem.read_value(pointer)?;
                Memory::check_addr(target.into())
            }
            Operand::None | Operand::Literal(_) => Ok(self.regs.pc),
        }
    }

    /// Record a fault and stop.
    fn fault(&mut self, addr: usize, word: Word, kind: FaultKind) -> CpuError {
        warn!(addr, %word, error = %kind, "execution fault");
        let error = CpuError::Fault { addr, word, kind };
        self.state = CpuState::Stopped;
        self.last_fault = Some(error.clone());
        error
    }

    /// Execute a decoded instruction against effective address `ar`.
    ///
    /// Nothing is modified before the last check that can fail.
    fn execute(&mut self, instr: &Instruction, ar: usize) -> Result<Flow, FaultKind> {

        let flow = match instr.opcode {
            // ==================== Transfer ====================

            Opcode::Lda => {
                self.regs.ac = self.mem.read_value(ar)?;
                Flow::Next
            }

            Opcode::Str => {
                self.mem.write_value(ar, self.regs.ac)?;
                Flow::Next
            }

            // ==================== Control Flow ====================

            Opcode::Jmp => Flow::Jump(ar),

            Opcode::Jze => {
                if self.regs.ac == 0 {
                    Flow::Jump(ar)
                } else {
                    Flow::Next
                }
            }

            Opcode::Jsa => {
                // The return address cell holds data, so fetch steps past it
                let ret = self.regs.pc + 1;
                self.mem.write_value(ar, ret as u16)?;
                Flow::Jump(ar)
            }

            // ==================== Logic ====================

            Opcode::And => {
                self.regs.ac &= self.mem.read_value(ar)?;
                Flow::Next
            }

            Opcode::Or => {
                self.regs.ac |= self.mem.read_value(ar)?;
                Flow::Next
            }

            Opcode::Xor => {
                self.regs.ac ^= self.mem.read_value(ar)?;
                Flow::Next
            }

            // ==================== Arithmetic ====================

            Opcode::Add => {
                let operand = self.mem.read_value(ar)?;
                self.regs.add_to_ac(operand);
                Flow::Next
            }

            Opcode::Sub => {
                let operand = self.mem.read_value(ar)?;
                self.regs.ac = self.regs.ac.wrapping_sub(operand);
                Flow::Next
            }

            Opcode::Mul => {
                let operand = self.mem.read_value(ar)?;
                self.regs.ac = self.regs.ac.wrapping_mul(operand);
                // Flagged whether or not the product fit
                self.regs.e = true;
                Flow::Next
            }

            Opcode::Div => {
                let divisor = self.mem.read_value(ar)?;
                if divisor == 0 {
                    return Err(FaultKind::DivisionByZero);
                }
                self.regs.ac /= divisor;
                Flow::Next
            }

            Opcode::Inc | Opcode::Dec => {
                let value = self.mem.read_value(ar)?;
                let result = if instr.opcode == Opcode::Inc {
                    value.wrapping_add(1)
                } else {
                    value.wrapping_sub(1)
                };
                self.regs.ac = result;
                self.mem.write_value(ar, result)?;
                if result == 0 { Flow::Skip } else { Flow::Next }
            }

            Opcode::Cmp => {
                if let Operand::Literal(literal) = instr.operand {
                    let relation = match i64::from(self.regs.ac).cmp(&i64::from(literal)) {
                        std::cmp::Ordering::Equal => "equal to",
                        std::cmp::Ordering::Greater => "greater than",
                        std::cmp::Ordering::Less => "less than",
                    };
                    info!(ac = self.regs.ac, literal, "AC is {} {}", relation, literal);
                }
                Flow::Next
            }

            // ==================== Register Reference ====================

            Opcode::Clr => {
                self.regs.ac = 0;
                Flow::Next
            }

            Opcode::Cre => {
                self.regs.e = false;
                Flow::Next
            }

            Opcode::Cta => {
                self.regs.ac = !self.regs.ac;
                Flow::Next
            }

            Opcode::Cte => {
                self.regs.e = !self.regs.e;
                Flow::Next
            }

            Opcode::Skz => {
                if self.regs.ac == 0 { Flow::Skip } else { Flow::Next }
            }

            Opcode::Ina => {
                self.regs.add_to_ac(1);
                Flow::Next
            }

            Opcode::Skp => {
                if self.regs.ac_signed() > 0 { Flow::Skip } else { Flow::Next }
            }

            Opcode::Skn => {
                if self.regs.ac_signed() < 0 { Flow::Skip } else { Flow::Next }
            }

            Opcode::Cla => {
                self.regs.ac = self.regs.ac.rotate_left(1);
                Flow::Next
            }

            Opcode::Cra => {
                self.regs.ac = self.regs.ac.rotate_right(1);
                Flow::Next
            }

            Opcode::Hal => Flow::Halt,

            // ==================== Input/Output ====================

            Opcode::Inp => {
                let value = match instr.operand {
                    Operand::Literal(literal) => {
                        (i64::from(literal).rem_euclid(WORD_MODULUS)) as u16
                    }
                    _ => self.device.input().ok_or(FaultKind::InputUnavailable)?,
                };
                self.regs.ac = self.regs.ac.wrapping_add(value);
                Flow::Next
            }

            Opcode::Out => {
                debug!(ac = self.regs.ac, "output");
                self.device.output(self.regs.ac);
                Flow::Next
            }

            Opcode::Sfi | Opcode::Sfo | Opcode::Put | Opcode::Opt
            | Opcode::Spi | Opcode::Spo | Opcode::Sie => {
                if let Some(signal) = IoSignal::from_opcode(instr.opcode) {
                    self.device.signal(signal);
                }
                Flow::Next
            }
        };

        Ok(flow)
    }

    /// Preset AC from the operator console.
    pub fn set_accumulator(&mut self, value: u16) {
        self.regs.ac = value;
    }

    /// Register file, read-only.
    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    /// Memory, read-only.
    pub fn memory(&self) -> &Memory {
        &self.mem
    }

    /// Registers, state and memory in one serializable value.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state,
            cycles: self.cycles,
            registers: self.regs.clone(),
            memory: self.mem.dump(),
        }
    }

    pub fn state(&self) -> CpuState {
        self.state
    }

    /// Instructions executed since the last reset.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Executed> {
        self.last_instr
    }

    /// The fault that stopped the last run, if any.
    pub fn last_fault(&self) -> Option<&CpuError> {
        self.last_fault.as_ref()
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }
}

impl Default for Cpu<Console> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> std::fmt::Debug for Cpu<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .finish()
    }
}

/// What went wrong inside a faulting instruction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FaultKind {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("division by zero")]
    DivisionByZero,

    #[error("no input available")]
    InputUnavailable,
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("fault at address {addr} (`{word}`): {kind}")]
    Fault { addr: usize, word: Word, kind: FaultKind },
}

impl CpuError {
    /// The fault kind, if this is a fault.
    pub fn kind(&self) -> Option<&FaultKind> {
        match self {
            CpuError::Fault { kind, .. } => Some(kind),
            CpuError::NotRunning(_) => None,
        }
    }
}
