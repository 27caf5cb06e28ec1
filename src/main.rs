//! Accumulator Simulator - CLI Entry Point
//!
//! Commands:
//! - `accum-sim run <image>` - Run a memory image until it halts
//! - `accum-sim step <image>` - Execute a few instructions and show each one
//! - `accum-sim dump <image>` - Print a memory image, optionally as machine code
//! - `accum-sim encode <word>...` - Show the machine code of slot text
//! - `accum-sim test` - Built-in self-test

use std::ops::ControlFlow;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "accum-sim")]
#[command(author = "Yigit")]
#[command(version = "0.1.0")]
#[command(about = "An instructional simulator of a 32-word accumulator computer")]
struct Cli {
    /// Log every executed instruction (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts
    Run {
        /// Path to the memory image (`index:value` lines)
        image: String,
        /// Maximum number of instructions to run
        #[arg(short, long, default_value = "10000")]
        max_cycles: u64,
        /// Show trace output
        #[arg(short, long)]
        trace: bool,
        /// Delay between instructions, in milliseconds
        #[arg(short, long, default_value = "0")]
        delay_ms: u64,
        /// Operator input for INP, in order (0-2048)
        #[arg(short, long)]
        input: Vec<u16>,
        /// Initial accumulator value
        #[arg(long)]
        ac: Option<u16>,
        /// Print the final state as JSON
        #[arg(long)]
        json: bool,
        /// Save memory to this image file after the run
        #[arg(short, long)]
        save: Option<String>,
    },
    /// Execute instructions one at a time
    Step {
        /// Path to the memory image
        image: String,
        /// Number of instructions to execute
        #[arg(short, long, default_value = "1")]
        count: u64,
        /// Initial accumulator value
        #[arg(long)]
        ac: Option<u16>,
    },
    /// Print a memory image
    Dump {
        /// Path to the memory image
        image: String,
        /// Show the 16-bit machine code next to each slot
        #[arg(short, long)]
        binary: bool,
    },
    /// Show the 16-bit machine code of slot text
    Encode {
        /// Slot text, e.g. "LDA I 5" or "12"
        #[arg(required = true)]
        words: Vec<String>,
    },
    /// Run the built-in self-test
    Test,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Some(Commands::Run { image, max_cycles, trace, delay_ms, input, ac, json, save }) => {
            let options = RunOptions {
                max_cycles,
                trace,
                delay: Duration::from_millis(delay_ms),
                input,
                ac,
                json,
                save,
            };
            run_program(&image, &options);
        }
        Some(Commands::Step { image, count, ac }) => {
            step_program(&image, count, ac);
        }
        Some(Commands::Dump { image, binary }) => {
            dump_image(&image, binary);
        }
        Some(Commands::Encode { words }) => {
            for text in &words {
                println!("{}", encode_line(text));
            }
        }
        Some(Commands::Test) => {
            run_self_test();
        }
        None => {
            println!("Accumulator Simulator v0.1.0");
            println!("A 32-word accumulator computer");
            println!();
            println!("Use --help for available commands");
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

struct RunOptions {
    max_cycles: u64,
    trace: bool,
    delay: Duration,
    input: Vec<u16>,
    ac: Option<u16>,
    json: bool,
    save: Option<String>,
}

/// Load an image file, reporting skipped lines, or exit.
fn load_words(path: &str) -> Vec<accsim::Word> {
    let image = match accsim::load_image(path) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("❌ Failed to load image: {}", e);
            std::process::exit(1);
        }
    };

    for issue in &image.issues {
        eprintln!("⚠️  {}", issue);
    }
    image.words
}

fn new_cpu(path: &str, ac: Option<u16>) -> accsim::Cpu {
    let words = load_words(path);
    let mut cpu = accsim::Cpu::new();
    if let Err(e) = cpu.load(&words) {
        eprintln!("❌ Failed to load program: {}", e);
        std::process::exit(1);
    }
    if let Some(value) = ac {
        cpu.set_accumulator(value);
    }
    cpu
}

fn run_program(path: &str, options: &RunOptions) {
    use accsim::CpuState;

    let mut cpu = new_cpu(path, options.ac);
    for &value in &options.input {
        if let Err(e) = cpu.device_mut().queue_input(value) {
            eprintln!("❌ Invalid input {}: {}", value, e);
            std::process::exit(1);
        }
    }

    if !options.json {
        println!("🔧 Running: {}", path);
        println!();
        println!("━━━ Execution ━━━");
    }

    let result = run_traced(&mut cpu, options, |line| println!("{}", line));

    if let Err(e) = &result {
        eprintln!("❌ CPU error: {}", e);
    }

    if let Some(save_path) = &options.save {
        if let Err(e) = accsim::save_image(save_path, &cpu.dump()) {
            eprintln!("❌ Failed to save image: {}", e);
            std::process::exit(1);
        }
    }

    if options.json {
        match serde_json::to_string_pretty(&cpu.snapshot()) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("❌ Failed to serialize state: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        println!();
        println!("━━━ Result ━━━");
        print_registers(&cpu);
        let outputs = cpu.device().outputs();
        if !outputs.is_empty() {
            println!("Output: {:?}", outputs);
        }

        if cpu.state() == CpuState::Stopped && result.is_ok() {
            println!();
            println!("⚠️  Reached max cycles limit ({}). Use --max-cycles to increase.", options.max_cycles);
        }
    }

    if result.is_err() {
        std::process::exit(1);
    }
}

/// Run under the cycle limit, passing trace lines to `emit`.
fn run_traced<F>(cpu: &mut accsim::Cpu, options: &RunOptions, mut emit: F) -> Result<u64, accsim::CpuError>
where
    F: FnMut(String),
{
    use accsim::{CpuState, Pacing};

    if options.max_cycles == 0 {
        cpu.stop();
        return Ok(0);
    }

    let start = cpu.cycles();
    let result = cpu.run_with(Pacing::with_delay(options.delay), |cpu| {
        if options.trace {
            if let Some(line) = trace_line(cpu) {
                emit(line);
            }
        }
        if cpu.cycles() - start >= options.max_cycles {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });

    // HAL ends the run without another suspension point
    if options.trace && cpu.state() == CpuState::Halted {
        if let Some(line) = trace_line(cpu) {
            emit(line);
        }
    }
    result
}

fn trace_line(cpu: &accsim::Cpu) -> Option<String> {
    let executed = cpu.last_instruction()?;
    let regs = cpu.registers();
    Some(format!("{:02}: {:<10} AC={:<5} E={} PC={:02}",
        executed.addr, executed.instruction.to_string(), regs.ac, u8::from(regs.e), regs.pc))
}

fn encode_line(text: &str) -> String {
    let word = accsim::Word::parse(text);
    format!("{}  {}", accsim::image::format_binary(&word), word)
}

fn step_program(path: &str, count: u64, ac: Option<u16>) {
    let mut cpu = new_cpu(path, ac);

    for _ in 0..count {
        match cpu.step() {
            Ok(executed) => {
                println!("{:02}: {}", executed.addr, executed.instruction);
                print_registers(&cpu);
                println!();
            }
            Err(e) => {
                eprintln!("❌ {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn print_registers(cpu: &accsim::Cpu) {
    let regs = cpu.registers();
    println!("Cycles: {}", cpu.cycles());
    println!("State:  {:?}", cpu.state());
    println!("AC: {:>5} ({:016b})", regs.ac, regs.ac);
    println!("PC: {:>5}", regs.pc);
    println!("AR: {:>5}", regs.ar);
    println!("IR: {}", regs.ir);
    println!("E:  {:>5}", u8::from(regs.e));
}

fn dump_image(path: &str, binary: bool) {
    use accsim::image::format_binary;

    for (i, word) in load_words(path).iter().enumerate() {
        if binary {
            println!("{:02}: {}  {}", i, format_binary(word), word);
        } else {
            println!("{}:{}", i, word);
        }
    }
}

fn run_self_test() {
    use accsim::{Cpu, CpuState, FaultKind, Word};

    println!("━━━ Accumulator Simulator Self-Test ━━━");
    println!();

    let mut passed = 0;
    let mut failed = 0;

    let program = |lines: &[&str]| -> Vec<Word> { lines.iter().map(|l| Word::parse(l)).collect() };

    // Test 1: Load/add/store
    print!("CPU load/add/store... ");
    let mut cpu = Cpu::new();
    let ok = cpu.load(&program(&["LDA 5", "ADD 6", "STR 4", "HAL", "0", "5", "7", "0"])).is_ok()
        && cpu.run().is_ok();
    if ok && cpu.registers().ac == 12 && cpu.is_halted() {
        println!("✓");
        passed += 1;
    } else {
        println!("✗ (got AC={}, expected 12)", cpu.registers().ac);
        failed += 1;
    }

    // Test 2: Conditional jump
    print!("JZE skips over HAL... ");
    let mut cpu = Cpu::new();
    let ok = cpu.load(&program(&["JZE 2", "HAL", "LDA 5", "HAL", "0", "99"])).is_ok()
        && cpu.run().is_ok();
    if ok && cpu.registers().ac == 99 {
        println!("✓");
        passed += 1;
    } else {
        println!("✗ (got AC={}, expected 99)", cpu.registers().ac);
        failed += 1;
    }

    // Test 3: Overflow
    print!("ADD overflow sets E... ");
    let mut cpu = Cpu::new();
    cpu.set_accumulator(65535);
    let ok = cpu.load(&program(&["ADD 2", "HAL", "1"])).is_ok() && cpu.run().is_ok();
    if ok && cpu.registers().ac == 0 && cpu.registers().e {
        println!("✓");
        passed += 1;
    } else {
        println!("✗");
        failed += 1;
    }

    // Test 4: Rotation round trip
    print!("Rotation round trip... ");
    let mut cpu = Cpu::new();
    cpu.set_accumulator(0xBEEF);
    let mut lines = vec!["CLA"; 16];
    lines.extend(["CRA"; 15]);
    lines.push("HAL");
    // 31 instructions + HAL fill memory exactly
    let ok = cpu.load(&program(&lines)).is_ok() && cpu.run().is_ok();
    if ok && cpu.registers().ac == 0xBEEF_u16.rotate_left(1) {
        println!("✓");
        passed += 1;
    } else {
        println!("✗");
        failed += 1;
    }

    // Test 5: Division by zero
    print!("DIV by zero faults... ");
    let mut cpu = Cpu::new();
    cpu.set_accumulator(8);
    let result = cpu.load(&program(&["DIV 2", "HAL", "0"])).map(|_| cpu.run());
    let faulted = matches!(result, Ok(Err(ref e)) if e.kind() == Some(&FaultKind::DivisionByZero));
    if faulted && cpu.registers().ac == 8 && cpu.state() == CpuState::Stopped {
        println!("✓");
        passed += 1;
    } else {
        println!("✗");
        failed += 1;
    }

    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed == 0 {
        println!("✓ All tests passed!");
    } else {
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accsim::{Cpu, CpuState, Word};

    fn options(max_cycles: u64) -> RunOptions {
        RunOptions {
            max_cycles,
            trace: true,
            delay: Duration::ZERO,
            input: Vec::new(),
            ac: None,
            json: false,
            save: None,
        }
    }

    fn loaded(lines: &[&str]) -> Cpu {
        let mut cpu = Cpu::new();
        let words: Vec<Word> = lines.iter().map(|l| Word::parse(l)).collect();
        cpu.load(&words).unwrap();
        cpu
    }

    #[test]
    fn test_zero_cycle_limit_runs_nothing() {
        let mut cpu = loaded(&["INA", "HAL"]);
        let mut lines = Vec::new();

        assert_eq!(run_traced(&mut cpu, &options(0), |l| lines.push(l)), Ok(0));
        assert_eq!(cpu.cycles(), 0);
        assert_eq!(cpu.registers().ac, 0);
        assert_eq!(cpu.state(), CpuState::Stopped);
        assert!(lines.is_empty());
    }

    #[test]
    fn test_cycle_limit() {
        let mut cpu = loaded(&["INA", "JMP 0"]);
        let mut lines = Vec::new();

        assert_eq!(run_traced(&mut cpu, &options(5), |l| lines.push(l)), Ok(5));
        assert_eq!(lines.len(), 5);
        assert_eq!(cpu.state(), CpuState::Stopped);
    }

    #[test]
    fn test_trace_includes_halt() {
        let mut cpu = loaded(&["INA", "HAL"]);
        let mut lines = Vec::new();

        assert_eq!(run_traced(&mut cpu, &options(100), |l| lines.push(l)), Ok(2));
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("00: INA"));
        assert!(lines[1].starts_with("01: HAL"));
    }

    #[test]
    fn test_encode_line() {
        assert_eq!(encode_line("LDA I 5"), "1000000000000101  LDA I 5");
        assert_eq!(encode_line("12"), "0000000000001100  12");
        assert_eq!(encode_line("DIV 3"), "????????????????  DIV 3");
    }
}
