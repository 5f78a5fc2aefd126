//! LC-3 Emulator - CLI Entry Point
//!
//! `lc3-emu <image>...` loads each object image in order and runs the
//! machine from 0x3000 until it halts.
//!
//! Exit status: 0 on HALT, 1 if an image cannot be loaded or console I/O
//! fails, 2 on usage errors, -2 when interrupted by Ctrl-C, SIGINT or
//! SIGTERM. A reserved opcode aborts the process once the terminal has been
//! restored.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::Parser;
use lc3::{Console, Cpu, CpuError, RawModeGuard, RunOutcome, StdioConsole, TerminalConsole};

#[derive(Parser)]
#[command(name = "lc3-emu")]
#[command(version = "0.1.0")]
#[command(about = "An emulator for the LC-3, a 16-bit educational computer")]
struct Cli {
    /// Object images to load, in order
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Stop after this many instructions
    #[arg(long)]
    max_cycles: Option<u64>,

    /// Log every executed instruction
    #[arg(short, long)]
    trace: bool,

    /// Write a JSON snapshot of the registers to this file on exit
    #[arg(long)]
    dump_state: Option<PathBuf>,
}

/// How a session ended.
enum Exit {
    Halted,
    CycleLimit,
    Interrupted,
    Fatal(CpuError),
    Failed,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.trace);

    let interrupt = Arc::new(AtomicBool::new(false));
    if let Err(e) = register_signals(&interrupt) {
        log::warn!("could not install signal handlers: {}", e);
    }

    let exit = if std::io::stdin().is_terminal() {
        let console = TerminalConsole::new(Arc::clone(&interrupt));
        run_session(&cli, console, &interrupt, true)
    } else {
        let console = StdioConsole::new(Arc::clone(&interrupt));
        run_session(&cli, console, &interrupt, false)
    };

    // The terminal is back in its original mode by now.
    match exit {
        Exit::Halted => {}
        Exit::CycleLimit => {
            eprintln!("stopped after reaching the cycle limit");
        }
        Exit::Interrupted => {
            eprintln!();
            std::process::exit(-2);
        }
        Exit::Fatal(e) => {
            eprintln!("fatal: {}", e);
            std::process::abort();
        }
        Exit::Failed => std::process::exit(1),
    }
}

fn init_logging(trace: bool) {
    let env = env_logger::Env::default().default_filter_or("warn");
    let mut builder = env_logger::Builder::from_env(env);
    if trace {
        builder.filter_level(log::LevelFilter::Trace);
    }
    builder.init();
}

/// Route SIGINT and SIGTERM to the interrupt flag so the run loop stops and
/// the terminal is restored. A second signal while the first is still being
/// handled terminates the process.
fn register_signals(interrupt: &Arc<AtomicBool>) -> std::io::Result<()> {
    for &signal in signal_hook::consts::TERM_SIGNALS {
        signal_hook::flag::register_conditional_shutdown(signal, 1, Arc::clone(interrupt))?;
        signal_hook::flag::register(signal, Arc::clone(interrupt))?;
    }
    Ok(())
}

fn run_session<C: Console>(cli: &Cli, console: C, interrupt: &AtomicBool, raw: bool) -> Exit {
    let mut cpu = Cpu::new(console);

    for path in &cli.images {
        if let Err(e) = cpu.load_image_file(path) {
            eprintln!("failed to load image {}: {}", path.display(), e);
            return Exit::Failed;
        }
    }

    let result = {
        let _raw_mode = if raw { acquire_raw_mode() } else { None };

        match cli.max_cycles {
            Some(max) => cpu.run_limited(max, interrupt),
            None => cpu.run(interrupt),
        }
    };

    if let Some(path) = &cli.dump_state {
        if let Err(e) = dump_state(&cpu, path) {
            eprintln!("failed to write state to {}: {}", path.display(), e);
            return Exit::Failed;
        }
    }

    match result {
        Ok(RunOutcome::Halted) => Exit::Halted,
        Ok(RunOutcome::CycleLimit) => Exit::CycleLimit,
        Ok(RunOutcome::Interrupted) => Exit::Interrupted,
        Err(e @ (CpuError::ReservedOpcode { .. } | CpuError::Decode(_))) => Exit::Fatal(e),
        Err(e) => {
            eprintln!("error at PC={:#06x}: {}", cpu.regs.pc, e);
            Exit::Failed
        }
    }
}

fn acquire_raw_mode() -> Option<RawModeGuard> {
    match RawModeGuard::acquire() {
        Ok(guard) => Some(guard),
        Err(e) => {
            log::warn!("could not put the terminal in raw mode: {}", e);
            None
        }
    }
}

fn dump_state<C: Console>(cpu: &Cpu<C>, path: &Path) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(&cpu.snapshot())?;
    std::fs::write(path, json)
}
