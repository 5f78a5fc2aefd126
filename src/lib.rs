//! # LC-3 Emulator
//!
//! An emulator for the LC-3, a 16-bit educational computer.
//!
//! Object images are loaded into a 64K-word memory and executed one
//! instruction at a time until the program halts. Console I/O goes through
//! the [`Console`] trait, so the same machine runs against a real terminal,
//! piped stdio, or in-memory buffers.

pub mod cpu;
pub mod console;
pub mod image;

// Re-export commonly used types
pub use cpu::{Cpu, CpuState, CpuError, Memory, Registers, Condition, Instruction, RunOutcome, Snapshot};
pub use console::{Console, ConsoleError, BufferConsole, StdioConsole, TerminalConsole, RawModeGuard};
pub use image::{load_image, load_image_file, ImageError, LoadedImage};
