//! Console devices for the LC-3.
//!
//! The CPU talks to the outside world only through the [`Console`] trait:
//! trap routines read and write characters, and the keyboard status register
//! polls for pending input. Three implementations are provided:
//! - [`TerminalConsole`]: an interactive terminal in raw mode (crossterm)
//! - [`StdioConsole`]: plain stdin/stdout, for piped input
//! - [`BufferConsole`]: in-memory queues, for embedding and tests

mod buffer;
mod stdio;
mod terminal;

pub use buffer::BufferConsole;
pub use stdio::StdioConsole;
pub use terminal::{RawModeGuard, TerminalConsole};

use thiserror::Error;

/// A character console.
pub trait Console {
    /// Non-blocking check for a pending input character.
    fn key_available(&mut self) -> Result<bool, ConsoleError>;

    /// Blocking read of one input character, without echo.
    fn read_char(&mut self) -> Result<u8, ConsoleError>;

    /// Write one character.
    fn write_char(&mut self, ch: u8) -> Result<(), ConsoleError>;

    /// Flush buffered output.
    fn flush(&mut self) -> Result<(), ConsoleError>;

    /// Non-blocking check for a user interrupt, made between instructions.
    ///
    /// Consoles that cannot be interrupted keep the default.
    fn poll_interrupt(&mut self) -> Result<bool, ConsoleError> {
        Ok(false)
    }

    /// Write every byte of `s`.
    fn write_str(&mut self, s: &str) -> Result<(), ConsoleError> {
        for &b in s.as_bytes() {
            self.write_char(b)?;
        }
        Ok(())
    }
}

/// Errors that can occur during console I/O.
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("console I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("interrupted")]
    Interrupted,

    #[error("end of input")]
    EndOfInput,
}
