//! Interactive terminal console.

use std::collections::VecDeque;
use std::io::{self, Stdout, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;

use super::{Console, ConsoleError};

/// How long a blocking read waits for an event before rechecking the interrupt flag.
const READ_POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// Holds the terminal in raw mode for as long as it is alive.
///
/// Raw mode turns off echo and line buffering so single key presses reach
/// the emulated keyboard immediately. The previous mode is restored on drop,
/// whichever way the run ends.
#[must_use = "raw mode is released as soon as the guard is dropped"]
pub struct RawModeGuard {
    _private: (),
}

impl RawModeGuard {
    pub fn acquire() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        log::debug!("terminal raw mode enabled");
        Ok(Self { _private: () })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        match terminal::disable_raw_mode() {
            Ok(()) => log::debug!("terminal raw mode restored"),
            Err(e) => log::error!("failed to restore terminal mode: {}", e),
        }
    }
}

/// A console on the controlling terminal, read through crossterm events.
///
/// Expects the terminal to be in raw mode (see [`RawModeGuard`]). In raw mode
/// Ctrl-C arrives as a key press instead of a signal; it raises the shared
/// interrupt flag and is never delivered to the program. Keys typed while the
/// program is busy are queued until it asks for them.
pub struct TerminalConsole {
    out: Stdout,
    pending: VecDeque<u8>,
    interrupt: Arc<AtomicBool>,
}

impl TerminalConsole {
    pub fn new(interrupt: Arc<AtomicBool>) -> Self {
        Self {
            out: io::stdout(),
            pending: VecDeque::new(),
            interrupt,
        }
    }

    fn interrupted(&self) -> bool {
        self.interrupt.load(Ordering::SeqCst)
    }

    /// Move every event that is already waiting into `pending`, stopping at Ctrl-C.
    fn drain_events(&mut self) -> Result<(), ConsoleError> {
        while !self.interrupted() && event::poll(Duration::ZERO)? {
            match self.translate(event::read()?) {
                Ok(Some(byte)) => self.pending.push_back(byte),
                Ok(None) => {}
                Err(ConsoleError::Interrupted) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Translate one terminal event. Returns `Err(Interrupted)` for Ctrl-C.
    fn translate(&self, ev: Event) -> Result<Option<u8>, ConsoleError> {
        let Event::Key(key) = ev else {
            return Ok(None);
        };

        if is_interrupt(&key) {
            self.interrupt.store(true, Ordering::SeqCst);
            return Err(ConsoleError::Interrupted);
        }

        Ok(key_to_byte(&key))
    }
}

impl Console for TerminalConsole {
    fn key_available(&mut self) -> Result<bool, ConsoleError> {
        // After Ctrl-C the run loop stops before the next fetch.
        if self.pending.is_empty() {
            self.drain_events()?;
        }
        Ok(!self.pending.is_empty())
    }

    fn read_char(&mut self) -> Result<u8, ConsoleError> {
        self.out.flush()?;

        loop {
            if self.interrupted() {
                return Err(ConsoleError::Interrupted);
            }
            if let Some(byte) = self.pending.pop_front() {
                return Ok(byte);
            }
            if event::poll(READ_POLL_TIMEOUT)? {
                if let Some(byte) = self.translate(event::read()?)? {
                    return Ok(byte);
                }
            }
        }
    }

    fn write_char(&mut self, ch: u8) -> Result<(), ConsoleError> {
        // Raw mode disables output post-processing, so supply the carriage return.
        if ch == b'\n' {
            self.out.write_all(b"\r\n")?;
        } else {
            self.out.write_all(&[ch])?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ConsoleError> {
        self.out.flush()?;
        Ok(())
    }

    fn poll_interrupt(&mut self) -> Result<bool, ConsoleError> {
        self.drain_events()?;
        Ok(self.interrupted())
    }
}

fn is_interrupt(key: &KeyEvent) -> bool {
    key.kind != KeyEventKind::Release
        && key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C'))
}

/// Map a key press to the byte a cooked terminal would have produced.
fn key_to_byte(key: &KeyEvent) -> Option<u8> {
    if key.kind == KeyEventKind::Release {
        return None;
    }

    match key.code {
        KeyCode::Char(c) if c.is_ascii() => {
            let byte = c as u8;
            if key.modifiers.contains(KeyModifiers::CONTROL) && byte.is_ascii_alphabetic() {
                Some(byte.to_ascii_lowercase() & 0x1F)
            } else {
                Some(byte)
            }
        }
        KeyCode::Enter => Some(b'\n'),
        KeyCode::Tab => Some(b'\t'),
        KeyCode::Backspace => Some(0x7F),
        KeyCode::Esc => Some(0x1B),
        _ => None,
    }
}
