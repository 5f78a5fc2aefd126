//! LC-3 memory subsystem.
//!
//! A single 65536-word address space shared by code and data. Two addresses
//! are mapped onto the keyboard: reading the status register polls the
//! console and latches any pending character into the data register.

use crate::console::{Console, ConsoleError};

/// The number of memory cells in the LC-3.
pub const MEMORY_SIZE: usize = 1 << 16;

/// Keyboard status register. Bit 15 is set when a key is available.
pub const KBSR: u16 = 0xFE00;

/// Keyboard data register. Holds the last character latched by a KBSR read.
pub const KBDR: u16 = 0xFE02;

/// Value of KBSR when a character is waiting in KBDR.
pub const KBSR_READY: u16 = 1 << 15;

/// LC-3 memory: 65536 sixteen-bit cells.
#[derive(Clone)]
pub struct Memory {
    cells: Vec<u16>,
}

impl Memory {
    /// Create a new memory with all cells zeroed.
    pub fn new() -> Self {
        Self {
            cells: vec![0; MEMORY_SIZE],
        }
    }

    /// Read a cell, servicing the keyboard status register.
    ///
    /// Reading [`KBSR`] polls the console without blocking. If a key is
    /// waiting it is consumed and stored in [`KBDR`]; KBSR then reads as
    /// [`KBSR_READY`], otherwise as zero.
    pub fn read<C: Console + ?Sized>(&mut self, addr: u16, console: &mut C) -> Result<u16, ConsoleError> {
        if addr == KBSR {
            if console.key_available()? {
                let ch = console.read_char()?;
                self.cells[KBSR as usize] = KBSR_READY;
                self.cells[KBDR as usize] = u16::from(ch);
            } else {
                self.cells[KBSR as usize] = 0;
            }
        }
        Ok(self.cells[addr as usize])
    }

    /// Read a cell without any device side effects.
    #[inline]
    pub fn peek(&self, addr: u16) -> u16 {
        self.cells[addr as usize]
    }

    /// Write a cell.
    ///
    /// Stores to the keyboard registers are plain stores; they do not reach
    /// the console.
    #[inline]
    pub fn write(&mut self, addr: u16, value: u16) {
        self.cells[addr as usize] = value;
    }

    /// Store `words` consecutively starting at `origin`.
    ///
    /// Words that would land past the end of the address space are dropped.
    /// Returns the number of words actually stored.
    pub fn load_words(&mut self, origin: u16, words: &[u16]) -> usize {
        let start = origin as usize;
        let count = words.len().min(MEMORY_SIZE - start);
        self.cells[start..start + count].copy_from_slice(&words[..count]);
        count
    }

    /// Dump memory contents (for debugging).
    pub fn dump(&self, start: u16, count: usize) -> Vec<(u16, u16)> {
        let start = start as usize;
        let end = (start + count).min(MEMORY_SIZE);
        (start..end)
            .map(|i| (i as u16, self.cells[i]))
            .collect()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.cells.iter().filter(|&&cell| cell != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &MEMORY_SIZE)
            .finish()
    }
}
