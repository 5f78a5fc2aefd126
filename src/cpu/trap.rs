//! Trap service routines.
//!
//! TRAP instructions name one of six console services by an 8-bit vector.
//! They are serviced directly by the emulator rather than by routines in
//! emulated memory.

use serde::{Serialize, Deserialize};

use crate::console::Console;
use crate::cpu::execute::{Cpu, CpuError, CpuState};
use crate::cpu::memory::MEMORY_SIZE;

/// Prompt printed by the IN trap.
pub const IN_PROMPT: &str = "Enter a character: ";

/// Notice printed by the HALT trap.
pub const HALT_NOTICE: &str = "HALT\n";

/// Recognized trap vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TrapVector {
    /// Read a character into R0, no echo.
    Getc = 0x20,
    /// Write the character in R0.
    Out = 0x21,
    /// Write the zero-terminated string at R0, one character per word.
    Puts = 0x22,
    /// Prompt, read and echo a character into R0.
    In = 0x23,
    /// Write the zero-terminated string at R0, two characters per word.
    Putsp = 0x24,
    /// Stop the machine.
    Halt = 0x25,
}

impl TrapVector {
    pub fn from_u8(vector: u8) -> Option<Self> {
        match vector {
            0x20 => Some(TrapVector::Getc),
            0x21 => Some(TrapVector::Out),
            0x22 => Some(TrapVector::Puts),
            0x23 => Some(TrapVector::In),
            0x24 => Some(TrapVector::Putsp),
            0x25 => Some(TrapVector::Halt),
            _ => None,
        }
    }
}

impl<C: Console> Cpu<C> {
    /// Service a trap. Unknown vectors are ignored.
    pub(crate) fn trap(&mut self, vector: u8) -> Result<(), CpuError> {
        let Some(service) = TrapVector::from_u8(vector) else {
            log::debug!("ignoring unknown trap vector {:#04x}", vector);
            return Ok(());
        };

        match service {
            TrapVector::Getc => {
                let ch = self.console_mut().read_char()?;
                self.regs.set_with_flags(0, u16::from(ch));
            }

            TrapVector::Out => {
                let ch = self.regs.get(0) as u8;
                let console = self.console_mut();
                console.write_char(ch)?;
                console.flush()?;
            }

            TrapVector::Puts => {
                let mut addr = self.regs.get(0);
                for _ in 0..MEMORY_SIZE {
                    let word = self.mem.peek(addr);
                    if word == 0 {
                        break;
                    }
                    self.console_mut().write_char(word as u8)?;
                    addr = addr.wrapping_add(1);
                }
                self.console_mut().flush()?;
            }

            TrapVector::In => {
                let console = self.console_mut();
                console.write_str(IN_PROMPT)?;
                console.flush()?;
                let ch = console.read_char()?;
                console.write_char(ch)?;
                console.flush()?;
                self.regs.set_with_flags(0, u16::from(ch));
            }

            TrapVector::Putsp => {
                let mut addr = self.regs.get(0);
                for _ in 0..MEMORY_SIZE {
                    let word = self.mem.peek(addr);
                    let low = (word & 0xFF) as u8;
                    if low == 0 {
                        break;
                    }
                    self.console_mut().write_char(low)?;
                    let high = (word >> 8) as u8;
                    if high != 0 {
                        self.console_mut().write_char(high)?;
                    }
                    addr = addr.wrapping_add(1);
                }
                self.console_mut().flush()?;
            }

            TrapVector::Halt => {
                let console = self.console_mut();
                console.write_str(HALT_NOTICE)?;
                console.flush()?;
                self.state = CpuState::Halted;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::{BufferConsole, ConsoleError};
    use crate::cpu::registers::{Condition, LINK_REGISTER};

    fn trap_cpu(vector: u8, input: &[u8]) -> Cpu<BufferConsole> {
        let mut cpu = Cpu::new(BufferConsole::with_input(input));
        cpu.load_program(&[0xF000 | u16::from(vector)]);
        cpu
    }

    fn store_string(cpu: &mut Cpu<BufferConsole>, addr: u16, words: &[u16]) {
        cpu.mem.load_words(addr, words);
        cpu.regs.set(0, addr);
    }

    #[test]
    fn test_getc() {
        let mut cpu = trap_cpu(0x20, b"z");
        cpu.step().unwrap();

        assert_eq!(cpu.regs.get(0), u16::from(b'z'));
        assert_eq!(cpu.regs.cond, Condition::Positive);
        assert!(cpu.console().output().is_empty());
        assert_eq!(cpu.regs.r[LINK_REGISTER], 0x3001);
    }

    #[test]
    fn test_getc_without_input() {
        let mut cpu = trap_cpu(0x20, b"");
        assert!(matches!(
            cpu.step(),
            Err(CpuError::Console(ConsoleError::EndOfInput))
        ));
    }

    #[test]
    fn test_out() {
        let mut cpu = trap_cpu(0x21, b"");
        cpu.regs.set(0, 0x0141); // only the low byte is written
        cpu.regs.cond = Condition::Negative;
        cpu.step().unwrap();

        assert_eq!(cpu.console().output(), b"A");
        assert_eq!(cpu.regs.cond, Condition::Negative);
    }

    #[test]
    fn test_puts_stops_at_zero() {
        let mut cpu = trap_cpu(0x22, b"");
        store_string(&mut cpu, 0x4000, &[0x48, 0x69, 0x00, 0x21]);
        cpu.step().unwrap();

        assert_eq!(cpu.console().output_string(), "Hi");
    }

    #[test]
    fn test_in_prompts_and_echoes() {
        let mut cpu = trap_cpu(0x23, b"q");
        cpu.step().unwrap();

        assert_eq!(cpu.console().output_string(), "Enter a character: q");
        assert_eq!(cpu.regs.get(0), u16::from(b'q'));
        assert_eq!(cpu.regs.cond, Condition::Positive);
    }

    #[test]
    fn test_putsp_packed() {
        let mut cpu = trap_cpu(0x24, b"");
        // "Hello" packed low byte first, odd length leaves a zero high byte.
        store_string(&mut cpu, 0x4000, &[0x6548, 0x6C6C, 0x006F, 0x0000, 0x4141]);
        cpu.step().unwrap();

        assert_eq!(cpu.console().output_string(), "Hello");
    }

    #[test]
    fn test_putsp_stops_at_zero_low_byte() {
        let mut cpu = trap_cpu(0x24, b"");
        store_string(&mut cpu, 0x4000, &[0x4241, 0x4300, 0x4444]);
        cpu.step().unwrap();

        assert_eq!(cpu.console().output_string(), "AB");
    }

    #[test]
    fn test_halt() {
        let mut cpu = trap_cpu(0x25, b"");
        cpu.step().unwrap();

        assert!(cpu.is_halted());
        assert_eq!(cpu.console().output_string(), HALT_NOTICE);
    }

    #[test]
    fn test_unknown_vector_is_ignored() {
        let mut cpu = trap_cpu(0x30, b"");
        cpu.step().unwrap();

        assert!(cpu.is_running());
        assert_eq!(cpu.regs.pc, 0x3001);
        assert_eq!(cpu.regs.r[LINK_REGISTER], 0x3001);
        assert!(cpu.console().output().is_empty());
    }

    #[test]
    fn test_vector_lookup() {
        assert_eq!(TrapVector::from_u8(0x25), Some(TrapVector::Halt));
        assert_eq!(TrapVector::from_u8(0x1F), None);
        assert_eq!(TrapVector::Putsp as u8, 0x24);
    }
}
