//! CPU execution engine for the LC-3.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.

use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::console::{Console, ConsoleError};
use crate::cpu::{Memory, Registers};
use crate::cpu::decode::{self, Instruction, Operand, DecodeError};
use crate::cpu::registers::{LINK_REGISTER, PC_START};
use crate::image::{self, ImageError, LoadedImage};

/// Instructions executed between two [`Console::poll_interrupt`] calls.
pub const INTERRUPT_POLL_INTERVAL: u64 = 1024;

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU has halted (executed the HALT trap).
    Halted,
    /// CPU executed a reserved opcode.
    Fatal,
}

/// Why a run stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The program executed the HALT trap.
    Halted,
    /// The stop flag was raised.
    Interrupted,
    /// The cycle budget was used up.
    CycleLimit,
}

/// Machine state captured for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub state: CpuState,
    pub cycles: u64,
    pub registers: Registers,
}

/// The LC-3 CPU.
pub struct Cpu<C> {
    /// CPU registers.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Current execution state.
    pub state: CpuState,
    /// Instruction count.
    pub cycles: u64,
    console: C,
}

impl<C: Console> Cpu<C> {
    /// Create a CPU in its boot state attached to `console`.
    pub fn new(console: C) -> Self {
        Self {
            regs: Registers::new(),
            mem: Memory::new(),
            state: CpuState::Running,
            cycles: 0,
            console,
        }
    }

    /// Store raw words at the boot address.
    pub fn load_program(&mut self, program: &[u16]) -> usize {
        self.mem.load_words(PC_START, program)
    }

    /// Load an object image from a byte stream.
    pub fn load_image<R: Read>(&mut self, reader: R) -> Result<LoadedImage, ImageError> {
        image::load_image(reader, &mut self.mem)
    }

    /// Load an object image file.
    pub fn load_image_file<P: AsRef<Path>>(&mut self, path: P) -> Result<LoadedImage, ImageError> {
        image::load_image_file(path, &mut self.mem)
    }

    /// Execute a single instruction.
    ///
    /// Returns the instruction that was executed, or an error. Reserved
    /// opcodes move the CPU to [`CpuState::Fatal`].
    pub fn step(&mut self) -> Result<Instruction, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }

        // Fetch, then advance PC before anything computes a PC-relative address.
        let pc = self.regs.pc;
        let raw = self.load(pc)?;
        self.regs.advance_pc();

        let instr = match decode::decode(raw) {
            Ok(instr) => instr,
            Err(e) => {
                self.state = CpuState::Fatal;
                return Err(e.into());
            }
        };

        log::trace!("{:#06x}: {:#06x} {:?} cond={:?}", pc, raw, instr, self.regs.cond);

        self.execute(instr, pc)?;

        self.cycles += 1;

        Ok(instr)
    }

    /// Run until halt, error, or until `stop` is raised.
    ///
    /// `stop` is checked between instructions, and the console is asked for a
    /// pending interrupt every [`INTERRUPT_POLL_INTERVAL`] instructions. A
    /// console read cut short by the user also ends the run with
    /// [`RunOutcome::Interrupted`]. Every interrupt path leaves `stop` raised.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<RunOutcome, CpuError> {
        self.drive(None, stop)
    }

    /// Run for at most `max_cycles` instructions.
    pub fn run_limited(&mut self, max_cycles: u64, stop: &AtomicBool) -> Result<RunOutcome, CpuError> {
        self.drive(Some(max_cycles), stop)
    }

    fn drive(&mut self, max_cycles: Option<u64>, stop: &AtomicBool) -> Result<RunOutcome, CpuError> {
        let start_cycles = self.cycles;
        let limit = max_cycles.map(|max| self.cycles.saturating_add(max));

        let outcome = loop {
            if self.state == CpuState::Halted {
                break Ok(RunOutcome::Halted);
            }
            if stop.load(Ordering::SeqCst) {
                break Ok(RunOutcome::Interrupted);
            }
            if limit.is_some_and(|limit| self.cycles >= limit) {
                break Ok(RunOutcome::CycleLimit);
            }
            if self.cycles % INTERRUPT_POLL_INTERVAL == 0 {
                match self.console.poll_interrupt() {
                    Ok(false) => {}
                    Ok(true) => {
                        stop.store(true, Ordering::SeqCst);
                        break Ok(RunOutcome::Interrupted);
                    }
                    Err(e) => break Err(CpuError::from(e)),
                }
            }

            match self.step() {
                Ok(_) => {}
                Err(CpuError::Console(ConsoleError::Interrupted)) => {
                    stop.store(true, Ordering::SeqCst);
                    break Ok(RunOutcome::Interrupted);
                }
                Err(e) => break Err(e),
            }
        };

        // An engine error takes precedence over a failed flush.
        let flushed = self.console.flush();
        let outcome = outcome?;
        flushed?;

        log::info!("{:?} after {} cycles", outcome, self.cycles - start_cycles);
        Ok(outcome)
    }

    /// Execute a decoded instruction fetched from `pc`.
    fn execute(&mut self, instr: Instruction, pc: u16) -> Result<(), CpuError> {
        match instr {
            // ==================== Operate ====================

            Instruction::Add { dr, sr1, operand } => {
                let result = self.regs.get(sr1).wrapping_add(self.operand(operand));
                self.regs.set_with_flags(dr, result);
            }

            Instruction::And { dr, sr1, operand } => {
                let result = self.regs.get(sr1) & self.operand(operand);
                self.regs.set_with_flags(dr, result);
            }

            Instruction::Not { dr, sr } => {
                let result = !self.regs.get(sr);
                self.regs.set_with_flags(dr, result);
            }

            // ==================== Data Movement ====================

            Instruction::Ld { dr, offset } => {
                let value = self.load(self.regs.pc_relative(offset))?;
                self.regs.set_with_flags(dr, value);
            }

            Instruction::Ldi { dr, offset } => {
                let pointer = self.load(self.regs.pc_relative(offset))?;
                let value = self.load(pointer)?;
                self.regs.set_with_flags(dr, value);
            }

            Instruction::Ldr { dr, base, offset } => {
                let value = self.load(self.regs.base_relative(base, offset))?;
                self.regs.set_with_flags(dr, value);
            }

            Instruction::Lea { dr, offset } => {
                let addr = self.regs.pc_relative(offset);
                self.regs.set_with_flags(dr, addr);
            }

            Instruction::St { sr, offset } => {
                self.mem.write(self.regs.pc_relative(offset), self.regs.get(sr));
            }

            Instruction::Sti { sr, offset } => {
                let addr = self.load(self.regs.pc_relative(offset))?;
                self.mem.write(addr, self.regs.get(sr));
            }

            Instruction::Str { sr, base, offset } => {
                self.mem.write(self.regs.base_relative(base, offset), self.regs.get(sr));
            }

            // ==================== Control ====================

            Instruction::Br { mask, offset } => {
                if self.regs.cond.bits() & mask != 0 {
                    let target = self.regs.pc_relative(offset);
                    self.regs.jump(target);
                }
            }

            Instruction::Jmp { base } => {
                self.regs.jump(self.regs.get(base));
            }

            Instruction::Jsr { offset } => {
                self.regs.r[LINK_REGISTER] = self.regs.pc;
                let target = self.regs.pc_relative(offset);
                self.regs.jump(target);
            }

            Instruction::Jsrr { base } => {
                // The base register is read after the link is written, so JSRR R7
                // continues at the return address.
                self.regs.r[LINK_REGISTER] = self.regs.pc;
                self.regs.jump(self.regs.get(base));
            }

            Instruction::Trap { vector } => {
                self.regs.r[LINK_REGISTER] = self.regs.pc;
                self.trap(vector)?;
            }

            // ==================== Reserved ====================

            Instruction::Rti | Instruction::Res => {
                self.state = CpuState::Fatal;
                return Err(CpuError::ReservedOpcode {
                    opcode: decode::encode(&instr) >> 12,
                    pc,
                });
            }
        }

        Ok(())
    }

    fn operand(&self, operand: Operand) -> u16 {
        match operand {
            Operand::Register(sr2) => self.regs.get(sr2),
            Operand::Immediate(imm) => imm,
        }
    }

    /// Read memory, letting the keyboard registers talk to the console.
    pub(crate) fn load(&mut self, addr: u16) -> Result<u16, CpuError> {
        Ok(self.mem.read(addr, &mut self.console)?)
    }

    pub(crate) fn console_mut(&mut self) -> &mut C {
        &mut self.console
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    /// Capture registers, state and cycle count.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state,
            cycles: self.cycles,
            registers: self.regs.clone(),
        }
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

impl<C> std::fmt::Debug for Cpu<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("reserved opcode {opcode:#06b} at {pc:#06x}")]
    ReservedOpcode { opcode: u16, pc: u16 },

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("console error: {0}")]
    Console(#[from] ConsoleError),
}
