//! LC-3 CPU registers.
//!
//! The LC-3 has:
//! - R0-R7: eight 16-bit general purpose registers (R7 doubles as the link register)
//! - PC: 16-bit program counter
//! - COND: condition register holding exactly one of N, Z or P

use serde::{Serialize, Deserialize};

/// Number of general purpose registers.
pub const REGISTER_COUNT: usize = 8;

/// Index of the link register written by JSR, JSRR and TRAP.
pub const LINK_REGISTER: usize = 7;

/// Address execution starts from after boot.
pub const PC_START: u16 = 0x3000;

/// The condition register.
///
/// The discriminants match the n/z/p bit positions used by BR, so a branch
/// is taken when `cond.bits() & mask != 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    /// Last result was greater than zero.
    Positive = 0b001,
    /// Last result was zero.
    Zero = 0b010,
    /// Last result had bit 15 set.
    Negative = 0b100,
}

impl Condition {
    /// Classify a 16-bit value by its two's complement sign.
    pub fn from_value(value: u16) -> Self {
        if value == 0 {
            Condition::Zero
        } else if value >> 15 == 1 {
            Condition::Negative
        } else {
            Condition::Positive
        }
    }

    /// The n/z/p bit for this condition.
    #[inline]
    pub fn bits(self) -> u16 {
        self as u16
    }
}

/// The LC-3 register file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// R0-R7
    pub r: [u16; REGISTER_COUNT],

    /// Program counter
    pub pc: u16,

    /// Condition register
    pub cond: Condition,
}

impl Registers {
    /// Create a register file in its boot state.
    pub fn new() -> Self {
        Self {
            r: [0; REGISTER_COUNT],
            pc: PC_START,
            cond: Condition::Zero,
        }
    }

    /// Read a general purpose register. Only the low three bits of `index` are used.
    #[inline]
    pub fn get(&self, index: u8) -> u16 {
        self.r[(index & 0x7) as usize]
    }

    /// Write a general purpose register without touching the flags.
    #[inline]
    pub fn set(&mut self, index: u8, value: u16) {
        self.r[(index & 0x7) as usize] = value;
    }

    /// Write a register and update the condition register from the new value.
    pub fn set_with_flags(&mut self, index: u8, value: u16) {
        self.set(index, value);
        self.set_flags_from(value);
    }

    /// Set the condition register from a value's sign.
    pub fn set_flags_from(&mut self, value: u16) {
        self.cond = Condition::from_value(value);
    }

    /// Increment the program counter by 1, wrapping at the top of memory.
    /// Returns the old value.
    pub fn advance_pc(&mut self) -> u16 {
        let old = self.pc;
        self.pc = self.pc.wrapping_add(1);
        old
    }

    /// Set the program counter to an absolute address.
    pub fn jump(&mut self, addr: u16) {
        self.pc = addr;
    }

    /// PC-relative effective address: the (already incremented) PC plus a
    /// sign-extended offset, modulo 2^16.
    #[inline]
    pub fn pc_relative(&self, offset: u16) -> u16 {
        self.pc.wrapping_add(offset)
    }

    /// Base-plus-offset effective address.
    #[inline]
    pub fn base_relative(&self, base: u8, offset: u16) -> u16 {
        self.get(base).wrapping_add(offset)
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}
