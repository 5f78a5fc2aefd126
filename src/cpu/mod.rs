//! CPU emulation for the LC-3.
//!
//! This module implements the complete LC-3 architecture:
//! - 65536 sixteen-bit memory cells with a memory-mapped keyboard
//! - 8 general purpose registers, PC and an N/Z/P condition register
//! - 16 opcodes, with TRAP serviced natively for console I/O

pub mod memory;
pub mod registers;
pub mod decode;
pub mod execute;
pub mod trap;

pub use memory::Memory;
pub use registers::{Condition, Registers};
pub use decode::{Instruction, Operand, DecodeError};
pub use execute::{Cpu, CpuError, CpuState, RunOutcome, Snapshot, INTERRUPT_POLL_INTERVAL};
pub use trap::TrapVector;
