//! Instruction decoder for the LC-3.
//!
//! Every instruction is a single 16-bit word. The top four bits select one
//! of sixteen opcodes; the low twelve bits are operand fields whose layout
//! depends on the opcode.

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Second source operand of ADD and AND.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    /// Register mode (bit 5 clear): the value of a register.
    Register(u8),
    /// Immediate mode (bit 5 set): a sign-extended 5-bit constant.
    Immediate(u16),
}

/// Decoded LC-3 instruction.
///
/// Offsets and immediates are stored already sign-extended to 16 bits, so
/// effective-address arithmetic is a single wrapping add.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    // ==================== Operate ====================

    /// DR := SR1 + operand
    Add { dr: u8, sr1: u8, operand: Operand },

    /// DR := SR1 & operand
    And { dr: u8, sr1: u8, operand: Operand },

    /// DR := !SR
    Not { dr: u8, sr: u8 },

    // ==================== Data Movement ====================

    /// DR := mem[PC + offset9]
    Ld { dr: u8, offset: u16 },

    /// DR := mem[mem[PC + offset9]]
    Ldi { dr: u8, offset: u16 },

    /// DR := mem[BaseR + offset6]
    Ldr { dr: u8, base: u8, offset: u16 },

    /// DR := PC + offset9
    Lea { dr: u8, offset: u16 },

    /// mem[PC + offset9] := SR
    St { sr: u8, offset: u16 },

    /// mem[mem[PC + offset9]] := SR
    Sti { sr: u8, offset: u16 },

    /// mem[BaseR + offset6] := SR
    Str { sr: u8, base: u8, offset: u16 },

    // ==================== Control ====================

    /// Conditional branch. `mask` holds the n/z/p bits (11:9) in the low three bits.
    Br { mask: u16, offset: u16 },

    /// PC := BaseR. RET is `Jmp { base: 7 }`.
    Jmp { base: u8 },

    /// R7 := PC; PC := PC + offset11
    Jsr { offset: u16 },

    /// R7 := PC; PC := BaseR
    Jsrr { base: u8 },

    /// R7 := PC; service the trap vector.
    Trap { vector: u8 },

    // ==================== Reserved ====================

    /// Return from interrupt. Not supported outside supervisor mode.
    Rti,

    /// Reserved opcode 1101.
    Res,
}

/// Opcode values (instruction bits 15:12).
struct Opcode;

impl Opcode {
    const BR: u16 = 0b0000;
    const ADD: u16 = 0b0001;
    const LD: u16 = 0b0010;
    const ST: u16 = 0b0011;
    const JSR: u16 = 0b0100;
    const AND: u16 = 0b0101;
    const LDR: u16 = 0b0110;
    const STR: u16 = 0b0111;
    const RTI: u16 = 0b1000;
    const NOT: u16 = 0b1001;
    const LDI: u16 = 0b1010;
    const STI: u16 = 0b1011;
    const JMP: u16 = 0b1100;
    const RES: u16 = 0b1101;
    const LEA: u16 = 0b1110;
    const TRAP: u16 = 0b1111;
}

/// Sign-extend the low `bit_count` bits of `value` to 16 bits.
///
/// Bits above `bit_count` in the input are ignored. `bit_count` must be in
/// `1..=16`.
pub fn sign_extend(value: u16, bit_count: u32) -> u16 {
    debug_assert!((1..=16).contains(&bit_count), "bit count {} out of range", bit_count);
    if bit_count >= 16 {
        return value;
    }

    let value = value & ((1 << bit_count) - 1);
    if (value >> (bit_count - 1)) & 1 == 1 {
        value | (0xFFFF << bit_count)
    } else {
        value
    }
}

/// Extract a three-bit register field whose lowest bit is at `shift`.
#[inline]
fn reg(word: u16, shift: u32) -> u8 {
    ((word >> shift) & 0x7) as u8
}

/// Decode a 16-bit instruction word.
///
/// The instruction formats are:
/// - Bits 15-12: opcode
/// - Bits 11-9: DR/SR or n/z/p
/// - Bits 8-6: SR1/BaseR
/// - Bits 5-0: mode bit and immediate/offset/SR2, or a wider PC offset
pub fn decode(word: u16) -> Result<Instruction, DecodeError> {
    let op = word >> 12;
    let dr = reg(word, 9);
    let sr1 = reg(word, 6);
    let offset6 = sign_extend(word, 6);
    let offset9 = sign_extend(word, 9);

    let operand = if (word >> 5) & 1 == 1 {
        Operand::Immediate(sign_extend(word, 5))
    } else {
        Operand::Register(reg(word, 0))
    };

    let instruction = match op {
        Opcode::BR => Instruction::Br { mask: (word >> 9) & 0x7, offset: offset9 },
        Opcode::ADD => Instruction::Add { dr, sr1, operand },
        Opcode::LD => Instruction::Ld { dr, offset: offset9 },
        Opcode::ST => Instruction::St { sr: dr, offset: offset9 },
        Opcode::JSR => {
            if (word >> 11) & 1 == 1 {
                Instruction::Jsr { offset: sign_extend(word, 11) }
            } else {
                Instruction::Jsrr { base: sr1 }
            }
        }
        Opcode::AND => Instruction::And { dr, sr1, operand },
        Opcode::LDR => Instruction::Ldr { dr, base: sr1, offset: offset6 },
        Opcode::STR => Instruction::Str { sr: dr, base: sr1, offset: offset6 },
        Opcode::RTI => Instruction::Rti,
        Opcode::NOT => Instruction::Not { dr, sr: sr1 },
        Opcode::LDI => Instruction::Ldi { dr, offset: offset9 },
        Opcode::STI => Instruction::Sti { sr: dr, offset: offset9 },
        Opcode::JMP => Instruction::Jmp { base: sr1 },
        Opcode::RES => Instruction::Res,
        Opcode::LEA => Instruction::Lea { dr, offset: offset9 },
        Opcode::TRAP => Instruction::Trap { vector: (word & 0xFF) as u8 },
        _ => return Err(DecodeError::InvalidOpcode(op)),
    };

    Ok(instruction)
}

/// Encode an instruction back to a 16-bit word.
///
/// Offsets are truncated to their field width; unused bits are zero.
pub fn encode(instr: &Instruction) -> u16 {
    fn r(index: u8, shift: u32) -> u16 {
        u16::from(index & 0x7) << shift
    }

    fn operate(op: u16, dr: u8, sr1: u8, operand: Operand) -> u16 {
        let low = match operand {
            Operand::Register(sr2) => r(sr2, 0),
            Operand::Immediate(imm) => (1 << 5) | (imm & 0x1F),
        };
        (op << 12) | r(dr, 9) | r(sr1, 6) | low
    }

    match *instr {
        Instruction::Add { dr, sr1, operand } => operate(Opcode::ADD, dr, sr1, operand),
        Instruction::And { dr, sr1, operand } => operate(Opcode::AND, dr, sr1, operand),
        Instruction::Not { dr, sr } => (Opcode::NOT << 12) | r(dr, 9) | r(sr, 6) | 0x3F,
        Instruction::Ld { dr, offset } => (Opcode::LD << 12) | r(dr, 9) | (offset & 0x1FF),
        Instruction::Ldi { dr, offset } => (Opcode::LDI << 12) | r(dr, 9) | (offset & 0x1FF),
        Instruction::Ldr { dr, base, offset } => {
            (Opcode::LDR << 12) | r(dr, 9) | r(base, 6) | (offset & 0x3F)
        }
        Instruction::Lea { dr, offset } => (Opcode::LEA << 12) | r(dr, 9) | (offset & 0x1FF),
        Instruction::St { sr, offset } => (Opcode::ST << 12) | r(sr, 9) | (offset & 0x1FF),
        Instruction::Sti { sr, offset } => (Opcode::STI << 12) | r(sr, 9) | (offset & 0x1FF),
        Instruction::Str { sr, base, offset } => {
            (Opcode::STR << 12) | r(sr, 9) | r(base, 6) | (offset & 0x3F)
        }
        Instruction::Br { mask, offset } => (Opcode::BR << 12) | ((mask & 0x7) << 9) | (offset & 0x1FF),
        Instruction::Jmp { base } => (Opcode::JMP << 12) | r(base, 6),
        Instruction::Jsr { offset } => (Opcode::JSR << 12) | (1 << 11) | (offset & 0x7FF),
        Instruction::Jsrr { base } => (Opcode::JSR << 12) | r(base, 6),
        Instruction::Trap { vector } => (Opcode::TRAP << 12) | u16::from(vector),
        Instruction::Rti => Opcode::RTI << 12,
        Instruction::Res => Opcode::RES << 12,
    }
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid opcode: {0:#x}")]
    InvalidOpcode(u16),
}
