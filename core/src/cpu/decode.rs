//! Structural opcode decoding. The primary and CB-prefixed tables are both
//! built from regular 2-2-3-3 bit fields (`yy xxx zzz`/`xx yyy zzz`); rather
//! than writing out 256 (or 256 again for CB) hand-matched opcodes, the
//! regular blocks are reconstructed from the `y`/`z` fields they're built
//! from and only the irregular rows are matched explicitly in `ops.rs`.

use super::registers::{Reg16, Reg8};

#[derive(Debug, Copy, Clone)]
pub enum Operand8 {
    Reg(Reg8),
    Immediate,
    IndirectHL,
    IndirectBC,
    IndirectDE,
    IndirectImmediate,
    IndirectC,
    IndirectImmediateHigh,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum JumpCondition {
    NotZero,
    Zero,
    NotCarry,
    Carry,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AluOp {
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Xor,
    Or,
    Cp,
}

/// The `zzz`/`yyy` field (bits 0..=2) of an opcode, read as an 8-bit operand.
/// `110` (`(HL)`) is folded in directly; it is one more case than a register.
pub fn decode_r(field: u8) -> Operand8 {
    match field & 0x07 {
        0 => Operand8::Reg(Reg8::B),
        1 => Operand8::Reg(Reg8::C),
        2 => Operand8::Reg(Reg8::D),
        3 => Operand8::Reg(Reg8::E),
        4 => Operand8::Reg(Reg8::H),
        5 => Operand8::Reg(Reg8::L),
        6 => Operand8::IndirectHL,
        7 => Operand8::Reg(Reg8::A),
        _ => unreachable!(),
    }
}

/// The `rp` field (bits 4..=5) of the main 16-bit register group.
pub fn decode_rp(field: u8) -> Reg16 {
    match field & 0x03 {
        0 => Reg16::BC,
        1 => Reg16::DE,
        2 => Reg16::HL,
        3 => Reg16::SP,
        _ => unreachable!(),
    }
}

/// The alternate `rp2` group used by `PUSH`/`POP`, where slot 3 is `AF`
/// instead of `SP`.
pub fn decode_rp2(field: u8) -> Reg16 {
    match field & 0x03 {
        0 => Reg16::BC,
        1 => Reg16::DE,
        2 => Reg16::HL,
        3 => Reg16::AF,
        _ => unreachable!(),
    }
}

pub fn decode_alu_op(field: u8) -> AluOp {
    match field & 0x07 {
        0 => AluOp::Add,
        1 => AluOp::Adc,
        2 => AluOp::Sub,
        3 => AluOp::Sbc,
        4 => AluOp::And,
        5 => AluOp::Xor,
        6 => AluOp::Or,
        7 => AluOp::Cp,
        _ => unreachable!(),
    }
}

/// The `cc` field used by conditional `JR`/`JP`/`CALL`/`RET` (only 4 slots;
/// the field it's taken from varies in width depending on instruction class).
pub fn decode_condition(field: u8) -> JumpCondition {
    match field & 0x03 {
        0 => JumpCondition::NotZero,
        1 => JumpCondition::Zero,
        2 => JumpCondition::NotCarry,
        3 => JumpCondition::Carry,
        _ => unreachable!(),
    }
}

/// CB-prefixed opcodes are laid out as `xx bbb rrr`: `xx` selects
/// rotate/shift-group (00), `BIT` (01), `RES` (10) or `SET` (11); `bbb` is
/// either a rotate-op selector (group 00) or a bit index; `rrr` is the
/// 8-bit operand field shared with the primary table.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CbGroup {
    Rotate(RotateOp),
    Bit,
    Res,
    Set,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RotateOp {
    Rlc,
    Rrc,
    Rl,
    Rr,
    Sla,
    Sra,
    Swap,
    Srl,
}

pub fn decode_cb(opcode: u8) -> (CbGroup, u8, Operand8) {
    let x = opcode >> 6;
    let y = (opcode >> 3) & 0x07;
    let z = opcode & 0x07;
    let operand = decode_r(z);

    let group = match x {
        0 => CbGroup::Rotate(decode_rotate_op(y)),
        1 => CbGroup::Bit,
        2 => CbGroup::Res,
        3 => CbGroup::Set,
        _ => unreachable!(),
    };

    (group, y, operand)
}

fn decode_rotate_op(field: u8) -> RotateOp {
    match field & 0x07 {
        0 => RotateOp::Rlc,
        1 => RotateOp::Rrc,
        2 => RotateOp::Rl,
        3 => RotateOp::Rr,
        4 => RotateOp::Sla,
        5 => RotateOp::Sra,
        6 => RotateOp::Swap,
        7 => RotateOp::Srl,
        _ => unreachable!(),
    }
}
