//! Decoded instructions.
//!
//! An instruction is a 32-bit word: opcode in bits 0-5, A in bits 6-13,
//! C in bits 14-22 and B in bits 23-31. Bx overlays B and C as an unsigned
//! 18-bit field; sBx is Bx biased by `MAXARG_SBX`. This module is the only
//! place that knows the layout.

use super::opcode::OpCode;

const SIZE_OP: u32 = 6;
const SIZE_A: u32 = 8;
const SIZE_B: u32 = 9;
const SIZE_C: u32 = 9;
const SIZE_BX: u32 = SIZE_B + SIZE_C;

const POS_A: u32 = SIZE_OP;
const POS_C: u32 = POS_A + SIZE_A;
const POS_B: u32 = POS_C + SIZE_C;
const POS_BX: u32 = POS_C;

const MAXARG_BX: u32 = (1 << SIZE_BX) - 1;
const MAXARG_SBX: i32 = (MAXARG_BX >> 1) as i32;

/// Operands at or above this value name a constant instead of a register.
const BITRK: u16 = 1 << (SIZE_B - 1);

/// A register-or-constant operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rk {
    Register(u16),
    Constant(u16),
}

impl Rk {
    fn decode(field: u16) -> Self {
        if field & BITRK != 0 {
            Rk::Constant(field & !BITRK)
        } else {
            Rk::Register(field)
        }
    }

    fn encode(self) -> u16 {
        match self {
            Rk::Register(r) => r,
            Rk::Constant(k) => k | BITRK,
        }
    }
}

/// The executable subset, decoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// R(a) := R(b)
    Move { a: u8, b: u16 },
    /// R(a) := K(bx)
    LoadK { a: u8, bx: u32 },
    /// R(a) := value; skip the next instruction if `skip`
    LoadBool { a: u8, value: bool, skip: bool },
    /// R(a) ..= R(b) := nil
    LoadNil { a: u8, b: u16 },
    /// R(a) := globals[K(bx)]
    GetGlobal { a: u8, bx: u32 },
    /// R(a) := R(b)[RK(c)]
    GetTable { a: u8, b: u16, c: Rk },
    /// globals[K(bx)] := R(a)
    SetGlobal { a: u8, bx: u32 },
    /// R(a)[RK(b)] := RK(c)
    SetTable { a: u8, b: Rk, c: Rk },
    /// R(a) := {} (size hints are ignored)
    NewTable { a: u8, array: u16, hash: u16 },
    /// R(a) := not R(b)
    Not { a: u8, b: u16 },
    /// pc += offset, relative to the following instruction
    Jmp { offset: i32 },
    /// R(a) := R(a)(R(a+1)); b and c are argument and result counts plus one
    Call { a: u8, b: u16, c: u16 },
    /// Stop executing.
    Return { a: u8, b: u16 },
}

fn field(raw: u32, pos: u32, size: u32) -> u32 {
    (raw >> pos) & ((1 << size) - 1)
}

/// The 6-bit opcode field of a raw instruction.
pub fn opcode_field(raw: u32) -> u8 {
    field(raw, 0, SIZE_OP) as u8
}

impl Instruction {
    /// Decode a raw instruction.
    ///
    /// Returns `None` for anything outside the executable subset; use
    /// [`opcode_field`] to report what was found.
    pub fn decode(raw: u32) -> Option<Self> {
        let op = OpCode::from_u8(opcode_field(raw))?;
        let a = field(raw, POS_A, SIZE_A) as u8;
        let b = field(raw, POS_B, SIZE_B) as u16;
        let c = field(raw, POS_C, SIZE_C) as u16;
        let bx = field(raw, POS_BX, SIZE_BX);

        let decoded = match op {
            OpCode::Move => Instruction::Move { a, b },
            OpCode::LoadK => Instruction::LoadK { a, bx },
            OpCode::LoadBool => Instruction::LoadBool {
                a,
                value: b != 0,
                skip: c != 0,
            },
            OpCode::LoadNil => Instruction::LoadNil { a, b },
            OpCode::GetGlobal => Instruction::GetGlobal { a, bx },
            OpCode::GetTable => Instruction::GetTable {
                a,
                b,
                c: Rk::decode(c),
            },
            OpCode::SetGlobal => Instruction::SetGlobal { a, bx },
            OpCode::SetTable => Instruction::SetTable {
                a,
                b: Rk::decode(b),
                c: Rk::decode(c),
            },
            OpCode::NewTable => Instruction::NewTable { a, array: b, hash: c },
            OpCode::Not => Instruction::Not { a, b },
            OpCode::Jmp => Instruction::Jmp {
                offset: bx as i32 - MAXARG_SBX,
            },
            OpCode::Call => Instruction::Call { a, b, c },
            OpCode::Return => Instruction::Return { a, b },
            _ => return None,
        };
        Some(decoded)
    }

    /// The opcode this instruction encodes to.
    pub fn opcode(&self) -> OpCode {
        match self {
            Instruction::Move { .. } => OpCode::Move,
            Instruction::LoadK { .. } => OpCode::LoadK,
            Instruction::LoadBool { .. } => OpCode::LoadBool,
            Instruction::LoadNil { .. } => OpCode::LoadNil,
            Instruction::GetGlobal { .. } => OpCode::GetGlobal,
            Instruction::GetTable { .. } => OpCode::GetTable,
            Instruction::SetGlobal { .. } => OpCode::SetGlobal,
            Instruction::SetTable { .. } => OpCode::SetTable,
            Instruction::NewTable { .. } => OpCode::NewTable,
            Instruction::Not { .. } => OpCode::Not,
            Instruction::Jmp { .. } => OpCode::Jmp,
            Instruction::Call { .. } => OpCode::Call,
            Instruction::Return { .. } => OpCode::Return,
        }
    }

    /// Encode back to a raw instruction.
    pub fn encode(&self) -> u32 {
        let abc = |a: u8, b: u16, c: u16| {
            ((a as u32) << POS_A) | ((b as u32 & 0x1FF) << POS_B) | ((c as u32 & 0x1FF) << POS_C)
        };
        let abx = |a: u8, bx: u32| ((a as u32) << POS_A) | ((bx & MAXARG_BX) << POS_BX);

        let operands = match *self {
            Instruction::Move { a, b } => abc(a, b, 0),
            Instruction::LoadK { a, bx } => abx(a, bx),
            Instruction::LoadBool { a, value, skip } => abc(a, value as u16, skip as u16),
            Instruction::LoadNil { a, b } => abc(a, b, 0),
            Instruction::GetGlobal { a, bx } => abx(a, bx),
            Instruction::GetTable { a, b, c } => abc(a, b, c.encode()),
            Instruction::SetGlobal { a, bx } => abx(a, bx),
            Instruction::SetTable { a, b, c } => abc(a, b.encode(), c.encode()),
            Instruction::NewTable { a, array, hash } => abc(a, array, hash),
            Instruction::Not { a, b } => abc(a, b, 0),
            Instruction::Jmp { offset } => abx(0, (offset + MAXARG_SBX) as u32),
            Instruction::Call { a, b, c } => abc(a, b, c),
            Instruction::Return { a, b } => abc(a, b, 0),
        };
        operands | self.opcode() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_known_words() {
        // GETGLOBAL 0 0
        assert_eq!(
            Instruction::decode(0x0000_0005),
            Some(Instruction::GetGlobal { a: 0, bx: 0 })
        );
        // SETTABLE 0 K(1) K(2): B = 0x101, C = 0x102
        let raw = (0x101 << 23) | (0x102 << 14) | 9;
        assert_eq!(
            Instruction::decode(raw),
            Some(Instruction::SetTable {
                a: 0,
                b: Rk::Constant(1),
                c: Rk::Constant(2),
            })
        );
        // RETURN 0 1
        assert_eq!(
            Instruction::decode(0x0080_001E),
            Some(Instruction::Return { a: 0, b: 1 })
        );
    }

    #[test]
    fn jump_offsets_are_signed() {
        let back = Instruction::Jmp { offset: -3 };
        assert_eq!(Instruction::decode(back.encode()), Some(back));
        let forward = Instruction::Jmp { offset: 2 };
        assert_eq!(Instruction::decode(forward.encode()), Some(forward));
        // sBx of zero sits at the bias.
        assert_eq!(Instruction::Jmp { offset: 0 }.encode() >> 14, 131_071);
    }

    #[test]
    fn encode_inverts_decode() {
        let samples = [
            Instruction::Move { a: 3, b: 1 },
            Instruction::LoadK { a: 2, bx: 70_000 },
            Instruction::LoadBool {
                a: 1,
                value: true,
                skip: true,
            },
            Instruction::LoadNil { a: 0, b: 4 },
            Instruction::GetTable {
                a: 1,
                b: 0,
                c: Rk::Register(2),
            },
            Instruction::NewTable {
                a: 1,
                array: 0,
                hash: 2,
            },
            Instruction::Not { a: 2, b: 3 },
            Instruction::Call { a: 1, b: 2, c: 2 },
        ];
        for ins in samples {
            assert_eq!(Instruction::decode(ins.encode()), Some(ins), "{:?}", ins);
        }
    }

    #[test]
    fn unsupported_opcodes_do_not_decode() {
        // ADD 0 0 0
        assert_eq!(Instruction::decode(12), None);
        // CLOSURE 0 0
        assert_eq!(Instruction::decode(36), None);
        // opcode 63 does not exist at all
        assert_eq!(Instruction::decode(63), None);
        assert_eq!(opcode_field(0xFFFF_FFC0 | 36), 36);
    }
}
