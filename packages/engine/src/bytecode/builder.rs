//! A small assembler for chunks.
//!
//! Used by hosts that compile their own sources and by tests that need
//! chunks without an external compiler.

use std::collections::HashMap;

use bytes::Bytes;

use super::chunk::{Chunk, Constant};
use super::instruction::{Instruction, Rk};
use crate::error::Error;

#[derive(Clone, PartialEq, Eq, Hash)]
enum ConstantKey {
    Nil,
    Boolean(bool),
    Number(u64),
    String(Bytes),
}

impl From<&Constant> for ConstantKey {
    fn from(constant: &Constant) -> Self {
        match constant {
            Constant::Nil => ConstantKey::Nil,
            Constant::Boolean(b) => ConstantKey::Boolean(*b),
            Constant::Number(n) => ConstantKey::Number(n.to_bits()),
            Constant::String(s) => ConstantKey::String(s.clone()),
        }
    }
}

/// Builds a [`Chunk`] one instruction at a time.
#[derive(Default)]
pub struct ChunkBuilder {
    source: Option<Bytes>,
    code: Vec<u32>,
    line_info: Vec<u32>,
    line: Option<u32>,
    constants: Vec<Constant>,
    index: HashMap<ConstantKey, u32>,
    registers: usize,
}

impl ChunkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a chunk name.
    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(Bytes::copy_from_slice(source.as_bytes()));
        self
    }

    /// Attach `line` to instructions emitted from now on.
    pub fn set_line(&mut self, line: u32) {
        self.line = Some(line);
    }

    /// Add a constant, reusing an equal one if present. Returns its index.
    pub fn constant(&mut self, constant: Constant) -> u32 {
        let key = ConstantKey::from(&constant);
        if let Some(index) = self.index.get(&key) {
            return *index;
        }
        let index = self.constants.len() as u32;
        self.constants.push(constant);
        self.index.insert(key, index);
        index
    }

    pub fn string(&mut self, s: &str) -> u32 {
        self.constant(Constant::String(Bytes::copy_from_slice(s.as_bytes())))
    }

    pub fn number(&mut self, n: f64) -> u32 {
        self.constant(Constant::Number(n))
    }

    pub fn boolean(&mut self, b: bool) -> u32 {
        self.constant(Constant::Boolean(b))
    }

    /// Append an instruction. Returns its pc.
    pub fn emit(&mut self, instruction: Instruction) -> usize {
        self.touch(&instruction);
        self.emit_raw(instruction.encode())
    }

    /// Append a raw word, for instructions outside the decoded subset.
    pub fn emit_raw(&mut self, word: u32) -> usize {
        let pc = self.code.len();
        self.code.push(word);
        if let Some(line) = self.line {
            // Backfill so line info stays aligned with code.
            self.line_info.resize(pc, line);
            self.line_info.push(line);
        }
        pc
    }

    /// Replace the instruction at `pc`, typically a forward jump.
    pub fn patch(&mut self, pc: usize, instruction: Instruction) {
        self.touch(&instruction);
        if let Some(word) = self.code.get_mut(pc) {
            *word = instruction.encode();
        }
    }

    /// The pc the next instruction will get.
    pub fn pc(&self) -> usize {
        self.code.len()
    }

    fn touch(&mut self, instruction: &Instruction) {
        let reg = |rk: Rk| match rk {
            Rk::Register(r) => r as usize,
            Rk::Constant(_) => 0,
        };
        let highest = match *instruction {
            Instruction::Move { a, b } | Instruction::Not { a, b } => (a as usize).max(b as usize),
            Instruction::LoadK { a, .. }
            | Instruction::LoadBool { a, .. }
            | Instruction::GetGlobal { a, .. }
            | Instruction::SetGlobal { a, .. }
            | Instruction::NewTable { a, .. }
            | Instruction::Return { a, .. } => a as usize,
            Instruction::LoadNil { a, b } => (a as usize).max(b as usize),
            Instruction::GetTable { a, b, c } => (a as usize).max(b as usize).max(reg(c)),
            Instruction::SetTable { a, b, c } => (a as usize).max(reg(b)).max(reg(c)),
            Instruction::Call { a, .. } => a as usize + 1,
            Instruction::Jmp { .. } => 0,
        };
        self.registers = self.registers.max(highest + 1);
    }

    /// Finish the chunk.
    ///
    /// Fails when an instruction touches a register the chunk header cannot
    /// describe.
    pub fn build(self) -> Result<Chunk, Error> {
        let max_stack_size =
            u8::try_from(self.registers.max(2)).map_err(|_| Error::TooManyRegisters {
                requested: self.registers,
                limit: u8::MAX as usize,
            })?;
        let mut line_info = self.line_info;
        if let Some(&last) = line_info.last() {
            line_info.resize(self.code.len(), last);
        }
        Ok(Chunk {
            source: self.source,
            max_stack_size,
            code: self.code,
            constants: self.constants,
            line_info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_shared() {
        let mut b = ChunkBuilder::new();
        let x = b.string("x");
        let one = b.number(1.0);
        assert_eq!(b.string("x"), x);
        assert_eq!(b.number(1.0), one);
        assert_ne!(b.boolean(true), b.boolean(false));
        assert_eq!(b.build().unwrap().constants.len(), 4);
    }

    #[test]
    fn tracks_register_window() {
        let mut b = ChunkBuilder::new();
        b.emit(Instruction::Return { a: 0, b: 1 });
        assert_eq!(b.build().unwrap().max_stack_size, 2);

        let mut b = ChunkBuilder::new();
        b.emit(Instruction::Call { a: 4, b: 2, c: 2 });
        b.emit(Instruction::Move { a: 1, b: 6 });
        assert_eq!(b.build().unwrap().max_stack_size, 7);
    }

    #[test]
    fn rejects_registers_beyond_the_header() {
        let mut b = ChunkBuilder::new();
        b.emit(Instruction::Move { a: 0, b: 300 });
        assert!(matches!(
            b.build(),
            Err(Error::TooManyRegisters {
                requested: 301,
                limit: 255
            })
        ));

        let mut b = ChunkBuilder::new();
        b.emit(Instruction::Move { a: 0, b: 254 });
        assert_eq!(b.build().unwrap().max_stack_size, 255);
    }

    #[test]
    fn patches_jumps() {
        let mut b = ChunkBuilder::new();
        let jump = b.emit(Instruction::Jmp { offset: 0 });
        b.emit(Instruction::LoadNil { a: 0, b: 0 });
        let target = b.pc();
        b.patch(
            jump,
            Instruction::Jmp {
                offset: (target - jump - 1) as i32,
            },
        );
        let chunk = b.build().unwrap();
        assert_eq!(
            Instruction::decode(chunk.code[jump]),
            Some(Instruction::Jmp { offset: 1 })
        );
    }

    #[test]
    fn line_info_follows_code() {
        let mut b = ChunkBuilder::new().with_source("=test");
        b.emit(Instruction::Return { a: 0, b: 1 });
        b.set_line(3);
        b.emit(Instruction::Return { a: 0, b: 1 });
        let chunk = b.build().unwrap();
        assert_eq!(chunk.line_info, vec![3, 3]);
        assert_eq!(chunk.source.as_deref(), Some(&b"=test"[..]));
    }
}
