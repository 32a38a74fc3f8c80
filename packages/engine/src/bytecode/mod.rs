//! Compiled attribute chunks.
//!
//! Bit-layout knowledge lives in `instruction`; the chunk file format in
//! `chunk`. Nothing here executes anything.

pub mod builder;
pub mod chunk;
pub mod instruction;
pub mod opcode;

pub use builder::ChunkBuilder;
pub use chunk::{Chunk, Constant, MAX_NESTING};
pub use instruction::{Instruction, Rk};
pub use opcode::OpCode;
