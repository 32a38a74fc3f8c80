//! Turning file bytes into chunks.

use crate::bytecode::Chunk;
use crate::error::Error;

/// Produces a chunk from the bytes of a dependency file.
///
/// The engine never parses source text. Hosts that keep sources on disk
/// plug their compiler in here.
pub trait Compiler {
    fn compile(&self, name: &str, bytes: &[u8]) -> Result<Chunk, Error>;
}

/// Files are already compiled chunks.
#[derive(Clone, Copy, Debug, Default)]
pub struct PrecompiledChunks;

impl Compiler for PrecompiledChunks {
    fn compile(&self, _name: &str, bytes: &[u8]) -> Result<Chunk, Error> {
        Chunk::from_bytes(bytes)
    }
}

impl<F> Compiler for F
where
    F: Fn(&str, &[u8]) -> Result<Chunk, Error>,
{
    fn compile(&self, name: &str, bytes: &[u8]) -> Result<Chunk, Error> {
        self(name, bytes)
    }
}
