//! The compiled chunk file format.
//!
//! Chunks are Lua 5.1 `luac` output: a 12-byte header followed by the main
//! function. Only little-endian chunks with 4-byte ints and instructions are
//! accepted; `size_t` may be 4 or 8 bytes and numbers may be doubles or
//! floats. Nested functions are parsed and discarded since the dialect has
//! no closures.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::Error;

const SIGNATURE: &[u8; 4] = b"\x1bLua";
const VERSION: u8 = 0x51;
const FORMAT: u8 = 0;
const LITTLE_ENDIAN: u8 = 1;

const TYPE_NIL: u8 = 0;
const TYPE_BOOLEAN: u8 = 1;
const TYPE_NUMBER: u8 = 3;
const TYPE_STRING: u8 = 4;

/// Main-chunk `is_vararg` flag as written by the compiler.
const VARARG_ISVARARG: u8 = 2;

/// Deepest function nesting a chunk may declare, as in the reference
/// compiler's `LUAI_MAXCCALLS`.
pub const MAX_NESTING: usize = 200;

/// A constant pool entry.
#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    Nil,
    Boolean(bool),
    Number(f64),
    String(Bytes),
}

/// A loaded chunk: the main function's code and constants.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Chunk {
    /// Chunk name recorded by the compiler, without its terminator.
    pub source: Option<Bytes>,
    /// Registers the function needs.
    pub max_stack_size: u8,
    /// Raw instruction words.
    pub code: Vec<u32>,
    pub constants: Vec<Constant>,
    /// Source line per instruction; empty when stripped.
    pub line_info: Vec<u32>,
}

impl Chunk {
    /// Parse a chunk.
    pub fn from_bytes(bytes: &[u8]) -> Result<Chunk, Error> {
        let mut reader = Reader::new(bytes);
        reader.header()?;
        let chunk = reader.function(0)?;
        if reader.remaining() != 0 {
            log::debug!(
                "Ignoring {} trailing bytes after chunk",
                reader.remaining()
            );
        }
        Ok(chunk)
    }

    /// Serialize with 4-byte `size_t` and double numbers.
    pub fn to_bytes(&self) -> Bytes {
        let mut out = BytesMut::new();
        out.put_slice(SIGNATURE);
        out.put_slice(&[VERSION, FORMAT, LITTLE_ENDIAN, 4, 4, 4, 8, 0]);

        put_string(&mut out, self.source.as_deref());
        out.put_u32_le(0); // linedefined
        out.put_u32_le(0); // lastlinedefined
        out.put_u8(0); // nups
        out.put_u8(0); // numparams
        out.put_u8(VARARG_ISVARARG);
        out.put_u8(self.max_stack_size);

        out.put_u32_le(self.code.len() as u32);
        for word in &self.code {
            out.put_u32_le(*word);
        }

        out.put_u32_le(self.constants.len() as u32);
        for constant in &self.constants {
            match constant {
                Constant::Nil => out.put_u8(TYPE_NIL),
                Constant::Boolean(b) => {
                    out.put_u8(TYPE_BOOLEAN);
                    out.put_u8(*b as u8);
                }
                Constant::Number(n) => {
                    out.put_u8(TYPE_NUMBER);
                    out.put_f64_le(*n);
                }
                Constant::String(s) => {
                    out.put_u8(TYPE_STRING);
                    put_string(&mut out, Some(s));
                }
            }
        }

        out.put_u32_le(0); // nested functions

        out.put_u32_le(self.line_info.len() as u32);
        for line in &self.line_info {
            out.put_u32_le(*line);
        }
        out.put_u32_le(0); // locals
        out.put_u32_le(0); // upvalue names
        out.freeze()
    }

    /// Source line of the instruction at `pc`, when known.
    pub fn line(&self, pc: usize) -> Option<u32> {
        self.line_info.get(pc).copied()
    }
}

fn put_string(out: &mut BytesMut, s: Option<&[u8]>) {
    match s {
        None => out.put_u32_le(0),
        Some(s) => {
            out.put_u32_le(s.len() as u32 + 1);
            out.put_slice(s);
            out.put_u8(0);
        }
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    size_t: usize,
    number: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Reader {
            data,
            pos: 0,
            size_t: 4,
            number: 8,
        }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        if self.remaining() < n {
            return Err(Error::invalid_chunk(format!(
                "truncated at byte {}: wanted {}, {} left",
                self.pos,
                n,
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn byte(&mut self) -> Result<u8, Error> {
        Ok(self.take(1)?[0])
    }

    fn int(&mut self) -> Result<u32, Error> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn size(&mut self) -> Result<usize, Error> {
        let b = self.take(self.size_t)?;
        let mut wide = [0u8; 8];
        wide[..b.len()].copy_from_slice(b);
        usize::try_from(u64::from_le_bytes(wide))
            .map_err(|_| Error::invalid_chunk("string length overflows"))
    }

    /// A count followed by that many items; guards against absurd counts.
    fn count(&mut self, min_item_size: usize) -> Result<usize, Error> {
        let n = self.int()? as usize;
        if n.saturating_mul(min_item_size) > self.remaining() {
            return Err(Error::invalid_chunk(format!(
                "count {} at byte {} exceeds the data",
                n, self.pos
            )));
        }
        Ok(n)
    }

    fn number(&mut self) -> Result<f64, Error> {
        let b = self.take(self.number)?;
        Ok(match *b {
            [a, b, c, d] => f32::from_le_bytes([a, b, c, d]) as f64,
            [a, b, c, d, e, f, g, h] => f64::from_le_bytes([a, b, c, d, e, f, g, h]),
            _ => return Err(Error::invalid_chunk("bad number size")),
        })
    }

    fn string(&mut self) -> Result<Option<Bytes>, Error> {
        let len = self.size()?;
        if len == 0 {
            return Ok(None);
        }
        let raw = self.take(len)?;
        // The stored length includes the terminator.
        Ok(Some(Bytes::copy_from_slice(&raw[..len - 1])))
    }

    fn header(&mut self) -> Result<(), Error> {
        if self.take(4).ok() != Some(&SIGNATURE[..]) {
            return Err(Error::invalid_chunk("missing chunk signature"));
        }
        let version = self.byte()?;
        if version != VERSION {
            return Err(Error::invalid_chunk(format!(
                "unsupported version 0x{:02x}",
                version
            )));
        }
        if self.byte()? != FORMAT {
            return Err(Error::invalid_chunk("unsupported format"));
        }
        if self.byte()? != LITTLE_ENDIAN {
            return Err(Error::invalid_chunk("big-endian chunks are not supported"));
        }
        let int = self.byte()?;
        let size_t = self.byte()?;
        let instruction = self.byte()?;
        let number = self.byte()?;
        let integral = self.byte()?;
        if int != 4 || instruction != 4 {
            return Err(Error::invalid_chunk(format!(
                "unsupported int/instruction sizes {}/{}",
                int, instruction
            )));
        }
        if size_t != 4 && size_t != 8 {
            return Err(Error::invalid_chunk(format!(
                "unsupported size_t width {}",
                size_t
            )));
        }
        if (number != 4 && number != 8) || integral != 0 {
            return Err(Error::invalid_chunk(format!(
                "unsupported number format ({} bytes, integral {})",
                number, integral
            )));
        }
        self.size_t = size_t as usize;
        self.number = number as usize;
        Ok(())
    }

    fn function(&mut self, depth: usize) -> Result<Chunk, Error> {
        if depth > MAX_NESTING {
            return Err(Error::invalid_chunk(format!(
                "functions nested deeper than {} at byte {}",
                MAX_NESTING, self.pos
            )));
        }
        let source = self.string()?;
        self.int()?; // linedefined
        self.int()?; // lastlinedefined
        self.byte()?; // nups
        self.byte()?; // numparams
        self.byte()?; // is_vararg
        let max_stack_size = self.byte()?;

        let n = self.count(4)?;
        let mut code = Vec::with_capacity(n);
        for _ in 0..n {
            code.push(self.int()?);
        }

        let n = self.count(1)?;
        let mut constants = Vec::with_capacity(n);
        for _ in 0..n {
            let constant = match self.byte()? {
                TYPE_NIL => Constant::Nil,
                TYPE_BOOLEAN => Constant::Boolean(self.byte()? != 0),
                TYPE_NUMBER => Constant::Number(self.number()?),
                TYPE_STRING => Constant::String(self.string()?.unwrap_or_default()),
                other => {
                    return Err(Error::invalid_chunk(format!(
                        "unknown constant type {}",
                        other
                    )))
                }
            };
            constants.push(constant);
        }

        let n = self.count(1)?;
        for _ in 0..n {
            self.function(depth + 1)?;
        }

        let n = self.count(4)?;
        let mut line_info = Vec::with_capacity(n);
        for _ in 0..n {
            line_info.push(self.int()?);
        }

        let n = self.count(1)?;
        for _ in 0..n {
            self.string()?;
            self.int()?; // startpc
            self.int()?; // endpc
        }

        let n = self.count(1)?;
        for _ in 0..n {
            self.string()?;
        }

        Ok(Chunk {
            source,
            max_stack_size,
            code,
            constants,
            line_info,
        })
    }
}
