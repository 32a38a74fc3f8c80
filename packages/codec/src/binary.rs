//! The binary form: a flattened snapshot with hashed keys.
//!
//! A table is written as
//!
//! ```text
//! u32 count
//! count x (u32 key hash, u32 type code, u32 offset)
//! payload
//! ```
//!
//! Offsets are relative to the start of the payload and point at the value
//! itself, after any alignment padding. Padding is zero bytes, also counted
//! from the start of the payload. All integers are little-endian.

use std::collections::HashSet;
use std::rc::Rc;

use attrib_core_store::{Bytes, KeyDictionary, Table, TableId, Value};
use attrib_engine::{AttributeFile, BinaryMemo};
use attrib_ll_store::{read_to_end, MemoryStream, SeekFrom, Stream};
use lazy_static::lazy_static;
use regex::bytes::Regex;

use crate::error::Error;
use crate::key_order;

pub const TYPE_FLOAT: u32 = 0;
pub const TYPE_INTEGER: u32 = 1;
pub const TYPE_BOOLEAN: u32 = 2;
pub const TYPE_STRING: u32 = 3;
pub const TYPE_WSTRING: u32 = 4;
pub const TYPE_TABLE: u32 = 100;

const ENTRY_SIZE: usize = 12;

lazy_static! {
    /// Localization references are stored as wide strings.
    static ref WIDE_STRING: Regex = Regex::new(r"^\$[0-9]+$").unwrap();
}

/// Writes tables in the binary form.
pub struct BinaryWriter<'a> {
    dictionary: &'a KeyDictionary,
    memo: Option<&'a mut BinaryMemo>,
    visiting: HashSet<TableId>,
}

impl<'a> BinaryWriter<'a> {
    pub fn new(dictionary: &'a KeyDictionary) -> Self {
        BinaryWriter {
            dictionary,
            memo: None,
            visiting: HashSet::new(),
        }
    }

    /// Reuse bytes of unchanged tables across calls.
    ///
    /// See [`BinaryMemo`] for when the memo must be cleared.
    pub fn with_memo(mut self, memo: &'a mut BinaryMemo) -> Self {
        self.memo = Some(memo);
        self
    }

    /// Write the `GameData` of `file`.
    pub fn write_file(&mut self, file: &AttributeFile, out: &mut dyn Stream) -> Result<(), Error> {
        log::debug!("Writing binary for {}...", file.name());
        self.write_table(file.game_table()?, out)
    }

    /// Encode `table` to bytes.
    pub fn encode(&mut self, table: &Table) -> Result<Bytes, Error> {
        let mut buffer = MemoryStream::new();
        self.write_table(table, &mut buffer)?;
        Ok(buffer.to_bytes())
    }

    /// Write `table` at the current position of `out`.
    pub fn write_table(&mut self, table: &Table, out: &mut dyn Stream) -> Result<(), Error> {
        if !self.visiting.insert(table.id()) {
            return Err(Error::RecursiveTable {
                path: format!("{:?}", table.id()),
            });
        }
        let written = self.write_flattened(table, out);
        self.visiting.remove(&table.id());
        written
    }

    fn write_flattened(&mut self, table: &Table, out: &mut dyn Stream) -> Result<(), Error> {
        let entries: Vec<(u32, Value)> = key_order::merged_keys(table, self.dictionary)
            .into_iter()
            .map(|key| (key, table.lookup(key)))
            .filter(|(_, value)| !value.is_nil())
            .collect();

        let start = out.tell()?;
        out.write(&(entries.len() as u32).to_le_bytes())?;
        out.write(&vec![0u8; entries.len() * ENTRY_SIZE])?;
        let payload_start = out.tell()?;

        let mut header = Vec::with_capacity(entries.len() * ENTRY_SIZE);
        for (key, value) in &entries {
            let (code, alignment) = type_of(*key, value)?;
            let position = out.tell()? - payload_start;
            let padding = (alignment - position % alignment) % alignment;
            out.write(&vec![0u8; padding as usize])?;
            let offset = (position + padding) as u32;

            match value {
                Value::Float(f) => out.write(&f.to_le_bytes())?,
                Value::Integer(i) => out.write(&i.to_le_bytes())?,
                Value::Boolean(b) => out.write(&[*b as u8])?,
                Value::String(s) if code == TYPE_WSTRING => {
                    // Only ASCII digits reach here, so each byte is one unit.
                    out.write(&(s.len() as u32).to_le_bytes())?;
                    let mut wide = Vec::with_capacity(s.len() * 2 + 2);
                    for b in s.iter() {
                        wide.extend_from_slice(&(*b as u16).to_le_bytes());
                    }
                    wide.extend_from_slice(&[0, 0]);
                    out.write(&wide)?;
                }
                Value::String(s) => {
                    out.write(&(s.len() as u32).to_le_bytes())?;
                    out.write(s)?;
                    out.write(&[0])?;
                }
                Value::Table(child) => self.write_child(child, out)?,
                other => {
                    return Err(Error::UnsupportedValue {
                        found: other.type_name(),
                        key: *key,
                    })
                }
            }

            header.extend_from_slice(&key.to_le_bytes());
            header.extend_from_slice(&code.to_le_bytes());
            header.extend_from_slice(&offset.to_le_bytes());
        }

        let end = out.tell()?;
        out.seek(SeekFrom::Start(start + 4))?;
        out.write(&header)?;
        out.seek(SeekFrom::Start(end))?;
        Ok(())
    }

    fn write_child(&mut self, table: &Table, out: &mut dyn Stream) -> Result<(), Error> {
        if self.memo.is_none() || !table.is_unchanged() {
            return self.write_table(table, out);
        }
        let origin = table.origin();
        if let Some(bytes) = self.memo.as_mut().and_then(|memo| memo.get(&origin)) {
            out.write(&bytes)?;
            return Ok(());
        }
        let bytes = self.encode(table)?;
        if let Some(memo) = self.memo.as_mut() {
            memo.insert(&origin, bytes.clone());
        }
        out.write(&bytes)?;
        Ok(())
    }
}

/// Type code and alignment of a value.
fn type_of(key: u32, value: &Value) -> Result<(u32, u64), Error> {
    Ok(match value {
        Value::Float(_) => (TYPE_FLOAT, 4),
        Value::Integer(_) => (TYPE_INTEGER, 4),
        Value::Boolean(_) => (TYPE_BOOLEAN, 1),
        Value::String(s) if WIDE_STRING.is_match(s) => (TYPE_WSTRING, 2),
        Value::String(_) => (TYPE_STRING, 1),
        Value::Table(_) => (TYPE_TABLE, 4),
        other => {
            return Err(Error::UnsupportedValue {
                found: other.type_name(),
                key,
            })
        }
    })
}

/// Reads the binary form back into plain tables.
///
/// Key names are not stored in the binary form, so the tables carry only
/// hashes. Wide strings are narrowed; units above 255 become `?`.
pub struct BinaryReader {
    source: Option<Rc<str>>,
    max_depth: usize,
}

impl BinaryReader {
    pub fn new(source: Option<Rc<str>>) -> Self {
        BinaryReader {
            source,
            max_depth: 64,
        }
    }

    pub fn read_stream(&self, input: &mut dyn Stream) -> Result<Table, Error> {
        let bytes = read_to_end(input)?;
        self.read_table(&bytes)
    }

    pub fn read_table(&self, data: &[u8]) -> Result<Table, Error> {
        self.table_at(data, 0, 0)
    }

    fn table_at(&self, data: &[u8], at: usize, depth: usize) -> Result<Table, Error> {
        if depth > self.max_depth {
            return Err(Error::NestingTooDeep {
                limit: self.max_depth,
            });
        }
        let count = u32_at(data, at)? as usize;
        let header_len = count
            .checked_mul(ENTRY_SIZE)
            .ok_or(Error::Truncated {
                offset: at + 4,
                wanted: usize::MAX,
                available: data.len().saturating_sub(at + 4),
            })?;
        slice(data, at + 4, header_len)?;
        let payload = at + 4 + header_len;

        let table = Table::new(self.source.clone());
        for i in 0..count {
            let entry = at + 4 + i * ENTRY_SIZE;
            let key = u32_at(data, entry)?;
            let code = u32_at(data, entry + 4)?;
            let offset = u32_at(data, entry + 8)? as usize;
            let position = payload.checked_add(offset).ok_or(Error::Truncated {
                offset: payload,
                wanted: offset,
                available: data.len().saturating_sub(payload),
            })?;

            let value = match code {
                TYPE_FLOAT => Value::Float(f32::from_le_bytes(array(data, position)?)),
                TYPE_INTEGER => Value::Integer(i32::from_le_bytes(array(data, position)?)),
                TYPE_BOOLEAN => Value::Boolean(slice(data, position, 1)?[0] != 0),
                TYPE_STRING => {
                    let len = u32_at(data, position)? as usize;
                    Value::String(Bytes::copy_from_slice(slice(data, position + 4, len)?))
                }
                TYPE_WSTRING => {
                    let len = u32_at(data, position)? as usize;
                    let raw = slice(data, position + 4, len.saturating_mul(2))?;
                    let narrow: Vec<u8> = raw
                        .chunks_exact(2)
                        .map(|unit| match u16::from_le_bytes([unit[0], unit[1]]) {
                            u @ 0..=0xFF => u as u8,
                            _ => b'?',
                        })
                        .collect();
                    Value::String(Bytes::from(narrow))
                }
                TYPE_TABLE => Value::Table(self.table_at(data, position, depth + 1)?),
                code => return Err(Error::UnknownTypeCode { code, key }),
            };
            table.set(key, value)?;
        }
        Ok(table)
    }
}

fn slice(data: &[u8], at: usize, len: usize) -> Result<&[u8], Error> {
    at.checked_add(len)
        .and_then(|end| data.get(at..end))
        .ok_or(Error::Truncated {
            offset: at,
            wanted: len,
            available: data.len().saturating_sub(at),
        })
}

fn array(data: &[u8], at: usize) -> Result<[u8; 4], Error> {
    let b = slice(data, at, 4)?;
    Ok([b[0], b[1], b[2], b[3]])
}

fn u32_at(data: &[u8], at: usize) -> Result<u32, Error> {
    Ok(u32::from_le_bytes(array(data, at)?))
}
