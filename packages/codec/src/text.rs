//! The text form: an editable script holding only the differences from the
//! inherited file.

use std::collections::HashSet;

use attrib_core_store::{format_float, Bytes, KeyDictionary, Table, TableId, Value, REF_KEY};
use attrib_engine::AttributeFile;
use attrib_ll_store::Stream;

use crate::error::Error;
use crate::key_order;

const RULE: &str = "----------------------------------------";

/// Settings for [`TextWriter`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextOptions {
    /// Named in the header comment.
    pub creator: String,
    /// Digits after the decimal point for numbers.
    pub float_precision: usize,
}

impl Default for TextOptions {
    fn default() -> Self {
        TextOptions {
            creator: "attrib".to_string(),
            float_precision: 5,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Own entries that differ from the ancestor.
    Delta,
    /// Every entry of the whole chain.
    Flat,
}

/// Writes attribute files in the text form.
pub struct TextWriter<'a> {
    dictionary: &'a KeyDictionary,
    options: TextOptions,
}

impl<'a> TextWriter<'a> {
    pub fn new(dictionary: &'a KeyDictionary) -> Self {
        TextWriter {
            dictionary,
            options: TextOptions::default(),
        }
    }

    pub fn with_options(mut self, options: TextOptions) -> Self {
        self.options = options;
        self
    }

    /// Render `file` to bytes.
    pub fn encode(&self, file: &AttributeFile) -> Result<Bytes, Error> {
        let game = file.game_table()?;
        let meta = file.meta_table()?;

        let mut out = Emitter {
            writer: self,
            ref_key: self.dictionary.hash_str(REF_KEY),
            lines: Vec::new(),
            visiting: HashSet::new(),
        };

        out.line(RULE.as_bytes());
        out.line(format!("-- File: '{}'", printable(file.name())).as_bytes());
        out.line(format!("-- Created by: {}", printable(&self.options.creator)).as_bytes());
        out.line(b"-- Note: only values that differ from the inherited file are listed.");
        out.line(RULE.as_bytes());
        out.line(b"");

        let mut inherit = b"GameData = Inherit(".to_vec();
        inherit.extend(file_literal(&out.ref_name(game)));
        inherit.push(b')');
        out.line(&inherit);
        let mut inherit_meta = b"MetaData = InheritMeta(".to_vec();
        inherit_meta.extend(file_literal(&out.ref_name(meta)));
        inherit_meta.push(b')');
        out.line(&inherit_meta);

        for (root, table) in [("GameData", game), ("MetaData", meta)] {
            let start = out.lines.len();
            out.line(b"");
            out.root(root.as_bytes(), table)?;
            if out.lines.len() == start + 1 {
                out.lines.truncate(start);
            }
        }

        let mut bytes = Vec::new();
        for line in out.lines {
            bytes.extend(line);
            bytes.extend_from_slice(b"\r\n");
        }
        Ok(Bytes::from(bytes))
    }

    /// Render `file` and write it to `out`.
    pub fn write(&self, file: &AttributeFile, out: &mut dyn Stream) -> Result<(), Error> {
        log::debug!("Writing text for {}...", file.name());
        let bytes = self.encode(file)?;
        out.write(&bytes)?;
        Ok(())
    }
}

struct Emitter<'w, 'a> {
    writer: &'w TextWriter<'a>,
    ref_key: u32,
    lines: Vec<Vec<u8>>,
    visiting: HashSet<TableId>,
}

impl Emitter<'_, '_> {
    fn line(&mut self, text: &[u8]) {
        self.lines.push(text.to_vec());
    }

    fn assign(&mut self, path: &[u8], value: &[u8]) {
        let mut line = path.to_vec();
        line.extend_from_slice(b" = ");
        line.extend_from_slice(value);
        self.lines.push(line);
    }

    /// The `$REF` name a table carries itself, if any.
    fn own_ref(&self, table: &Table) -> Option<Bytes> {
        match table.own(self.ref_key) {
            Some(Value::String(name)) => Some(name),
            _ => None,
        }
    }

    fn ref_name(&self, table: &Table) -> Bytes {
        self.own_ref(table).unwrap_or_default()
    }

    fn root(&mut self, path: &[u8], table: &Table) -> Result<(), Error> {
        let mode = if self.own_ref(table).is_some() || table.inherit_from().is_none() {
            Mode::Delta
        } else {
            Mode::Flat
        };
        self.body(path, table, mode)
    }

    fn body(&mut self, path: &[u8], table: &Table, mode: Mode) -> Result<(), Error> {
        if !self.visiting.insert(table.id()) {
            return Err(Error::RecursiveTable {
                path: String::from_utf8_lossy(path).into_owned(),
            });
        }

        let keys = match mode {
            Mode::Delta => key_order::own_keys(table, self.writer.dictionary),
            Mode::Flat => key_order::merged_keys(table, self.writer.dictionary),
        };
        for key in keys {
            if key == self.ref_key {
                continue;
            }
            let (value, ancestor) = match mode {
                Mode::Delta => (
                    table.own(key).unwrap_or_default(),
                    table.inherit_from().map(|parent| parent.lookup(key)),
                ),
                Mode::Flat => (table.lookup(key), None),
            };
            self.entry(path, key, value, ancestor)?;
        }

        self.visiting.remove(&table.id());
        Ok(())
    }

    fn entry(
        &mut self,
        path: &[u8],
        key: u32,
        value: Value,
        ancestor: Option<Value>,
    ) -> Result<(), Error> {
        let mut child_path = path.to_vec();
        child_path.extend(self.key_expr(key));

        match value {
            Value::Table(table) => {
                if let Some(Value::Table(inherited)) = &ancestor {
                    if table.is_view_of(inherited) {
                        if table.is_unchanged() {
                            return Ok(());
                        }
                        return self.body(&child_path, &table, Mode::Delta);
                    }
                }
                if let Some(name) = self.own_ref(&table) {
                    let mut call = b"Reference(".to_vec();
                    call.extend(file_literal(&name));
                    call.push(b')');
                    self.assign(&child_path, &call);
                    self.body(&child_path, &table, Mode::Delta)
                } else {
                    self.assign(&child_path, b"{}");
                    let mode = if table.inherit_from().is_none() {
                        Mode::Delta
                    } else {
                        Mode::Flat
                    };
                    self.body(&child_path, &table, mode)
                }
            }
            Value::ReferenceFn | Value::InheritMetaFn => Err(Error::UnsupportedValue {
                found: value.type_name(),
                key,
            }),
            scalar => {
                if ancestor.as_ref() == Some(&scalar) {
                    return Ok(());
                }
                let literal = self.literal(&scalar);
                self.assign(&child_path, &literal);
                Ok(())
            }
        }
    }

    fn literal(&self, value: &Value) -> Vec<u8> {
        match value {
            Value::Float(f) => {
                format_float(*f, self.writer.options.float_precision).into_bytes()
            }
            Value::Integer(i) => i.to_string().into_bytes(),
            Value::Boolean(b) => b.to_string().into_bytes(),
            Value::String(s) => string_literal(s),
            _ => b"nil".to_vec(),
        }
    }

    fn key_expr(&self, key: u32) -> Vec<u8> {
        let literal = match self.writer.dictionary.get(key) {
            Some(entry) => string_literal(entry.bytes()),
            None => format!("\"0x{:08X}\"", key).into_bytes(),
        };
        let mut expr = Vec::with_capacity(literal.len() + 4);
        if literal.first() == Some(&b'[') {
            // `[[` right after `[` would open a long string.
            expr.extend_from_slice(b"[ ");
            expr.extend(literal);
            expr.extend_from_slice(b" ]");
        } else {
            expr.push(b'[');
            expr.extend(literal);
            expr.push(b']');
        }
        expr
    }
}

fn printable(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_control() || !c.is_ascii() { '?' } else { c })
        .collect()
}

fn needs_long_form(s: &[u8]) -> bool {
    s.iter()
        .any(|&b| b < 0x20 || b == 0x7f || b == b'"' || b == b'\\')
}

/// Quote `s` as a script string literal.
///
/// Output is always ASCII: strings holding bytes above 0x7f are quoted with
/// `\ddd` escapes, since long brackets cannot escape anything.
pub fn string_literal(s: &[u8]) -> Vec<u8> {
    if !s.is_ascii() {
        return escaped_string(s);
    }
    if needs_long_form(s) {
        return long_string(s);
    }
    let mut out = Vec::with_capacity(s.len() + 2);
    out.push(b'"');
    out.extend_from_slice(s);
    out.push(b'"');
    out
}

/// Quote `s` in double quotes, escaping everything but printable ASCII.
pub fn escaped_string(s: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len() + 2);
    out.push(b'"');
    for &b in s {
        match b {
            b'"' => out.extend_from_slice(b"\\\""),
            b'\\' => out.extend_from_slice(b"\\\\"),
            0x20..=0x7e => out.push(b),
            // Always three digits so a following digit cannot extend it.
            _ => out.extend_from_slice(format!("\\{:03}", b).as_bytes()),
        }
    }
    out.push(b'"');
    out
}

fn file_literal(name: &[u8]) -> Vec<u8> {
    if name.is_ascii() {
        long_string(name)
    } else {
        escaped_string(name)
    }
}

/// Quote `s` as a long-bracket literal, choosing a level that `s` cannot
/// close early.
pub fn long_string(s: &[u8]) -> Vec<u8> {
    let mut level = 0;
    loop {
        let mut close = vec![b']'];
        close.extend(std::iter::repeat(b'=').take(level));
        let ends_open = s.ends_with(&close);
        close.push(b']');
        if !ends_open && !s.windows(close.len()).any(|w| w == close.as_slice()) {
            break;
        }
        level += 1;
    }

    let equals = "=".repeat(level);
    let mut out = Vec::with_capacity(s.len() + 2 * level + 6);
    out.push(b'[');
    out.extend_from_slice(equals.as_bytes());
    out.push(b'[');
    // The first newline after the opening bracket is dropped by the reader.
    match s.first() {
        Some(b'\n') => out.push(b'\n'),
        Some(b'\r') => out.extend_from_slice(b"\r\n"),
        _ => {}
    }
    out.extend_from_slice(s);
    out.push(b']');
    out.extend_from_slice(equals.as_bytes());
    out.push(b']');
    out
}
