//! Attribute codecs.
//!
//! Two output forms for a loaded [`AttributeFile`]:
//! - `TextWriter`: an editable script holding only the differences from
//!   the inherited file
//! - `BinaryWriter`: a flattened snapshot with hashed keys, laid out
//!   byte-exactly for the game engine; `BinaryReader` reads it back
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use attrib_codec::{write_file, Format};
//! use attrib_core_store::{KeyDictionary, Table, Value};
//! use attrib_engine::AttributeFile;
//! use attrib_ll_store::MemoryStream;
//!
//! let dict = KeyDictionary::new();
//! let game = Table::new(None);
//! game.set(dict.hash_str("name"), Value::from("orc")).unwrap();
//! let file = AttributeFile::from_tables("orc.lua", game, Table::new(None));
//!
//! let mut out = MemoryStream::new();
//! write_file(Format::Text, &file, &dict, None, &mut out).unwrap();
//! let text = out.to_bytes();
//! assert!(std::str::from_utf8(&text).unwrap().contains("GameData[\"name\"] = \"orc\"\r\n"));
//! ```

mod binary;
mod error;
pub mod key_order;
mod text;

pub use binary::{
    BinaryReader, BinaryWriter, TYPE_BOOLEAN, TYPE_FLOAT, TYPE_INTEGER, TYPE_STRING, TYPE_TABLE,
    TYPE_WSTRING,
};
pub use error::Error;
pub use text::{escaped_string, long_string, string_literal, TextOptions, TextWriter};

use attrib_core_store::KeyDictionary;
use attrib_engine::{AttributeFile, BinaryMemo};
use attrib_ll_store::Stream;

/// The two output forms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    Text,
    Binary,
}

impl Format {
    /// Pick a form from a file name: `.lua` is text, `.rgd` binary.
    pub fn from_name(name: &str) -> Option<Format> {
        let (_, extension) = name.rsplit_once('.')?;
        match extension.to_ascii_lowercase().as_str() {
            "lua" => Some(Format::Text),
            "rgd" => Some(Format::Binary),
            _ => None,
        }
    }
}

/// Write `file` to `out` in `format`.
///
/// `memo` is only consulted by the binary form.
pub fn write_file(
    format: Format,
    file: &AttributeFile,
    dictionary: &KeyDictionary,
    memo: Option<&mut BinaryMemo>,
    out: &mut dyn Stream,
) -> Result<(), Error> {
    match format {
        Format::Text => TextWriter::new(dictionary).write(file, out),
        Format::Binary => {
            let mut writer = BinaryWriter::new(dictionary);
            if let Some(memo) = memo {
                writer = writer.with_memo(memo);
            }
            writer.write_file(file, out)
        }
    }
}
