//! Core attribute layer: the data model built by interpreting attribute files.
//!
//! This layer adds meaning to the raw bytes of the LL layer:
//! - `hash`: the 32-bit RGD key hash shared with the game engine
//! - `KeyDictionary`: remembers which string produced each hash
//! - `Value`: the tagged union held in tables and interpreter registers
//! - `Table`: a hashed-key map with a copy-on-write inheritance link
//!
//! # Example
//!
//! ```rust
//! use attrib_core_store::{KeyDictionary, Table, Value};
//!
//! let dict = KeyDictionary::new();
//! let parent = Table::new(None);
//! parent.set(dict.hash_str("health"), Value::Float(100.0)).unwrap();
//!
//! let child = Table::inheriting(&parent, None);
//! assert_eq!(child.lookup(dict.hash_str("health")), Value::Float(100.0));
//! ```

pub use bytes::Bytes;

mod dictionary;
mod error;
pub mod hash;
mod table;
mod value;

pub use dictionary::{DictionaryEntry, KeyDictionary};
pub use error::Error;
pub use hash::{hash, hash_filename, hash_str, hash_with_seed};
pub use table::{Table, TableId, TableKind, REF_KEY};
pub use value::{canonical_number, format_float, Value};
