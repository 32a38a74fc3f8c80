//! Low-level attribute storage: byte streams and directories.
//!
//! This is the narrow waist of the attribute stack. Everything at this level
//! is pure bytes - no hashing, no value semantics, no format interpretation.
//!
//! Use this layer for:
//! - Opening dependency files by name while interpreting attribute chunks
//! - Writing serializer output (text or binary)
//! - Plugging in archive or virtual file-system backends
//!
//! # Example
//!
//! ```rust
//! use attrib_ll_store::{Directory, MemoryDirectory, Stream, LLError};
//!
//! fn read_header(dir: &mut dyn Directory) -> Result<Option<[u8; 4]>, LLError> {
//!     let Some(mut stream) = dir.open_read("attrib\\base.lua")? else {
//!         return Ok(None);
//!     };
//!     let mut header = [0u8; 4];
//!     stream.read_exact(&mut header)?;
//!     Ok(Some(header))
//! }
//!
//! let mut dir = MemoryDirectory::new();
//! dir.insert("attrib\\base.lua", b"\x1bLua".to_vec());
//! assert_eq!(read_header(&mut dir).unwrap(), Some(*b"\x1bLua"));
//! ```

pub use bytes::Bytes;
pub use std::io::SeekFrom;

mod error;
mod memory;
mod traits;

pub use error::LLError;
pub use memory::{MemoryDirectory, MemoryStream};
pub use traits::{read_to_end, Directory, Stream};

/// Normalize a file name for lookup: ASCII lowercase with `/` folded to `\`.
///
/// Attribute file names are case-insensitive and conventionally use
/// backslash separators.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' => '\\',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}
