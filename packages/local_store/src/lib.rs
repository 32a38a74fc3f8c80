//! Local file system directories for attribute files.
//!
//! `LocalDirectory` maps attribute file names (`attrib\ebps\orc.lua`) onto
//! paths under a root directory. Lookups fall back to a case-insensitive
//! search, since attribute names are case-insensitive but most file systems
//! are not.

mod error;
mod local_disk;

pub use error::LocalStoreError;
pub use local_disk::{FileStream, LocalDirectory};
