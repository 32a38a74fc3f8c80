//! Attribute files: run compiled attribute chunks, resolve their inheritance
//! chains, and write them back out as text deltas or flattened binaries.
//!
//! The layers are separate crates and are re-exported here:
//! - [`ll`]: byte streams and directories
//! - [`core`]: hashing, the key dictionary, values and inheriting tables
//! - [`engine`]: chunk decoding, the interpreter and the dependency cache
//! - [`codec`]: the text and binary writers
//! - [`local`]: directories on the local file system
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use attrib::bytecode::{ChunkBuilder, Instruction};
//! use attrib::{write_file, DependencyCache, Format, KeyDictionary, MemoryDirectory, MemoryStream};
//!
//! // GameData = Inherit([[base.lua]])
//! let mut b = ChunkBuilder::new();
//! let game_data = b.string("GameData");
//! let inherit = b.string("Inherit");
//! let base = b.string("base.lua");
//! b.emit(Instruction::GetGlobal { a: 0, bx: inherit });
//! b.emit(Instruction::LoadK { a: 1, bx: base });
//! b.emit(Instruction::Call { a: 0, b: 2, c: 2 });
//! b.emit(Instruction::SetGlobal { a: 0, bx: game_data });
//! b.emit(Instruction::Return { a: 0, b: 1 });
//!
//! let mut empty = ChunkBuilder::new();
//! empty.emit(Instruction::Return { a: 0, b: 1 });
//!
//! let mut dir = MemoryDirectory::new();
//! dir.insert("base.lua", empty.build().unwrap().to_bytes().to_vec());
//! dir.insert("orc.lua", b.build().unwrap().to_bytes().to_vec());
//!
//! let dict = Rc::new(KeyDictionary::new());
//! let mut cache = DependencyCache::new(dir, Rc::clone(&dict));
//! let orc = cache.get_file("orc.lua").unwrap();
//! assert_eq!(orc.parent_name(&dict).as_deref(), Some("base.lua"));
//!
//! let mut out = MemoryStream::new();
//! write_file(Format::Text, &orc, &dict, None, &mut out).unwrap();
//! let text = String::from_utf8(out.to_bytes().to_vec()).unwrap();
//! assert!(text.contains("GameData = Inherit([[base.lua]])\r\n"));
//! ```

pub use attrib_codec as codec;
pub use attrib_core_store as core;
pub use attrib_engine as engine;
pub use attrib_ll_store as ll;
pub use attrib_local_store as local;

pub use attrib_codec::{write_file, BinaryReader, BinaryWriter, Format, TextOptions, TextWriter};
pub use attrib_core_store::{hash, KeyDictionary, Table, Value};
pub use attrib_engine::{
    bytecode, AttributeFile, BinaryMemo, Compiler, Config, DependencyCache, PrecompiledChunks,
};
pub use attrib_ll_store::{Directory, MemoryDirectory, MemoryStream, Stream};
pub use attrib_local_store::LocalDirectory;
