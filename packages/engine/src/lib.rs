//! Attribute engine: runs compiled attribute chunks and caches their results.
//!
//! - `bytecode`: the chunk format, the decoded instruction set and an assembler
//! - `Interpreter`: executes one chunk against a file's `GameData`/`MetaData`
//! - `DependencyCache`: loads each inherited file at most once per session
//! - `BinaryMemo`: remembers serialized bytes for shared unchanged tables
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use attrib_core_store::{KeyDictionary, Value};
//! use attrib_engine::bytecode::{ChunkBuilder, Instruction, Rk};
//! use attrib_engine::DependencyCache;
//! use attrib_ll_store::MemoryDirectory;
//!
//! // GameData["name"] = "orc"
//! let mut b = ChunkBuilder::new();
//! let game_data = b.string("GameData");
//! let name = b.string("name");
//! let orc = b.string("orc");
//! b.emit(Instruction::GetGlobal { a: 0, bx: game_data });
//! b.emit(Instruction::SetTable { a: 0, b: Rk::Constant(name as u16), c: Rk::Constant(orc as u16) });
//! b.emit(Instruction::Return { a: 0, b: 1 });
//!
//! let mut dir = MemoryDirectory::new();
//! dir.insert("orc.lua", b.build().unwrap().to_bytes().to_vec());
//!
//! let dict = Rc::new(KeyDictionary::new());
//! let mut cache = DependencyCache::new(dir, Rc::clone(&dict));
//! let data = cache.get_game_data("orc.lua").unwrap();
//! assert_eq!(data.as_table().unwrap().lookup(dict.hash_str("name")), Value::from("orc"));
//! ```

pub mod bytecode;
mod cache;
mod compiler;
mod config;
mod error;
mod file;
mod interpreter;
mod memo;

pub use cache::DependencyCache;
pub use compiler::{Compiler, PrecompiledChunks};
pub use config::Config;
pub use error::{Error, Location};
pub use file::AttributeFile;
pub use interpreter::{Dependencies, Globals, Interpreter};
pub use memo::BinaryMemo;
