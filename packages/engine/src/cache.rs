//! The dependency cache.
//!
//! Every file named by an inheritance call is loaded through here, once.
//! Diamond-shaped inheritance therefore sees one shared copy of each
//! ancestor, and large dependency graphs are only interpreted once.

use std::collections::HashMap;
use std::rc::Rc;

use attrib_core_store::{hash, hash_filename, KeyDictionary, Table, Value};
use attrib_ll_store::{normalize_name, read_to_end, Directory};

use crate::compiler::{Compiler, PrecompiledChunks};
use crate::config::Config;
use crate::error::Error;
use crate::file::AttributeFile;
use crate::interpreter::Dependencies;
use crate::memo::BinaryMemo;

/// Loads attribute files by name and keeps them for the session.
///
/// Files are inserted only after they load completely, so a failed load
/// leaves nothing behind. A file that inherits from itself, directly or
/// through other files, is rejected with [`Error::InheritanceCycle`].
pub struct DependencyCache<D: Directory> {
    directory: D,
    dictionary: Rc<KeyDictionary>,
    compiler: Box<dyn Compiler>,
    config: Config,
    files: Vec<Rc<AttributeFile>>,
    /// Filename hash to (normalized name, slot in `files`); names sharing a
    /// hash share a bucket.
    index: HashMap<u32, Vec<(String, usize)>>,
    loading: Vec<String>,
    empty: Rc<AttributeFile>,
    memo: BinaryMemo,
}

impl<D: Directory> DependencyCache<D> {
    /// Create a cache reading precompiled chunks from `directory`.
    pub fn new(directory: D, dictionary: Rc<KeyDictionary>) -> Self {
        let empty = Table::new(None);
        DependencyCache {
            directory,
            dictionary,
            compiler: Box::new(PrecompiledChunks),
            config: Config::default(),
            files: Vec::new(),
            index: HashMap::new(),
            loading: Vec::new(),
            empty: Rc::new(AttributeFile::from_tables("", empty.clone(), empty)),
            memo: BinaryMemo::new(),
        }
    }

    /// Use `compiler` to turn file bytes into chunks.
    pub fn with_compiler(mut self, compiler: impl Compiler + 'static) -> Self {
        self.compiler = Box::new(compiler);
        self
    }

    /// Use `config` for every chunk this cache runs.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Get a file, loading it on first request.
    ///
    /// An empty name yields a file whose tables are both the shared empty
    /// table.
    pub fn get_file(&mut self, name: &str) -> Result<Rc<AttributeFile>, Error> {
        if name.is_empty() {
            return Ok(Rc::clone(&self.empty));
        }

        let normalized = normalize_name(name);
        if let Some(slot) = self.slot(&normalized) {
            log::debug!("Cache hit for {}", name);
            return Ok(Rc::clone(&self.files[slot]));
        }

        if self.loading.contains(&normalized) {
            let mut chain = self.loading.clone();
            chain.push(normalized);
            return Err(Error::InheritanceCycle { chain });
        }

        self.loading.push(normalized.clone());
        let loaded = self.load(name);
        self.loading.pop();

        let file = Rc::new(loaded?);
        self.index
            .entry(hash_filename(name))
            .or_default()
            .push((normalized, self.files.len()));
        self.files.push(Rc::clone(&file));
        Ok(file)
    }

    fn slot(&self, normalized: &str) -> Option<usize> {
        let bucket = self.index.get(&hash(normalized.as_bytes()))?;
        bucket
            .iter()
            .find(|(name, _)| name == normalized)
            .map(|(_, slot)| *slot)
    }

    fn load(&mut self, name: &str) -> Result<AttributeFile, Error> {
        log::debug!("Loading {}...", name);
        let io = |source| Error::Io {
            file: name.to_string(),
            source,
        };
        let mut stream = self
            .directory
            .open_read(name)
            .map_err(io)?
            .ok_or_else(|| Error::NotFound {
                file: name.to_string(),
            })?;
        let bytes = read_to_end(&mut *stream).map_err(io)?;

        let wrap = |source: Error| Error::Load {
            file: name.to_string(),
            source: Box::new(source),
        };
        let chunk = self.compiler.compile(name, &bytes).map_err(wrap)?;
        let dictionary = Rc::clone(&self.dictionary);
        let config = self.config.clone();
        AttributeFile::run(name, &chunk, &dictionary, self, &config).map_err(wrap)
    }

    /// `GameData` of `name`.
    pub fn get_game_data(&mut self, name: &str) -> Result<Value, Error> {
        Ok(self.get_file(name)?.game_data().clone())
    }

    /// `MetaData` of `name`.
    pub fn get_meta_data(&mut self, name: &str) -> Result<Value, Error> {
        Ok(self.get_file(name)?.meta_data().clone())
    }

    /// Check if `name` is loaded.
    pub fn contains(&self, name: &str) -> bool {
        self.slot(&normalize_name(name)).is_some()
    }

    /// Number of loaded files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if nothing has been loaded yet.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Loaded files, in the order their loads completed.
    pub fn files(&self) -> impl Iterator<Item = &Rc<AttributeFile>> {
        self.files.iter()
    }

    /// The key dictionary shared with every loaded file.
    pub fn dictionary(&self) -> &Rc<KeyDictionary> {
        &self.dictionary
    }

    /// Limits applied to each chunk run.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The directory files are read from.
    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// The directory, for writing output next to the sources.
    pub fn directory_mut(&mut self) -> &mut D {
        &mut self.directory
    }

    /// Binary output remembered for this session.
    pub fn memo(&self) -> &BinaryMemo {
        &self.memo
    }

    /// The memo, to hand to a binary writer.
    pub fn memo_mut(&mut self) -> &mut BinaryMemo {
        &mut self.memo
    }

    /// The table returned for an empty file name.
    pub fn empty_table(&self) -> Result<&Table, Error> {
        self.empty.game_table()
    }

    /// End the session: drop every file and memo entry and forget every
    /// recorded key name.
    pub fn close(mut self) -> D {
        log::debug!(
            "Closing cache ({} files, {} memoized tables)",
            self.files.len(),
            self.memo.len()
        );
        self.memo.clear();
        self.index.clear();
        self.files.clear();
        self.dictionary.clear();
        self.directory
    }
}

impl<D: Directory> Dependencies for DependencyCache<D> {
    fn game_data(&mut self, file: &str) -> Result<Value, Error> {
        self.get_game_data(file)
    }

    fn meta_data(&mut self, file: &str) -> Result<Value, Error> {
        self.get_meta_data(file)
    }
}
