//! A loaded attribute file.

use std::rc::Rc;

use attrib_core_store::{KeyDictionary, Table, Value, REF_KEY};

use crate::bytecode::Chunk;
use crate::config::Config;
use crate::error::Error;
use crate::interpreter::{Dependencies, Globals, Interpreter};

/// One file's name and the two tables its chunk produced.
#[derive(Clone, Debug)]
pub struct AttributeFile {
    name: Rc<str>,
    game_data: Value,
    meta_data: Value,
}

impl AttributeFile {
    /// Run `chunk` as the body of `name`.
    ///
    /// Inheritance calls go to `dependencies`. This is how the cache loads
    /// files, and how an editor loads the file being edited without caching
    /// it.
    pub fn run(
        name: &str,
        chunk: &Chunk,
        dictionary: &KeyDictionary,
        dependencies: &mut dyn Dependencies,
        config: &Config,
    ) -> Result<Self, Error> {
        let name: Rc<str> = Rc::from(name);
        let Globals {
            game_data,
            meta_data,
        } = Interpreter::new(chunk, Rc::clone(&name), dictionary, dependencies, config)?.run()?;
        Ok(AttributeFile {
            name,
            game_data,
            meta_data,
        })
    }

    /// Wrap tables built some other way, such as by a binary reader.
    pub fn from_tables(name: &str, game_data: Table, meta_data: Table) -> Self {
        AttributeFile {
            name: Rc::from(name),
            game_data: Value::Table(game_data),
            meta_data: Value::Table(meta_data),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn game_data(&self) -> &Value {
        &self.game_data
    }

    pub fn meta_data(&self) -> &Value {
        &self.meta_data
    }

    /// `GameData` as a table.
    pub fn game_table(&self) -> Result<&Table, Error> {
        Ok(self.game_data.as_table()?)
    }

    /// `MetaData` as a table.
    pub fn meta_table(&self) -> Result<&Table, Error> {
        Ok(self.meta_data.as_table()?)
    }

    /// The file `GameData` inherits from, as recorded under `$REF`.
    pub fn parent_name(&self, dictionary: &KeyDictionary) -> Option<String> {
        let table = self.game_data.as_table().ok()?;
        match table.own(dictionary.hash_str(REF_KEY))? {
            Value::String(name) if !name.is_empty() => {
                Some(String::from_utf8_lossy(&name).into_owned())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{ChunkBuilder, Instruction};

    struct NoDependencies;

    impl Dependencies for NoDependencies {
        fn game_data(&mut self, file: &str) -> Result<Value, Error> {
            Err(Error::NotFound {
                file: file.to_string(),
            })
        }

        fn meta_data(&mut self, file: &str) -> Result<Value, Error> {
            self.game_data(file)
        }
    }

    #[test]
    fn run_keeps_name_and_tables() {
        let dict = KeyDictionary::new();
        let mut b = ChunkBuilder::new();
        b.emit(Instruction::Return { a: 0, b: 1 });
        let file = AttributeFile::run(
            "units\\orc.lua",
            &b.build().unwrap(),
            &dict,
            &mut NoDependencies,
            &Config::default(),
        )
        .unwrap();
        assert_eq!(file.name(), "units\\orc.lua");
        assert_eq!(file.game_table().unwrap().own_len(), 0);
        assert_eq!(file.meta_table().unwrap().source(), Some("units\\orc.lua"));
        assert_eq!(file.parent_name(&dict), None);
    }

    #[test]
    fn parent_name_reads_ref() {
        let dict = KeyDictionary::new();
        let parent = Table::new(None);
        let child = Table::reference(
            &parent,
            None,
            dict.hash_str(REF_KEY),
            Value::from("base.lua"),
        );
        let file = AttributeFile::from_tables("x.lua", child, Table::new(None));
        assert_eq!(file.parent_name(&dict), Some("base.lua".to_string()));
    }
}
