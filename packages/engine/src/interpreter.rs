//! The restricted bytecode interpreter.
//!
//! One [`Interpreter`] runs one chunk once. It knows five globals and three
//! entry points; anything else in the chunk is an error. Inheritance calls
//! are answered by a [`Dependencies`] implementation, normally the
//! [`DependencyCache`](crate::DependencyCache).

use std::rc::Rc;

use attrib_core_store::{KeyDictionary, Table, Value, REF_KEY};

use crate::bytecode::instruction::opcode_field;
use crate::bytecode::{Chunk, Constant, Instruction, OpCode, Rk};
use crate::config::Config;
use crate::error::{Error, Location};

/// Resolves the files named by inheritance calls.
pub trait Dependencies {
    /// `GameData` of `file`, for `Inherit` and `Reference`.
    fn game_data(&mut self, file: &str) -> Result<Value, Error>;

    /// `MetaData` of `file`, for `InheritMeta`.
    fn meta_data(&mut self, file: &str) -> Result<Value, Error>;
}

/// The two data globals a chunk leaves behind.
#[derive(Clone, Debug)]
pub struct Globals {
    pub game_data: Value,
    pub meta_data: Value,
}

#[derive(Clone, Copy)]
enum Global {
    GameData,
    MetaData,
    Inherit,
    Reference,
    InheritMeta,
}

impl Global {
    fn from_name(name: &[u8]) -> Option<Global> {
        Some(match name {
            b"GameData" => Global::GameData,
            b"MetaData" => Global::MetaData,
            b"Inherit" => Global::Inherit,
            b"Reference" => Global::Reference,
            b"InheritMeta" => Global::InheritMeta,
            _ => return None,
        })
    }
}

/// Executes one chunk against one file's globals.
pub struct Interpreter<'a> {
    chunk: &'a Chunk,
    file: Rc<str>,
    dictionary: &'a KeyDictionary,
    dependencies: &'a mut dyn Dependencies,
    max_steps: usize,
    constants: Vec<Value>,
    registers: Vec<Value>,
    globals: Globals,
    pc: usize,
}

impl<'a> Interpreter<'a> {
    /// Prepare to run `chunk` as the body of `file`.
    ///
    /// Both data globals start out as fresh empty tables owned by `file`.
    pub fn new(
        chunk: &'a Chunk,
        file: Rc<str>,
        dictionary: &'a KeyDictionary,
        dependencies: &'a mut dyn Dependencies,
        config: &Config,
    ) -> Result<Self, Error> {
        let window = chunk.max_stack_size as usize;
        if window > config.max_registers {
            return Err(Error::TooManyRegisters {
                requested: window,
                limit: config.max_registers,
            });
        }

        let constants = chunk
            .constants
            .iter()
            .map(|constant| match constant {
                Constant::Nil => Value::Nil,
                Constant::Boolean(b) => Value::Boolean(*b),
                // Scripts only ever carry single precision numbers.
                Constant::Number(n) => Value::Float(*n as f32),
                Constant::String(s) => Value::String(s.clone()),
            })
            .collect();

        let globals = Globals {
            game_data: Value::Table(Table::new(Some(Rc::clone(&file)))),
            meta_data: Value::Table(Table::new(Some(Rc::clone(&file)))),
        };

        Ok(Interpreter {
            chunk,
            file,
            dictionary,
            dependencies,
            max_steps: config.max_steps,
            constants,
            registers: vec![Value::Nil; window],
            globals,
            pc: 0,
        })
    }

    /// Run until `RETURN`.
    pub fn run(mut self) -> Result<Globals, Error> {
        log::debug!(
            "Running {} ({} instructions, {} constants)",
            self.file,
            self.chunk.code.len(),
            self.constants.len()
        );
        let mut steps = 0usize;
        loop {
            let Some(&raw) = self.chunk.code.get(self.pc) else {
                return Err(Error::MissingReturn);
            };
            steps += 1;
            if steps > self.max_steps {
                return Err(Error::StepLimit {
                    limit: self.max_steps,
                });
            }
            let Some(instruction) = Instruction::decode(raw) else {
                let op = opcode_field(raw);
                let opcode = OpCode::from_u8(op)
                    .map(|op| op.name().to_string())
                    .unwrap_or_else(|| format!("opcode {}", op));
                return Err(Error::UnsupportedInstruction {
                    opcode,
                    location: self.location(),
                });
            };
            if !self.step(instruction)? {
                return Ok(self.globals);
            }
        }
    }

    fn location(&self) -> Location {
        Location {
            pc: self.pc,
            line: self.chunk.line(self.pc),
        }
    }

    fn runtime(&self, source: attrib_core_store::Error) -> Error {
        Error::Runtime {
            source,
            location: self.location(),
        }
    }

    fn register(&self, r: usize) -> Result<&Value, Error> {
        self.registers.get(r).ok_or(Error::RegisterOutOfRange {
            register: r,
            size: self.registers.len(),
        })
    }

    fn set_register(&mut self, r: usize, value: Value) -> Result<(), Error> {
        let size = self.registers.len();
        let slot = self
            .registers
            .get_mut(r)
            .ok_or(Error::RegisterOutOfRange { register: r, size })?;
        *slot = value;
        Ok(())
    }

    fn constant(&self, k: usize) -> Result<&Value, Error> {
        self.constants.get(k).ok_or(Error::ConstantOutOfRange {
            index: k,
            size: self.constants.len(),
        })
    }

    fn rk(&self, operand: Rk) -> Result<&Value, Error> {
        match operand {
            Rk::Register(r) => self.register(r as usize),
            Rk::Constant(k) => self.constant(k as usize),
        }
    }

    fn table_in(&self, r: usize) -> Result<Table, Error> {
        let value = self.register(r)?;
        value
            .as_table()
            .cloned()
            .map_err(|e| self.runtime(e))
    }

    fn key(&self, operand: Rk) -> Result<u32, Error> {
        self.rk(operand)?
            .key_hash(self.dictionary)
            .map_err(|e| self.runtime(e))
    }

    fn global(&self, bx: u32) -> Result<Global, Error> {
        let name = self.constant(bx as usize)?;
        let found = match name {
            Value::String(s) => Global::from_name(s),
            _ => None,
        };
        found.ok_or_else(|| Error::UnsupportedGlobal {
            name: match name {
                Value::String(s) => String::from_utf8_lossy(s).into_owned(),
                other => format!("<{}>", other.type_name()),
            },
            location: self.location(),
        })
    }

    /// Execute one instruction. Returns `false` on `RETURN`.
    fn step(&mut self, instruction: Instruction) -> Result<bool, Error> {
        let mut next = self.pc + 1;
        match instruction {
            Instruction::Move { a, b } => {
                let value = self.register(b as usize)?.clone();
                self.set_register(a as usize, value)?;
            }
            Instruction::LoadK { a, bx } => {
                let value = self.constant(bx as usize)?.clone();
                self.set_register(a as usize, value)?;
            }
            Instruction::LoadBool { a, value, skip } => {
                self.set_register(a as usize, Value::Boolean(value))?;
                if skip {
                    next += 1;
                }
            }
            Instruction::LoadNil { a, b } => {
                for r in a as usize..=b as usize {
                    self.set_register(r, Value::Nil)?;
                }
            }
            Instruction::GetGlobal { a, bx } => {
                let value = match self.global(bx)? {
                    Global::GameData => self.globals.game_data.clone(),
                    Global::MetaData => self.globals.meta_data.clone(),
                    Global::Inherit | Global::Reference => Value::ReferenceFn,
                    Global::InheritMeta => Value::InheritMetaFn,
                };
                self.set_register(a as usize, value)?;
            }
            Instruction::SetGlobal { a, bx } => {
                let global = self.global(bx)?;
                let value = self.register(a as usize)?.clone();
                if !matches!(value, Value::Table(_)) {
                    return Err(self.runtime(attrib_core_store::Error::TypeMismatch {
                        expected: "table",
                        found: value.type_name(),
                    }));
                }
                match global {
                    Global::GameData => self.globals.game_data = value,
                    Global::MetaData => self.globals.meta_data = value,
                    _ => {
                        return Err(Error::UnsupportedGlobal {
                            name: "assignment to a function".to_string(),
                            location: self.location(),
                        })
                    }
                }
            }
            Instruction::GetTable { a, b, c } => {
                let table = self.table_in(b as usize)?;
                let key = self.key(c)?;
                self.set_register(a as usize, table.get(key))?;
            }
            Instruction::SetTable { a, b, c } => {
                let table = self.table_in(a as usize)?;
                let key = self.key(b)?;
                let value = self.rk(c)?.clone();
                table.set(key, value).map_err(|e| self.runtime(e))?;
            }
            Instruction::NewTable { a, .. } => {
                let table = Table::new(Some(Rc::clone(&self.file)));
                self.set_register(a as usize, Value::Table(table))?;
            }
            Instruction::Not { a, b } => {
                let value = !self.register(b as usize)?.is_truthy();
                self.set_register(a as usize, Value::Boolean(value))?;
            }
            Instruction::Jmp { offset } => {
                let target = next as i64 + offset as i64;
                if target < 0 || target > self.chunk.code.len() as i64 {
                    return Err(Error::JumpOutOfRange {
                        target,
                        location: self.location(),
                    });
                }
                next = target as usize;
            }
            Instruction::Call { a, b, c } => {
                let result = self.call(a as usize, b, c)?;
                self.set_register(a as usize, result)?;
            }
            Instruction::Return { .. } => return Ok(false),
        }
        self.pc = next;
        Ok(true)
    }

    fn call(&mut self, a: usize, b: u16, c: u16) -> Result<Value, Error> {
        if b != 2 {
            return Err(Error::UnsupportedCall {
                reason: format!("expected exactly one argument, B = {}", b),
                location: self.location(),
            });
        }
        if c != 2 {
            return Err(Error::UnsupportedCall {
                reason: format!("expected exactly one result, C = {}", c),
                location: self.location(),
            });
        }

        let call = match self.register(a)? {
            Value::ReferenceFn => "Reference",
            Value::InheritMetaFn => "InheritMeta",
            other => {
                return Err(Error::NotCallable {
                    found: other.type_name(),
                    location: self.location(),
                })
            }
        };
        let argument = self.register(a + 1)?.clone();
        let name = match argument.as_bytes() {
            Ok(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            Err(e) => return Err(self.runtime(e)),
        };

        log::trace!("{}: {}([[{}]])", self.file, call, name);
        let result = if call == "InheritMeta" {
            self.dependencies.meta_data(&name)?
        } else {
            self.dependencies.game_data(&name)?
        };
        let parent = match result {
            Value::Table(table) => table,
            other => {
                return Err(Error::NonTableResult {
                    call,
                    file: name,
                    found: other.type_name(),
                })
            }
        };

        let ref_key = self.dictionary.hash_str(REF_KEY);
        let child = Table::reference(&parent, Some(Rc::clone(&self.file)), ref_key, argument);
        Ok(Value::Table(child))
    }
}
