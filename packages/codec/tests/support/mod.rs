//! A compiler for the text form, so written files can be loaded again.
//!
//! It accepts exactly the statements `TextWriter` emits:
//!
//! ```text
//! GameData = Inherit([[file]])
//! MetaData = InheritMeta([[file]])
//! Root["key"]["key"] = value    -- value: string, number, true, false, nil, {}, Reference([[file]])
//! ```

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::rc::Rc;

use attrib_core_store::{KeyDictionary, Table, Value, REF_KEY};
use attrib_engine::bytecode::{Chunk, ChunkBuilder, Instruction, Rk};
use attrib_engine::{DependencyCache, Error};
use attrib_ll_store::MemoryDirectory;

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Ident(String),
    Str(Vec<u8>),
    Num(f64),
    Punct(u8),
}

fn bad(message: impl Into<String>) -> Error {
    Error::InvalidChunk {
        message: message.into(),
    }
}

fn tokenize(src: &[u8]) -> Result<Vec<Token>, Error> {
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < src.len() {
        let c = src[i];
        if c.is_ascii_whitespace() {
            i += 1;
        } else if src[i..].starts_with(b"--") {
            while i < src.len() && src[i] != b'\n' {
                i += 1;
            }
        } else if c.is_ascii_alphabetic() || c == b'_' {
            let start = i;
            while i < src.len() && (src[i].is_ascii_alphanumeric() || src[i] == b'_') {
                i += 1;
            }
            tokens.push(Token::Ident(String::from_utf8_lossy(&src[start..i]).into_owned()));
        } else if c == b'"' {
            i += 1;
            let mut s = Vec::new();
            loop {
                match src.get(i) {
                    None => return Err(bad("unterminated string")),
                    Some(b'"') => break,
                    Some(b'\\') => {
                        let digits = src[i + 1..]
                            .iter()
                            .take(3)
                            .take_while(|d| d.is_ascii_digit())
                            .count();
                        if digits > 0 {
                            let text = std::str::from_utf8(&src[i + 1..i + 1 + digits])
                                .map_err(|e| bad(e.to_string()))?;
                            s.push(text.parse().map_err(|_| bad("bad escape"))?);
                            i += 1 + digits;
                        } else {
                            let escaped = *src.get(i + 1).ok_or_else(|| bad("bad escape"))?;
                            s.push(match escaped {
                                b'n' => b'\n',
                                b'r' => b'\r',
                                b't' => b'\t',
                                other => other,
                            });
                            i += 2;
                        }
                    }
                    Some(&b) => {
                        s.push(b);
                        i += 1;
                    }
                }
            }
            tokens.push(Token::Str(s));
            i += 1;
        } else if c == b'-' || c.is_ascii_digit() {
            let start = i;
            i += 1;
            while i < src.len() && (src[i].is_ascii_digit() || src[i] == b'.') {
                i += 1;
            }
            let text = std::str::from_utf8(&src[start..i]).map_err(|e| bad(e.to_string()))?;
            tokens.push(Token::Num(text.parse().map_err(|_| bad(format!("bad number {}", text)))?));
        } else if c == b'[' {
            let mut level = 0;
            while src.get(i + 1 + level) == Some(&b'=') {
                level += 1;
            }
            if src.get(i + 1 + level) == Some(&b'[') {
                i += 2 + level;
                // One newline right after the opening bracket is dropped.
                match (src.get(i), src.get(i + 1)) {
                    (Some(b'\r'), Some(b'\n')) | (Some(b'\n'), Some(b'\r')) => i += 2,
                    (Some(b'\r'), _) | (Some(b'\n'), _) => i += 1,
                    _ => {}
                }
                let mut close = vec![b']'];
                close.extend(std::iter::repeat(b'=').take(level));
                close.push(b']');
                let start = i;
                let end = src[start..]
                    .windows(close.len())
                    .position(|w| w == close.as_slice())
                    .ok_or_else(|| bad("unterminated long string"))?;
                tokens.push(Token::Str(src[start..start + end].to_vec()));
                i = start + end + close.len();
            } else {
                tokens.push(Token::Punct(b'['));
                i += 1;
            }
        } else if b"]=(){}".contains(&c) {
            tokens.push(Token::Punct(c));
            i += 1;
        } else {
            return Err(bad(format!("unexpected byte {:#04x}", c)));
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    at: usize,
    b: ChunkBuilder,
}

impl Parser {
    fn next(&mut self) -> Result<Token, Error> {
        let token = self
            .tokens
            .get(self.at)
            .cloned()
            .ok_or_else(|| bad("unexpected end of input"))?;
        self.at += 1;
        Ok(token)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.at)
    }

    fn expect(&mut self, punct: u8) -> Result<(), Error> {
        match self.next()? {
            Token::Punct(p) if p == punct => Ok(()),
            other => Err(bad(format!("expected '{}', found {:?}", punct as char, other))),
        }
    }

    fn string(&mut self) -> Result<Vec<u8>, Error> {
        match self.next()? {
            Token::Str(s) => Ok(s),
            other => Err(bad(format!("expected a string, found {:?}", other))),
        }
    }

    fn constant_string(&mut self, s: &[u8]) -> u32 {
        self.b.constant(attrib_engine::bytecode::Constant::String(s.to_vec().into()))
    }

    /// `f(str)` into R(a), with the argument in R(a + 1).
    fn call(&mut self, a: u8, function: &str) -> Result<(), Error> {
        self.expect(b'(')?;
        let arg = self.string()?;
        self.expect(b')')?;
        let f = self.b.string(function);
        let k = self.constant_string(&arg);
        self.b.emit(Instruction::GetGlobal { a, bx: f });
        self.b.emit(Instruction::LoadK { a: a + 1, bx: k });
        self.b.emit(Instruction::Call { a, b: 2, c: 2 });
        Ok(())
    }

    fn statement(&mut self, root: String) -> Result<(), Error> {
        let root_k = self.b.string(&root);
        if self.peek() == Some(&Token::Punct(b'=')) {
            self.next()?;
            let function = match self.next()? {
                Token::Ident(f) if f == "Inherit" || f == "InheritMeta" => f,
                other => return Err(bad(format!("expected Inherit, found {:?}", other))),
            };
            self.call(0, &function)?;
            self.b.emit(Instruction::SetGlobal { a: 0, bx: root_k });
            return Ok(());
        }

        let mut keys = Vec::new();
        while self.peek() == Some(&Token::Punct(b'[')) {
            self.next()?;
            keys.push(self.string()?);
            self.expect(b']')?;
        }
        let Some(last) = keys.pop() else {
            return Err(bad("assignment without a key"));
        };
        self.expect(b'=')?;

        self.b.emit(Instruction::GetGlobal { a: 0, bx: root_k });
        for key in &keys {
            let k = self.constant_string(key);
            self.b.emit(Instruction::GetTable {
                a: 0,
                b: 0,
                c: Rk::Constant(k as u16),
            });
        }

        match self.next()? {
            Token::Str(s) => {
                let k = self.constant_string(&s);
                self.b.emit(Instruction::LoadK { a: 1, bx: k });
            }
            Token::Num(n) => {
                let k = self.b.number(n);
                self.b.emit(Instruction::LoadK { a: 1, bx: k });
            }
            Token::Ident(word) if word == "true" || word == "false" => {
                self.b.emit(Instruction::LoadBool {
                    a: 1,
                    value: word == "true",
                    skip: false,
                });
            }
            Token::Ident(word) if word == "nil" => {
                self.b.emit(Instruction::LoadNil { a: 1, b: 1 });
            }
            Token::Ident(word) if word == "Reference" => self.call(1, "Reference")?,
            Token::Punct(b'{') => {
                self.expect(b'}')?;
                self.b.emit(Instruction::NewTable {
                    a: 1,
                    array: 0,
                    hash: 0,
                });
            }
            other => return Err(bad(format!("unexpected value {:?}", other))),
        }

        let k = self.constant_string(&last);
        self.b.emit(Instruction::SetTable {
            a: 0,
            b: Rk::Constant(k as u16),
            c: Rk::Register(1),
        });
        Ok(())
    }
}

/// Compile text-form source into a chunk.
pub fn compile(_name: &str, src: &[u8]) -> Result<Chunk, Error> {
    let mut parser = Parser {
        tokens: tokenize(src)?,
        at: 0,
        b: ChunkBuilder::new(),
    };
    while parser.peek().is_some() {
        match parser.next()? {
            Token::Ident(root) if root == "GameData" || root == "MetaData" => {
                parser.statement(root)?
            }
            other => return Err(bad(format!("unexpected {:?}", other))),
        }
    }
    parser.b.emit(Instruction::Return { a: 0, b: 1 });
    parser.b.build()
}

/// A cache over text sources.
pub fn text_cache(
    files: &[(&str, &str)],
) -> (DependencyCache<MemoryDirectory>, Rc<KeyDictionary>) {
    let mut dir = MemoryDirectory::new();
    for (name, text) in files {
        dir.insert(name, text.replace('\n', "\r\n").into_bytes());
    }
    let dict = Rc::new(KeyDictionary::new());
    let cache = DependencyCache::new(dir, Rc::clone(&dict)).with_compiler(compile);
    (cache, dict)
}

/// A table's whole chain, resolved, without `$REF` entries.
#[derive(Debug, PartialEq)]
pub enum Flat {
    Scalar(Value),
    Table(BTreeMap<u32, Flat>),
}

pub fn flatten(table: &Table, dictionary: &KeyDictionary) -> BTreeMap<u32, Flat> {
    let ref_key = dictionary.hash_str(REF_KEY);
    table
        .merged_keys()
        .into_iter()
        .filter(|key| *key != ref_key)
        .filter_map(|key| match table.lookup(key) {
            Value::Nil => None,
            Value::Table(t) => Some((key, Flat::Table(flatten(&t, dictionary)))),
            scalar => Some((key, Flat::Scalar(scalar))),
        })
        .collect()
}
