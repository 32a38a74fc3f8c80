//! The Value type - what tables hold and registers carry.

use bytes::Bytes;

use crate::{Error, KeyDictionary, Table};

/// A dynamically-typed attribute value.
///
/// Tables are held by shared handle: cloning a `Value::Table` adds an owner,
/// dropping it removes one, and the table is destroyed with its last owner.
///
/// # Design Notes
///
/// - Numbers are `f32`; the game engine stores single precision.
/// - Strings are raw bytes with an explicit length; embedded zeros are legal.
/// - `ReferenceFn` and `InheritMetaFn` exist only in interpreter registers,
///   between the global load and the call that consumes them.
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// Absence of a value.
    #[default]
    Nil,
    /// Single precision number.
    Float(f32),
    /// Raw byte string.
    String(Bytes),
    /// Boolean value.
    Boolean(bool),
    /// 32-bit integer (only produced by binary data, never by scripts).
    Integer(i32),
    /// Shared table handle.
    Table(Table),
    /// The `Inherit`/`Reference` entry point.
    ReferenceFn,
    /// The `InheritMeta` entry point.
    InheritMetaFn,
}

impl Value {
    /// Create a string value from text.
    pub fn string(s: impl AsRef<[u8]>) -> Self {
        Value::String(Bytes::copy_from_slice(s.as_ref()))
    }

    /// Name of the variant, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Table(_) => "table",
            Value::ReferenceFn => "Reference",
            Value::InheritMetaFn => "InheritMeta",
        }
    }

    /// Check if this value is nil.
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Check if this value is one of the transient function markers.
    pub fn is_function_marker(&self) -> bool {
        matches!(self, Value::ReferenceFn | Value::InheritMetaFn)
    }

    /// Script truthiness: only nil and false are false.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Boolean(false))
    }

    /// Borrow the table, or fail with a type mismatch.
    pub fn as_table(&self) -> Result<&Table, Error> {
        match self {
            Value::Table(t) => Ok(t),
            other => Err(other.mismatch("table")),
        }
    }

    /// Borrow the string bytes, or fail with a type mismatch.
    pub fn as_bytes(&self) -> Result<&[u8], Error> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(other.mismatch("string")),
        }
    }

    /// Borrow the string as UTF-8 text.
    ///
    /// Strings that are not valid UTF-8 are a mismatch too; use
    /// [`Value::as_bytes`] for those.
    pub fn as_str(&self) -> Result<&str, Error> {
        match self {
            Value::String(s) => std::str::from_utf8(s).map_err(|_| Error::TypeMismatch {
                expected: "utf-8 string",
                found: "string",
            }),
            other => Err(other.mismatch("string")),
        }
    }

    /// Get the number, or fail with a type mismatch.
    pub fn as_float(&self) -> Result<f32, Error> {
        match self {
            Value::Float(f) => Ok(*f),
            other => Err(other.mismatch("float")),
        }
    }

    /// Get the boolean, or fail with a type mismatch.
    pub fn as_bool(&self) -> Result<bool, Error> {
        match self {
            Value::Boolean(b) => Ok(*b),
            other => Err(other.mismatch("boolean")),
        }
    }

    fn mismatch(&self, expected: &'static str) -> Error {
        Error::TypeMismatch {
            expected,
            found: self.type_name(),
        }
    }

    /// Derive the table key for this value and record its name.
    ///
    /// Strings hash their raw bytes, booleans hash `"true"`/`"false"`, and
    /// numbers hash their [`canonical_number`] text so the same number always
    /// names the same key.
    pub fn key_hash(&self, dictionary: &KeyDictionary) -> Result<u32, Error> {
        match self {
            Value::String(s) => Ok(dictionary.hash_bytes(s)),
            Value::Boolean(true) => Ok(dictionary.hash_str("true")),
            Value::Boolean(false) => Ok(dictionary.hash_str("false")),
            Value::Float(f) => Ok(dictionary.hash_str(&canonical_number(*f))),
            Value::Integer(i) => Ok(dictionary.hash_str(&i.to_string())),
            other => Err(Error::InvalidKey {
                found: other.type_name(),
            }),
        }
    }
}

/// Render a number the way keys are named: `%.0f` when integral, else `%.7f`.
pub fn canonical_number(value: f32) -> String {
    if value.fract() == 0.0 {
        format_float(value, 0)
    } else {
        format_float(value, 7)
    }
}

/// `%.Nf` formatting, including C's `inf`/`nan` spellings.
pub fn format_float(value: f32, precision: usize) -> String {
    if value.is_nan() {
        let sign = if value.is_sign_negative() { "-" } else { "" };
        return format!("{}nan", sign);
    }
    format!("{:.*}", precision, value)
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => Table::ptr_eq(a, b),
            (Value::ReferenceFn, Value::ReferenceFn) => true,
            (Value::InheritMetaFn, Value::InheritMetaFn) => true,
            _ => false,
        }
    }
}

// Conversion from common types

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::string(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(Bytes::from(v.into_bytes()))
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Value::String(v)
    }
}

impl From<Table> for Value {
    fn from(v: Table) -> Self {
        Value::Table(v)
    }
}
