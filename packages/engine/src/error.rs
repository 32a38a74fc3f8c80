//! Error types for the engine.

use std::fmt;

use attrib_ll_store::LLError;

/// Where in a chunk an error happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Location {
    /// Index of the instruction.
    pub pc: usize,
    /// Source line, when the chunk carries line info.
    pub line: Option<u32>,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "pc {} (line {})", self.pc, line),
            None => write!(f, "pc {}", self.pc),
        }
    }
}

/// Errors raised while loading or interpreting attribute files.
///
/// Every error is fatal for the file being processed. Failures inside a
/// dependency are wrapped in [`Error::Load`] once per file on the way out, so
/// the message names the whole chain of files.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An instruction outside the supported subset.
    #[error("unsupported instruction {opcode} at {location}")]
    UnsupportedInstruction {
        opcode: String,
        location: Location,
    },

    /// A global other than the five the dialect knows.
    #[error("unsupported global '{name}' at {location}")]
    UnsupportedGlobal { name: String, location: Location },

    /// A call with an argument or result count other than one.
    #[error("unsupported call at {location}: {reason}")]
    UnsupportedCall { reason: String, location: Location },

    /// The callee register held something other than a function marker.
    #[error("cannot call a {found} value at {location}")]
    NotCallable {
        found: &'static str,
        location: Location,
    },

    /// An inheritance call produced something other than a table.
    #[error("{call}('{file}') returned {found}, expected a table")]
    NonTableResult {
        call: &'static str,
        file: String,
        found: &'static str,
    },

    /// A value or table operation failed while executing.
    #[error("{source} at {location}")]
    Runtime {
        source: attrib_core_store::Error,
        location: Location,
    },

    /// A value or table operation failed outside the interpreter.
    #[error(transparent)]
    Value(#[from] attrib_core_store::Error),

    #[error("register {register} out of range (window of {size})")]
    RegisterOutOfRange { register: usize, size: usize },

    #[error("constant {index} out of range (pool of {size})")]
    ConstantOutOfRange { index: usize, size: usize },

    #[error("jump to {target} out of range at {location}")]
    JumpOutOfRange { target: i64, location: Location },

    /// Execution ran past the last instruction.
    #[error("chunk ended without a return")]
    MissingReturn,

    #[error("step limit of {limit} instructions exceeded")]
    StepLimit { limit: usize },

    #[error("chunk needs {requested} registers, limit is {limit}")]
    TooManyRegisters { requested: usize, limit: usize },

    /// The chunk bytes are not a chunk this engine can read.
    #[error("invalid chunk: {message}")]
    InvalidChunk { message: String },

    #[error("file '{file}' not found")]
    NotFound { file: String },

    #[error("i/o error on '{file}': {source}")]
    Io { file: String, source: LLError },

    /// A file inherits from itself, directly or through other files.
    #[error("inheritance cycle: {}", .chain.join(" -> "))]
    InheritanceCycle { chain: Vec<String> },

    /// Context added once per file while an error propagates outward.
    #[error("while loading '{file}': {source}")]
    Load { file: String, source: Box<Error> },
}

impl Error {
    pub(crate) fn invalid_chunk(message: impl Into<String>) -> Self {
        Error::InvalidChunk {
            message: message.into(),
        }
    }

    /// The innermost error, skipping [`Error::Load`] wrappers.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Load { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Files named by [`Error::Load`] wrappers, outermost first.
    pub fn file_chain(&self) -> Vec<&str> {
        let mut chain = Vec::new();
        let mut current = self;
        while let Error::Load { file, source } = current {
            chain.push(file.as_str());
            current = source;
        }
        chain
    }
}
