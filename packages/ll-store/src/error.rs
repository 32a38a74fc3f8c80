//! Error types for the LL layer.
//!
//! Errors at this level are transport-focused. No semantic errors like
//! "unsupported instruction" or "type mismatch" - those belong in higher layers.

/// Errors at the LL (low-level) layer.
#[derive(Debug)]
pub enum LLError {
    /// Generic I/O or transport failure.
    ///
    /// Use this for file I/O errors, archive read failures, etc.
    Transport(Box<dyn std::error::Error + Send + Sync>),

    /// The operation is not supported by this stream or directory.
    ///
    /// For example, writing to a stream opened for reading.
    NotSupported,

    /// The stream ended before the requested number of bytes was read.
    UnexpectedEof {
        /// Bytes requested.
        wanted: usize,
        /// Bytes that were actually available.
        available: usize,
    },

    /// A seek would move before the start of the stream.
    InvalidSeek {
        /// The resulting (negative) position.
        position: i64,
    },
}

impl std::fmt::Display for LLError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLError::Transport(e) => write!(f, "transport error: {}", e),
            LLError::NotSupported => write!(f, "operation not supported"),
            LLError::UnexpectedEof { wanted, available } => write!(
                f,
                "unexpected end of stream: wanted {} bytes, {} available",
                wanted, available
            ),
            LLError::InvalidSeek { position } => {
                write!(f, "invalid seek to position {}", position)
            }
        }
    }
}

impl std::error::Error for LLError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LLError::Transport(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for LLError {
    fn from(e: std::io::Error) -> Self {
        LLError::Transport(Box::new(e))
    }
}
