use std::{io, path};

use attrib_ll_store::LLError;

/// Errors from local directories.
#[derive(Debug, thiserror::Error)]
pub enum LocalStoreError {
    #[error("root path {path:?} is invalid: {error}")]
    RootPathInvalid { path: path::PathBuf, error: io::Error },

    /// A name that would escape the root or has an empty component.
    #[error("file name '{name}' is invalid")]
    InvalidName { name: String },

    #[error("directory is read-only")]
    ReadOnly,

    #[error("i/o error on {path:?}: {error}")]
    Io { path: path::PathBuf, error: io::Error },
}

impl From<LocalStoreError> for LLError {
    fn from(e: LocalStoreError) -> Self {
        match e {
            LocalStoreError::ReadOnly => LLError::NotSupported,
            other => LLError::Transport(Box::new(other)),
        }
    }
}
