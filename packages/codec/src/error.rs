//! Error types for the codecs.

use attrib_ll_store::LLError;

/// Errors raised while writing or reading attribute data.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A value with no encoding reached a writer.
    #[error("cannot encode {found} value under key {key:#010x}")]
    UnsupportedValue { found: &'static str, key: u32 },

    /// A binary entry carried a type code this reader does not know.
    #[error("unknown type code {code} for key {key:#010x}")]
    UnknownTypeCode { code: u32, key: u32 },

    /// Binary data ended before a value did.
    #[error("truncated data at byte {offset}: wanted {wanted}, {available} available")]
    Truncated {
        offset: usize,
        wanted: usize,
        available: usize,
    },

    /// Binary tables nested deeper than the reader allows.
    #[error("tables nested deeper than {limit} levels")]
    NestingTooDeep { limit: usize },

    /// A table contains itself.
    #[error("table at {path} contains itself")]
    RecursiveTable { path: String },

    #[error("i/o error: {0}")]
    Io(#[from] LLError),

    #[error(transparent)]
    Value(#[from] attrib_core_store::Error),

    #[error(transparent)]
    Engine(#[from] attrib_engine::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_display_as_hex() {
        let e = Error::UnsupportedValue {
            found: "Reference",
            key: 0x49D6_0FAE,
        };
        assert_eq!(
            e.to_string(),
            "cannot encode Reference value under key 0x49d60fae"
        );
    }

    #[test]
    fn io_converts() {
        let e: Error = LLError::NotSupported.into();
        assert!(matches!(e, Error::Io(_)));
    }
}
