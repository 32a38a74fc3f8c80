//! Error types for the Core layer.

/// Errors at the Core layer.
///
/// These are semantic errors about values and tables. Transport errors stay
/// in the LL layer; interpreter and codec failures live in their own crates.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A value was read as the wrong variant.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// A value that cannot be hashed was used as a table key.
    #[error("{found} cannot be used as a table key")]
    InvalidKey { found: &'static str },

    /// A transient function marker was about to be stored in a table.
    #[error("function marker {marker} cannot be stored in a table")]
    FunctionMarkerStored { marker: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_mismatch_display() {
        let e = Error::TypeMismatch {
            expected: "table",
            found: "string",
        };
        assert_eq!(
            format!("{}", e),
            "type mismatch: expected table, found string"
        );
    }

    #[test]
    fn invalid_key_display() {
        let e = Error::InvalidKey { found: "nil" };
        assert!(format!("{}", e).contains("nil cannot be used as a table key"));
    }

    #[test]
    fn marker_display() {
        let e = Error::FunctionMarkerStored {
            marker: "InheritMeta",
        };
        assert!(format!("{}", e).contains("InheritMeta"));
    }
}
