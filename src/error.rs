use std::path::PathBuf;

/// Errors surfaced by the mapping engine and its collaborators.
///
/// Only `Structure` is fatal inside a single document. Unmapped paths and
/// malformed codes never reach this type; they are logged and counted in
/// [`ParseStats`](crate::core::context::ParseStats).
#[derive(Debug, thiserror::Error)]
pub enum FilingError {
    /// The document could not be parsed into a tree.
    #[error("failed to parse filing {source_id}: {message}")]
    Structure { source_id: String, message: String },

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("mapping table {path}: {source}")]
    MappingTable {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("filing index {path}: {message}")]
    Index { path: PathBuf, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    /// A serialized record is larger than the store accepts; the caller picks a fallback.
    #[error("record {record_id} is {size} bytes, over the {limit} byte limit")]
    StorageOverflow {
        record_id: String,
        size: usize,
        limit: usize,
    },

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl FilingError {
    pub fn structure(source_id: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::Structure {
            source_id: source_id.into(),
            message: cause.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the failure is a size overflow that a fallback store can absorb.
    pub fn is_overflow(&self) -> bool {
        matches!(self, Self::StorageOverflow { .. })
    }
}

pub type Result<T> = std::result::Result<T, FilingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structure_error_names_the_source() {
        let parse_err = roxmltree::Document::parse("<Return>").unwrap_err();
        let err = FilingError::structure("https://example.org/1_public.xml", parse_err);
        assert!(err
            .to_string()
            .starts_with("failed to parse filing https://example.org/1_public.xml"));
        assert!(!err.is_overflow());
    }

    #[test]
    fn overflow_is_distinguishable() {
        let err = FilingError::StorageOverflow {
            record_id: "123_2018".into(),
            size: 20,
            limit: 10,
        };
        assert!(err.is_overflow());
        assert_eq!(
            err.to_string(),
            "record 123_2018 is 20 bytes, over the 10 byte limit"
        );
    }
}
