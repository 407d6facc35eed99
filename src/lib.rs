pub mod core {
    pub mod assembler;
    pub mod code;
    pub mod context;
    pub mod filing;
    pub mod flatten;
    pub mod group;
    pub mod mapping;
    pub mod parser;
    pub mod partition;
    pub mod writer;
}

pub mod utils {
    pub mod document_processor;
    pub mod index;
}

pub mod config;
pub mod error;

pub use crate::config::{EngineConfig, MetadataPolicy};
pub use crate::core::filing::{ParsedFiling, ReturnForm};
pub use crate::core::mapping::MappingIndex;
pub use crate::core::parser::FilingParser;
pub use crate::error::{FilingError, Result};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One reconstructed group element: cleaned field name to value.
pub type Row = IndexMap<String, String>;

/// Group code to its rows, in document order.
pub type GroupTable = IndexMap<String, Vec<Row>>;

/// Value stored under a mapping code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    /// The same code occurred more than once.
    List(Vec<String>),
    /// A repeating group rebuilt into rows.
    Rows(Vec<Row>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}
