use crate::core::context::ParseContext;
use crate::core::mapping::MappingIndex;
use crate::{FieldValue, Row};
use indexmap::map::Entry;
use indexmap::IndexMap;
use log::{debug, warn};
use serde::Serialize;

/// Mapping code to value, in first-encounter order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldMap {
    entries: IndexMap<String, FieldValue>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value; a repeated code keeps every occurrence as an ordered list.
    ///
    /// Returns false when the code already holds group rows and the value was not stored.
    pub fn push_text(&mut self, code: &str, value: &str) -> bool {
        match self.entries.get_mut(code) {
            None => {
                self.entries
                    .insert(code.to_string(), FieldValue::Text(value.to_string()));
            }
            Some(existing) => match existing {
                FieldValue::Text(first) => {
                    let first = std::mem::take(first);
                    *existing = FieldValue::List(vec![first, value.to_string()]);
                }
                FieldValue::List(values) => values.push(value.to_string()),
                FieldValue::Rows(_) => return false,
            },
        }
        true
    }

    /// Store a group's rows unless the code is already taken.
    pub fn insert_rows(&mut self, code: &str, rows: Vec<Row>) -> bool {
        match self.entries.entry(code.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(FieldValue::Rows(rows));
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn get(&self, code: &str) -> Option<&FieldValue> {
        self.entries.get(code)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(code, value)| (code.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Route one scalar `(path, value)` pair into the context's field map.
///
/// Returns false when the path has no mapping code.
pub fn assemble(index: &MappingIndex, ctx: &mut ParseContext, path: &str, value: &str) -> bool {
    match index.lookup_scalar(path) {
        Some(code) => {
            if ctx.fields.push_text(code, value) {
                ctx.stats.mapped += 1;
            } else {
                warn!("Scalar value at {} collides with group code {}", path, code);
                ctx.stats.discarded_scalars += 1;
            }
            true
        }
        None => {
            debug!("Unmapped path {}", path);
            ctx.stats.unmapped += 1;
            false
        }
    }
}
