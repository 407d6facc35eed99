use crate::error::{FilingError, Result};
use log::{debug, warn};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const SCALAR_CODE_COLUMN: usize = 0;
const SCALAR_PATH_COLUMN: usize = 3;
const GROUP_CODE_COLUMN: usize = 0;
const GROUP_PATH_COLUMN: usize = 1;

/// Read-only concordance lookups shared by every document of a batch.
///
/// Paths are stored exactly as given; they must already be in the flattener's
/// format (namespace-stripped, slash-joined, rooted at the document root tag).
#[derive(Debug, Clone, Default)]
pub struct MappingIndex {
    scalar: HashMap<String, String>,
    groups: HashMap<String, String>,
}

impl MappingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later entries for the same path overwrite earlier ones.
    pub fn insert_scalar(&mut self, path: impl Into<String>, code: impl Into<String>) {
        self.scalar.insert(path.into(), code.into());
    }

    pub fn insert_group(&mut self, path_prefix: impl Into<String>, code: impl Into<String>) {
        self.groups.insert(path_prefix.into(), code.into());
    }

    pub fn lookup_scalar(&self, path: &str) -> Option<&str> {
        self.scalar.get(path).map(String::as_str)
    }

    pub fn lookup_group(&self, path_prefix: &str) -> Option<&str> {
        self.groups.get(path_prefix).map(String::as_str)
    }

    pub fn scalar_len(&self) -> usize {
        self.scalar.len()
    }

    pub fn group_len(&self) -> usize {
        self.groups.len()
    }

    /// Build from positional rows: scalar rows carry the code at 0 and the path
    /// at 3, group rows carry the code at 0 and the path at 1.
    pub fn from_rows<S, G, R, T>(scalar_rows: S, group_rows: G) -> Self
    where
        S: IntoIterator<Item = R>,
        G: IntoIterator<Item = R>,
        R: AsRef<[T]>,
        T: AsRef<str>,
    {
        let mut index = Self::new();
        for row in scalar_rows {
            let row = row.as_ref();
            match (row.get(SCALAR_CODE_COLUMN), row.get(SCALAR_PATH_COLUMN)) {
                (Some(code), Some(path)) => index.insert_scalar(as_str(path), as_str(code)),
                _ => warn!("Skipping scalar mapping row with {} columns", row.len()),
            }
        }
        for row in group_rows {
            let row = row.as_ref();
            match (row.get(GROUP_CODE_COLUMN), row.get(GROUP_PATH_COLUMN)) {
                (Some(code), Some(path)) => index.insert_group(as_str(path), as_str(code)),
                _ => warn!("Skipping group mapping row with {} columns", row.len()),
            }
        }
        debug!(
            "Built mapping index: {} scalar paths, {} group paths",
            index.scalar_len(),
            index.group_len()
        );
        index
    }

    /// Read two headerless concordance CSV streams.
    pub fn from_csv_readers<A: Read, B: Read>(scalar: A, groups: B) -> Result<Self> {
        let scalar_rows = read_csv_rows(scalar, Path::new("<scalar mapping>"))?;
        let group_rows = read_csv_rows(groups, Path::new("<group mapping>"))?;
        Ok(Self::from_rows(scalar_rows, group_rows))
    }

    pub fn from_csv_paths<P: AsRef<Path>, Q: AsRef<Path>>(scalar: P, groups: Q) -> Result<Self> {
        let scalar_path = scalar.as_ref();
        let group_path = groups.as_ref();
        let scalar_file = File::open(scalar_path).map_err(|e| FilingError::io(scalar_path, e))?;
        let group_file = File::open(group_path).map_err(|e| FilingError::io(group_path, e))?;
        let scalar_rows = read_csv_rows(scalar_file, scalar_path)?;
        let group_rows = read_csv_rows(group_file, group_path)?;
        Ok(Self::from_rows(scalar_rows, group_rows))
    }
}

fn as_str<T: AsRef<str>>(cell: &T) -> &str {
    cell.as_ref()
}

fn read_csv_rows<R: Read>(reader: R, origin: &Path) -> Result<Vec<Vec<String>>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record.map_err(|source| FilingError::MappingTable {
            path: origin.to_path_buf(),
            source,
        })?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}
