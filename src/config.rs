use crate::error::{FilingError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Files above this size are memory-mapped instead of read into a buffer.
pub const DEFAULT_MMAP_THRESHOLD: u64 = 10 * 1024 * 1024;

/// Largest serialized record the JSON store accepts before falling back.
pub const DEFAULT_MAX_RECORD_BYTES: usize = 16_777_216;

/// How replicated metadata reaches schedule records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataPolicy {
    /// Each merge copies only the metadata known at that point of the traversal.
    #[default]
    Forward,
    /// After partitioning, every schedule receives the final metadata snapshot.
    Backfill,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Slash counts of container paths that may hold a repeating group.
    pub group_depths: Vec<usize>,
    pub metadata_policy: MetadataPolicy,
    pub mmap_threshold_bytes: u64,
    pub max_record_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            group_depths: vec![3, 4],
            metadata_policy: MetadataPolicy::Forward,
            mmap_threshold_bytes: DEFAULT_MMAP_THRESHOLD,
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| FilingError::Config(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| FilingError::io(path, e))?;
        Self::from_json_str(&raw)
    }

    fn validate(&self) -> Result<()> {
        if self.group_depths.is_empty() {
            return Err(FilingError::Config(
                "group_depths must name at least one depth".to_string(),
            ));
        }
        if self.max_record_bytes == 0 {
            return Err(FilingError::Config(
                "max_record_bytes must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_group_depth(&self, slash_count: usize) -> bool {
        self.group_depths.contains(&slash_count)
    }
}
