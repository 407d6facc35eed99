use crate::error::{FilingError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// One filing listed in a yearly index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexEntry {
    #[serde(rename = "EIN")]
    pub ein: String,
    #[serde(rename = "ObjectId")]
    pub object_id: String,
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "LastUpdated")]
    pub last_updated: String,
    #[serde(rename = "TaxPeriod")]
    pub tax_period: String,
    #[serde(rename = "FormType")]
    pub form_type: String,
    #[serde(rename = "OrganizationName")]
    pub organization_name: String,
    #[serde(rename = "SubmittedOn")]
    pub submitted_on: String,
    #[serde(rename = "DLN")]
    pub dln: String,
}

impl IndexEntry {
    /// File name the filing is published under.
    pub fn file_name(&self) -> String {
        format!("{}_public.xml", self.object_id)
    }

    /// Midnight of the `LastUpdated` date; the time part is ignored.
    pub fn last_updated_at(&self) -> Option<NaiveDateTime> {
        let date = self.last_updated.get(..10)?;
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .ok()?
            .and_hms_opt(0, 0, 0)
    }
}

/// Parse an index document. The filing list sits under its first top-level key.
pub fn parse_index(json: &str) -> std::result::Result<Vec<IndexEntry>, String> {
    let value: Value = serde_json::from_str(json).map_err(|e| e.to_string())?;
    let Value::Object(map) = value else {
        return Err("index is not a JSON object".to_string());
    };
    let Some((_, list)) = map.into_iter().next() else {
        return Err("index has no filing list".to_string());
    };
    serde_json::from_value(list).map_err(|e| e.to_string())
}

pub fn load_index<P: AsRef<Path>>(path: P) -> Result<Vec<IndexEntry>> {
    let path = path.as_ref();
    let json = fs::read_to_string(path).map_err(|e| FilingError::io(path, e))?;
    parse_index(&json).map_err(|message| FilingError::Index {
        path: path.to_path_buf(),
        message,
    })
}

/// True when the entry changed strictly after `cutoff`.
pub fn is_newer_than(entry: &IndexEntry, cutoff: NaiveDateTime) -> bool {
    entry
        .last_updated_at()
        .is_some_and(|updated| updated > cutoff)
}

pub fn updated_since(
    entries: &[IndexEntry],
    cutoff: NaiveDateTime,
) -> impl Iterator<Item = &IndexEntry> + '_ {
    entries.iter().filter(move |entry| is_newer_than(entry, cutoff))
}
