use crate::core::filing::ParsedFiling;
use crate::error::{FilingError, Result};
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const SCHEDULES_COLLECTION: &str = "schedules";
const FALLBACK_SUFFIX: &str = "b";

/// What happened to a filing handed to a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    Stored { record_id: String, overflowed: usize },
    AlreadyExists { record_id: String },
    /// The filing lacks a return type or identifiers to store it under.
    Skipped { reason: String },
}

/// Writer persists mapped filings; the engine never depends on a concrete store.
pub trait RecordSink {
    /// Store schedules first, then the primary record with their ids attached.
    fn store(&self, filing: &mut ParsedFiling) -> Result<StoreOutcome>;
}

/// Stores each record as a JSON file under `{root}/{collection}/`.
///
/// Records larger than `max_record_bytes` go to the `{collection}b` fallback.
pub struct JsonDirSink {
    root: PathBuf,
    max_record_bytes: usize,
    force: bool,
}

impl JsonDirSink {
    pub fn new(root: impl Into<PathBuf>, max_record_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_record_bytes,
            force: false,
        }
    }

    /// Replace records that already exist instead of skipping them.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    fn record_path(&self, collection: &str, record_id: &str) -> PathBuf {
        self.root.join(collection).join(format!("{}.json", record_id))
    }

    /// Write one record, falling back to the overflow collection when too large.
    /// Returns true when the fallback was used.
    fn write_record<T: Serialize>(&self, collection: &str, record_id: &str, record: &T) -> Result<bool> {
        match encode_checked(record_id, record, self.max_record_bytes) {
            Ok(bytes) => {
                write_file(&self.record_path(collection, record_id), &bytes)?;
                Ok(false)
            }
            Err(err) if err.is_overflow() => {
                warn!("{}; writing to fallback collection", err);
                let bytes = serde_json::to_vec(record)?;
                let fallback = format!("{}{}", collection, FALLBACK_SUFFIX);
                write_file(&self.record_path(&fallback, record_id), &bytes)?;
                Ok(true)
            }
            Err(err) => Err(err),
        }
    }

    fn primary_paths(&self, collection: &str, record_id: &str) -> [PathBuf; 2] {
        let fallback = format!("{}{}", collection, FALLBACK_SUFFIX);
        [
            self.record_path(collection, record_id),
            self.record_path(&fallback, record_id),
        ]
    }

    fn exists(&self, collection: &str, record_id: &str) -> bool {
        self.primary_paths(collection, record_id)
            .iter()
            .any(|path| path.exists())
    }

    /// Delete a stored filing: every schedule its primary lists, then both primary copies.
    fn remove_existing(&self, collection: &str, record_id: &str) -> Result<()> {
        let primaries = self.primary_paths(collection, record_id);
        let schedules_fallback = format!("{}{}", SCHEDULES_COLLECTION, FALLBACK_SUFFIX);

        for primary in &primaries {
            for schedule_id in stored_schedule_ids(primary)? {
                remove_file(&self.record_path(SCHEDULES_COLLECTION, &schedule_id))?;
                remove_file(&self.record_path(&schedules_fallback, &schedule_id))?;
            }
        }
        for primary in &primaries {
            remove_file(primary)?;
        }
        debug!("Removed stored filing {} from {}", record_id, collection);
        Ok(())
    }
}

impl RecordSink for JsonDirSink {
    fn store(&self, filing: &mut ParsedFiling) -> Result<StoreOutcome> {
        let Some(form) = filing.return_form else {
            return Ok(StoreOutcome::Skipped {
                reason: format!("{} has no recognized return type", filing.source_link()),
            });
        };
        let Some(record_id) = filing.record_id() else {
            return Ok(StoreOutcome::Skipped {
                reason: format!("{} lacks FILEREIN or TAXYEAR", filing.source_link()),
            });
        };
        let collection = form.collection();

        if self.exists(collection, &record_id) {
            if !self.force {
                info!("Filing {} already stored in {}", record_id, collection);
                return Ok(StoreOutcome::AlreadyExists { record_id });
            }
            self.remove_existing(collection, &record_id)?;
        }

        let mut overflowed = 0;
        let mut schedule_ids = Vec::with_capacity(filing.schedules.len());
        for schedule in &filing.schedules {
            let schedule_id = format!("{}_{}", record_id, schedule.kind);
            if self.write_record(SCHEDULES_COLLECTION, &schedule_id, schedule)? {
                overflowed += 1;
            }
            schedule_ids.push(schedule_id);
        }
        if !schedule_ids.is_empty() {
            filing.primary.schedules = Some(schedule_ids);
        }

        if self.write_record(collection, &record_id, &filing.primary)? {
            overflowed += 1;
        }
        info!("Stored filing {} in {}", record_id, collection);
        Ok(StoreOutcome::Stored {
            record_id,
            overflowed,
        })
    }
}

/// Serialize a record, refusing it when it exceeds `limit` bytes.
pub fn encode_checked<T: Serialize>(record_id: &str, record: &T, limit: usize) -> Result<Vec<u8>> {
    let bytes = serde_json::to_vec(record)?;
    if bytes.len() > limit {
        return Err(FilingError::StorageOverflow {
            record_id: record_id.to_string(),
            size: bytes.len(),
            limit,
        });
    }
    Ok(bytes)
}

/// Schedule ids listed on a stored primary record; empty when it is absent.
fn stored_schedule_ids(path: &Path) -> Result<Vec<String>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(FilingError::io(path, e)),
    };
    let record: Value = match serde_json::from_slice(&bytes) {
        Ok(record) => record,
        Err(e) => {
            warn!("Stored record {} is unreadable: {}", path.display(), e);
            return Ok(Vec::new());
        }
    };
    Ok(record
        .get("schedules")
        .and_then(Value::as_array)
        .map(|ids| ids.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default())
}

fn remove_file(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(FilingError::io(path, e)),
        _ => Ok(()),
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| FilingError::io(parent, e))?;
    }
    fs::write(path, bytes).map_err(|e| FilingError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::core::mapping::MappingIndex;
    use crate::core::parser::FilingParser;
    use std::sync::Arc;

    const FILING: &str = "<Return><ReturnHeader><ReturnTypeCd>990</ReturnTypeCd><TaxYr>2018</TaxYr>\
        <Filer><EIN>123456789</EIN></Filer></ReturnHeader>\
        <ReturnData><IRS990ScheduleA><Line3>13</Line3></IRS990ScheduleA></ReturnData></Return>";

    fn filing() -> ParsedFiling {
        let mut index = MappingIndex::new();
        index.insert_scalar("Return/ReturnHeader/ReturnTypeCd", "F9-PC-01-RETURNTYPE");
        index.insert_scalar("Return/ReturnHeader/TaxYr", "F9-PC-01-TAXYEAR");
        index.insert_scalar("Return/ReturnHeader/Filer/EIN", "F9-PC-01-FILEREIN");
        index.insert_scalar("Return/ReturnData/IRS990ScheduleA/Line3", "SA-PC-02-IIUBTICTYMYE3");
        FilingParser::new(Arc::new(index), EngineConfig::default())
            .parse_str(FILING, "local:filing.xml")
            .unwrap()
    }

    #[test]
    fn stores_schedules_then_primary() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonDirSink::new(dir.path(), 1 << 20);
        let mut filing = filing();

        let outcome = sink.store(&mut filing).unwrap();
        assert_eq!(
            outcome,
            StoreOutcome::Stored {
                record_id: "123456789_2018".into(),
                overflowed: 0
            }
        );
        assert!(dir.path().join("schedules/123456789_2018_SA.json").exists());

        let stored: serde_json::Value = serde_json::from_slice(
            &fs::read(dir.path().join("990/123456789_2018.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(stored["sourceLink"], "local:filing.xml");
        assert_eq!(stored["schedules"][0], "123456789_2018_SA");
    }

    #[test]
    fn existing_records_are_skipped_unless_forced() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonDirSink::new(dir.path(), 1 << 20);
        sink.store(&mut filing()).unwrap();

        let again = sink.store(&mut filing()).unwrap();
        assert!(matches!(again, StoreOutcome::AlreadyExists { .. }));

        let forced = JsonDirSink::new(dir.path(), 1 << 20).with_force(true);
        assert!(matches!(forced.store(&mut filing()).unwrap(), StoreOutcome::Stored { .. }));
    }

    #[test]
    fn forced_reinsert_removes_the_previous_record_set() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonDirSink::new(dir.path(), 1 << 20);
        sink.store(&mut filing()).unwrap();
        assert!(dir.path().join("schedules/123456789_2018_SA.json").exists());

        // Oversized first copy leaves the primary in the fallback collection.
        JsonDirSink::new(dir.path(), 16)
            .with_force(true)
            .store(&mut filing())
            .unwrap();
        assert!(dir.path().join("990b/123456789_2018.json").exists());
        assert!(dir.path().join("schedulesb/123456789_2018_SA.json").exists());

        let mut without_schedules = filing();
        without_schedules.schedules.clear();
        let forced = JsonDirSink::new(dir.path(), 1 << 20).with_force(true);
        assert!(matches!(
            forced.store(&mut without_schedules).unwrap(),
            StoreOutcome::Stored { overflowed: 0, .. }
        ));

        assert!(dir.path().join("990/123456789_2018.json").exists());
        assert!(!dir.path().join("990b/123456789_2018.json").exists());
        assert!(!dir.path().join("schedules/123456789_2018_SA.json").exists());
        assert!(!dir.path().join("schedulesb/123456789_2018_SA.json").exists());
    }

    #[test]
    fn oversized_records_use_the_fallback_collection() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonDirSink::new(dir.path(), 16);
        let outcome = sink.store(&mut filing()).unwrap();

        assert!(matches!(outcome, StoreOutcome::Stored { overflowed: 2, .. }));
        assert!(dir.path().join("990b/123456789_2018.json").exists());
        assert!(dir.path().join("schedulesb/123456789_2018_SA.json").exists());
    }

    #[test]
    fn filings_without_return_type_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonDirSink::new(dir.path(), 1 << 20);
        let mut filing = filing();
        filing.return_form = None;
        assert!(matches!(sink.store(&mut filing).unwrap(), StoreOutcome::Skipped { .. }));
    }

    #[test]
    fn encode_checked_reports_size() {
        let err = encode_checked("id", &vec!["x"; 10], 8).unwrap_err();
        assert!(matches!(err, FilingError::StorageOverflow { limit: 8, .. }));
    }
}
