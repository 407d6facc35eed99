use crate::config::EngineConfig;
use crate::core::mapping::MappingIndex;
use crate::core::parser::{FilingParser, Parser};
use crate::core::writer::{JsonDirSink, RecordSink, StoreOutcome};
use crate::utils::index::{load_index, updated_since, IndexEntry};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::{debug, error, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::ops::Add;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Counts for one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub parsed: usize,
    pub stored: usize,
    /// Already stored, or not storable (unknown return type, missing identifiers).
    pub skipped: usize,
    pub failed: usize,
}

impl Add for BatchSummary {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            parsed: self.parsed + other.parsed,
            stored: self.stored + other.stored,
            skipped: self.skipped + other.skipped,
            failed: self.failed + other.failed,
        }
    }
}

/// A filing on disk and the link recorded for it.
#[derive(Debug, Clone)]
struct Job {
    path: PathBuf,
    source_link: String,
}

pub struct DocumentProcessor<S> {
    parser: FilingParser,
    sink: S,
}

impl<S: RecordSink + Sync> DocumentProcessor<S> {
    pub fn new(parser: FilingParser, sink: S) -> Self {
        Self { parser, sink }
    }

    /// Map and store every `.xml` filing in `input_dir`.
    pub fn process_directory<P: AsRef<Path>>(&self, input_dir: P) -> Result<BatchSummary> {
        let input_path = input_dir.as_ref();
        info!("Starting to process filings from: {}", input_path.display());

        let entries = fs::read_dir(input_path)
            .with_context(|| format!("Failed to read input directory {}", input_path.display()))?;

        let mut jobs = Vec::new();
        for entry in entries {
            let path = entry.context("Failed to read directory entry")?.path();
            let is_xml = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"));
            if path.is_file() && is_xml {
                jobs.push(Job {
                    source_link: path.display().to_string(),
                    path,
                });
            } else {
                debug!("Skipping non-filing entry: {:?}", path.file_name());
            }
        }
        jobs.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(self.run(jobs))
    }

    /// Map and store the filings named by `entries`, read from `input_dir`.
    ///
    /// Each record links back to the entry's published URL when it has one.
    pub fn process_index<P: AsRef<Path>>(&self, input_dir: P, entries: &[IndexEntry]) -> Result<BatchSummary> {
        let input_path = input_dir.as_ref();
        info!(
            "Processing {} indexed filings from: {}",
            entries.len(),
            input_path.display()
        );

        let jobs = entries
            .iter()
            .map(|entry| {
                let path = input_path.join(entry.file_name());
                let source_link = if entry.url.is_empty() {
                    path.display().to_string()
                } else {
                    entry.url.clone()
                };
                Job { path, source_link }
            })
            .collect();

        Ok(self.run(jobs))
    }

    fn run(&self, jobs: Vec<Job>) -> BatchSummary {
        let summary = jobs
            .par_iter()
            .map(|job| self.process_one(job))
            .reduce(BatchSummary::default, |a, b| a + b);

        info!(
            "Completed batch: {} parsed, {} stored, {} skipped, {} failed",
            summary.parsed, summary.stored, summary.skipped, summary.failed
        );
        summary
    }

    fn process_one(&self, job: &Job) -> BatchSummary {
        let mut summary = BatchSummary::default();

        let mut filing = match self.parser.parse(&job.path, &job.source_link) {
            Ok(filing) => filing,
            Err(e) => {
                error!("Failed to map filing {}: {}", job.path.display(), e);
                summary.failed = 1;
                return summary;
            }
        };
        summary.parsed = 1;

        match self.sink.store(&mut filing) {
            Ok(StoreOutcome::Stored { record_id, overflowed }) => {
                if overflowed > 0 {
                    warn!("{} records of {} went to fallback storage", overflowed, record_id);
                }
                summary.stored = 1;
            }
            Ok(StoreOutcome::AlreadyExists { record_id }) => {
                debug!("Skipping {}: already stored", record_id);
                summary.skipped = 1;
            }
            Ok(StoreOutcome::Skipped { reason }) => {
                warn!("Not storing {}: {}", job.path.display(), reason);
                summary.skipped = 1;
            }
            Err(e) => {
                error!("Failed to store filing {}: {}", job.path.display(), e);
                summary.failed = 1;
            }
        }
        summary
    }
}

/// Inputs for one end-to-end batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub mapping: PathBuf,
    pub table_mapping: PathBuf,
    pub input: PathBuf,
    pub output: PathBuf,
    pub config: Option<PathBuf>,
    pub index: Option<PathBuf>,
    /// With `index`, keep only filings updated after this date and replace
    /// their stored records.
    pub updated_after: Option<NaiveDate>,
    pub force: bool,
}

/// Load the concordance and configuration, then map and store a whole batch.
pub fn run_document_processing(options: &BatchOptions) -> Result<BatchSummary> {
    // Logger may already be initialized by the caller
    let _ = env_logger::try_init();

    let config = match &options.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };

    let index = MappingIndex::from_csv_paths(&options.mapping, &options.table_mapping)?;
    info!(
        "Loaded concordance: {} scalar paths, {} group paths",
        index.scalar_len(),
        index.group_len()
    );

    let replace = options.force || options.updated_after.is_some();
    let sink = JsonDirSink::new(&options.output, config.max_record_bytes).with_force(replace);
    let processor = DocumentProcessor::new(FilingParser::new(Arc::new(index), config), sink);

    match &options.index {
        Some(index_path) => {
            let mut entries = load_index(index_path)?;
            if let Some(date) = options.updated_after {
                let cutoff = date
                    .and_hms_opt(0, 0, 0)
                    .context("cutoff date has no midnight")?;
                entries = updated_since(&entries, cutoff).cloned().collect();
                info!("{} filings updated after {}", entries.len(), date);
            }
            processor.process_index(&options.input, &entries)
        }
        None => processor.process_directory(&options.input),
    }
}
