use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use filing_mapper::utils::document_processor::{run_document_processing, BatchOptions};
use std::path::PathBuf;

/// Map tax-filing XML documents onto flat JSON records.
#[derive(Parser, Debug)]
#[command(name = "filing-mapper", version)]
struct Cli {
    /// Scalar concordance CSV (code in column 0, path in column 3).
    #[arg(long)]
    mapping: PathBuf,

    /// Repeating-group concordance CSV (code in column 0, path in column 1).
    #[arg(long)]
    table_mapping: PathBuf,

    /// Directory holding the filing XML documents.
    #[arg(long)]
    input: PathBuf,

    /// Directory the records are written to.
    #[arg(long)]
    output: PathBuf,

    /// Engine configuration as JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Filing index; only the filings it lists are processed.
    #[arg(long)]
    index: Option<PathBuf>,

    /// With --index, reprocess only filings updated after this date (YYYY-MM-DD),
    /// replacing their stored records.
    #[arg(long, requires = "index")]
    updated_after: Option<NaiveDate>,

    /// Replace records that are already stored.
    #[arg(long)]
    force: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let options = BatchOptions {
        mapping: cli.mapping,
        table_mapping: cli.table_mapping,
        input: cli.input,
        output: cli.output,
        config: cli.config,
        index: cli.index,
        updated_after: cli.updated_after,
        force: cli.force,
    };
    let summary = run_document_processing(&options)?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
