pub mod days;
pub mod parser;
pub mod validator;

use crate::models::Record;
use crate::{BotError, Result};
use csv::StringRecord;
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub use days::{list_day_files, parse_day_stem, DayFile, DAY_FILE_FORMAT, DAY_SECS};
pub use parser::SourceLayout;
pub use validator::RecordValidator;

/// Outcome of loading one bulk price source
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub layout: SourceLayout,
    pub records: Vec<Record>,
    /// Rows rejected as malformed and skipped
    pub skipped: usize,
}

/// Load a two-column tick or five-column bar CSV source
///
/// Malformed rows are logged and skipped; an unrecognized header fails
/// the whole load.
pub fn load_reader<R: Read>(reader: R) -> Result<LoadReport> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let layout = SourceLayout::detect(csv.headers()?)?;
    let validator = RecordValidator::new();
    let mut records = Vec::new();
    let mut skipped = 0;

    for row in csv.byte_records() {
        let row = row?;
        let line = row.position().map(|p| p.line()).unwrap_or_default();

        let parsed = StringRecord::from_byte_record(row)
            .map_err(|e| BotError::MalformedRow {
                line,
                reason: format!("Undecodable text: {}", e),
            })
            .and_then(|row| layout.parse(&row, line))
            .and_then(|record| validator.validate(&record, line).map(|_| record));
        match parsed {
            Ok(record) => records.push(record),
            Err(e) if e.is_recoverable_row() => {
                tracing::warn!("Skipping row: {}", e);
                skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    tracing::debug!(
        "Loaded {} records ({:?}), skipped {}",
        records.len(),
        layout,
        skipped
    );

    Ok(LoadReport {
        layout,
        records,
        skipped,
    })
}

pub fn load_file(path: &Path) -> Result<LoadReport> {
    let report = load_reader(File::open(path)?)?;
    tracing::info!(
        "Loaded {} records from {} ({} skipped)",
        report.records.len(),
        path.display(),
        report.skipped
    );
    Ok(report)
}
