use crate::api::ReportStore;
use crate::models::FillRecord;
use crate::Result;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// Fill report kept as a CSV file with columns `Date,Price,Amount,Order`
///
/// Rows are appended one per fill; the header is written when the file is
/// created or empty.
#[derive(Debug, Clone)]
pub struct CsvReportStore {
    path: PathBuf,
}

impl CsvReportStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every readable fill, oldest first; malformed rows are skipped
    pub fn read_all(&self) -> Result<Vec<FillRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut fills = Vec::new();
        for (index, row) in reader.deserialize::<FillRecord>().enumerate() {
            match row {
                Ok(fill) => fills.push(fill),
                Err(e) => tracing::warn!(
                    "Skipping report row {} of {}: {}",
                    index + 2,
                    self.path.display(),
                    e
                ),
            }
        }
        Ok(fills)
    }
}

impl ReportStore for CsvReportStore {
    fn append(&mut self, fill: &FillRecord) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let needs_header = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(fill)?;
        writer.flush()?;

        tracing::debug!("Recorded {} fill in {}", fill.side, self.path.display());
        Ok(())
    }

    fn last_fill(&self) -> Result<Option<FillRecord>> {
        Ok(self.read_all()?.pop())
    }
}
