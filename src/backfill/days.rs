use crate::Result;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// Seconds in one day file
pub const DAY_SECS: i64 = 86_400;

/// File stem format of daily price history files
pub const DAY_FILE_FORMAT: &str = "%d-%m-%Y";

/// One daily price history file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayFile {
    /// Midnight UTC of the day, epoch seconds
    pub day_start: i64,
    pub path: PathBuf,
}

/// Midnight UTC of a `dd-mm-YYYY` stem
pub fn parse_day_stem(stem: &str) -> Option<i64> {
    NaiveDate::parse_from_str(stem, DAY_FILE_FORMAT)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc().timestamp())
}

/// List the `dd-mm-YYYY.csv` files of a directory, oldest first
///
/// Other entries are ignored.
pub fn list_day_files(dir: &Path) -> Result<Vec<DayFile>> {
    let mut days = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("csv") {
            continue;
        }
        let Some(day_start) = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(parse_day_stem)
        else {
            tracing::debug!("Ignoring {}", path.display());
            continue;
        };
        days.push(DayFile { day_start, path });
    }

    days.sort_by_key(|day| day.day_start);
    Ok(days)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_day_stem() {
        assert_eq!(parse_day_stem("01-01-1970"), Some(0));
        assert_eq!(parse_day_stem("02-01-1970"), Some(DAY_SECS));
        assert_eq!(parse_day_stem("13-09-2020"), Some(1_599_955_200));
        assert!(parse_day_stem("2020-09-13").is_none());
        assert!(parse_day_stem("32-01-2020").is_none());
    }

    #[test]
    fn test_list_day_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["03-01-2021.csv", "01-01-2021.csv", "notes.txt", "bad.csv"] {
            std::fs::write(dir.path().join(name), "Date,Price\n").unwrap();
        }

        let days = list_day_files(dir.path()).unwrap();
        let stems: Vec<_> = days
            .iter()
            .map(|d| d.path.file_stem().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(stems, vec!["01-01-2021", "03-01-2021"]);
        assert_eq!(days[1].day_start - days[0].day_start, 2 * DAY_SECS);
    }
}
