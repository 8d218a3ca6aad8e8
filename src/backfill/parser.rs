use crate::models::{OhlcRow, Record, Tick};
use crate::{BotError, Result};
use csv::StringRecord;

/// Column layout of a bulk price source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLayout {
    /// `epoch, price`
    Ticks,
    /// `epoch, open, high, low, close`, columns located by name
    Bars {
        open: usize,
        high: usize,
        low: usize,
        close: usize,
    },
}

impl SourceLayout {
    /// Detect the layout from a header row, names compared case-insensitively
    pub fn detect(header: &StringRecord) -> Result<Self> {
        let names: Vec<String> = header
            .iter()
            .map(|name| name.trim().to_ascii_lowercase())
            .collect();
        let position = |wanted: &str| names.iter().position(|name| name == wanted);

        if let (Some(open), Some(high), Some(low), Some(close)) = (
            position("open"),
            position("high"),
            position("low"),
            position("close"),
        ) {
            if [open, high, low, close].contains(&0) {
                return Err(BotError::UnrecognizedHeader(describe(header)));
            }
            return Ok(SourceLayout::Bars {
                open,
                high,
                low,
                close,
            });
        }

        // Tick files carry arbitrary names, but never a numeric header
        if names.len() == 2 && names.iter().all(|name| name.parse::<f64>().is_err()) {
            return Ok(SourceLayout::Ticks);
        }

        Err(BotError::UnrecognizedHeader(describe(header)))
    }

    /// Number of columns a row must have
    pub fn min_columns(&self) -> usize {
        match self {
            SourceLayout::Ticks => 2,
            SourceLayout::Bars {
                open,
                high,
                low,
                close,
            } => 1 + *[*open, *high, *low, *close].iter().max().unwrap_or(&0),
        }
    }

    /// Parse one data row into a normalized record
    pub fn parse(&self, row: &StringRecord, line: u64) -> Result<Record> {
        if row.len() < self.min_columns() {
            return Err(BotError::MalformedRow {
                line,
                reason: format!(
                    "expected {} columns, found {}",
                    self.min_columns(),
                    row.len()
                ),
            });
        }

        let timestamp = number(row, 0, line)?;
        match *self {
            SourceLayout::Ticks => Ok(Record::Tick(Tick::new(timestamp, number(row, 1, line)?))),
            SourceLayout::Bars {
                open,
                high,
                low,
                close,
            } => Ok(Record::Bar(OhlcRow {
                timestamp,
                open: number(row, open, line)?,
                high: number(row, high, line)?,
                low: number(row, low, line)?,
                close: number(row, close, line)?,
            })),
        }
    }
}

fn number(row: &StringRecord, index: usize, line: u64) -> Result<f64> {
    let raw = row.get(index).map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Err(BotError::MalformedRow {
            line,
            reason: format!("column {} is empty", index + 1),
        });
    }
    raw.parse::<f64>().map_err(|_| BotError::MalformedRow {
        line,
        reason: format!("column {} is not numeric: {:?}", index + 1, raw),
    })
}

fn describe(header: &StringRecord) -> String {
    header.iter().collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[&str]) -> StringRecord {
        StringRecord::from(fields.to_vec())
    }

    #[test]
    fn test_detect_tick_layout() {
        let layout = SourceLayout::detect(&record(&["Date", "Price"])).unwrap();
        assert_eq!(layout, SourceLayout::Ticks);
    }

    #[test]
    fn test_detect_bar_layout_case_insensitive() {
        let layout =
            SourceLayout::detect(&record(&["date", "OPEN", "High", "low", "Close"])).unwrap();
        assert_eq!(
            layout,
            SourceLayout::Bars {
                open: 1,
                high: 2,
                low: 3,
                close: 4
            }
        );
        assert_eq!(layout.min_columns(), 5);
    }

    #[test]
    fn test_detect_rejects_unknown_header() {
        assert!(matches!(
            SourceLayout::detect(&record(&["a", "b", "c"])),
            Err(BotError::UnrecognizedHeader(_))
        ));
        assert!(SourceLayout::detect(&record(&["1600000000", "10.5"])).is_err());
    }

    #[test]
    fn test_parse_tick_row() {
        let parsed = SourceLayout::Ticks
            .parse(&record(&["1600000000.5", " 10.25"]), 2)
            .unwrap();
        assert_eq!(parsed, Record::Tick(Tick::new(1_600_000_000.5, 10.25)));
    }

    #[test]
    fn test_parse_rejects_short_and_non_numeric_rows() {
        let err = SourceLayout::Ticks.parse(&record(&["1600000000"]), 7).unwrap_err();
        assert!(matches!(err, BotError::MalformedRow { line: 7, .. }));

        let err = SourceLayout::Ticks
            .parse(&record(&["1600000000", "abc"]), 8)
            .unwrap_err();
        assert!(err.to_string().contains("not numeric"));

        let err = SourceLayout::Ticks.parse(&record(&["", "1.0"]), 9).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }
}
