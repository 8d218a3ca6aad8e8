use crate::models::{OhlcRow, Record};
use crate::{BotError, Result};

/// Sanity checks applied to parsed bulk records before they reach a series
pub struct RecordValidator;

impl RecordValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a record, reporting failures against its source line
    pub fn validate(&self, record: &Record, line: u64) -> Result<()> {
        let reason = match record {
            Record::Tick(tick) => Self::check_timestamp(tick.timestamp)
                .or_else(|| Self::check_price("price", tick.price)),
            Record::Bar(row) => Self::check_timestamp(row.timestamp)
                .or_else(|| Self::check_prices(row))
                .or_else(|| Self::check_ohlc_relationship(row)),
        };

        match reason {
            Some(reason) => Err(BotError::MalformedRow { line, reason }),
            None => Ok(()),
        }
    }

    fn check_timestamp(timestamp: f64) -> Option<String> {
        if !timestamp.is_finite() || timestamp < 0.0 {
            return Some(format!("Invalid timestamp: {}", timestamp));
        }
        None
    }

    fn check_price(name: &str, price: f64) -> Option<String> {
        if !price.is_finite() || price <= 0.0 {
            return Some(format!("Invalid {} price: {}", name, price));
        }
        None
    }

    fn check_prices(row: &OhlcRow) -> Option<String> {
        Self::check_price("open", row.open)
            .or_else(|| Self::check_price("high", row.high))
            .or_else(|| Self::check_price("low", row.low))
            .or_else(|| Self::check_price("close", row.close))
    }

    /// High bounds open and close from above, low from below
    fn check_ohlc_relationship(row: &OhlcRow) -> Option<String> {
        if row.high < row.low {
            return Some(format!("High ({}) is less than low ({})", row.high, row.low));
        }
        if row.high < row.open.max(row.close) {
            return Some(format!(
                "High ({}) is less than open/close ({}, {})",
                row.high, row.open, row.close
            ));
        }
        if row.low > row.open.min(row.close) {
            return Some(format!(
                "Low ({}) is greater than open/close ({}, {})",
                row.low, row.open, row.close
            ));
        }
        None
    }
}

impl Default for RecordValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Tick;

    fn make_valid_row() -> OhlcRow {
        OhlcRow {
            timestamp: 1_600_000_000.0,
            open: 100.0,
            high: 102.0,
            low: 99.0,
            close: 101.0,
        }
    }

    #[test]
    fn test_validate_valid_records() {
        let validator = RecordValidator::new();
        assert!(validator.validate(&Record::Bar(make_valid_row()), 2).is_ok());
        assert!(validator
            .validate(&Record::Tick(Tick::new(1_600_000_000.0, 3.5)), 2)
            .is_ok());
    }

    #[test]
    fn test_validate_negative_price() {
        let validator = RecordValidator::new();
        let mut row = make_valid_row();
        row.low = -99.0;

        let result = validator.validate(&Record::Bar(row), 4);
        let err = result.unwrap_err();
        assert!(matches!(err, BotError::MalformedRow { line: 4, .. }));
        assert!(err.to_string().contains("Invalid low price"));
    }

    #[test]
    fn test_validate_high_less_than_low() {
        let validator = RecordValidator::new();
        let mut row = make_valid_row();
        row.high = 98.0;

        let err_msg = validator
            .validate(&Record::Bar(row), 3)
            .unwrap_err()
            .to_string();
        assert!(err_msg.contains("High") && err_msg.contains("less than low"));
    }

    #[test]
    fn test_validate_close_outside_range() {
        let validator = RecordValidator::new();
        let mut row = make_valid_row();
        row.close = 105.0;
        assert!(validator.validate(&Record::Bar(row), 3).is_err());

        let mut row = make_valid_row();
        row.open = 95.0;
        let err_msg = validator
            .validate(&Record::Bar(row), 3)
            .unwrap_err()
            .to_string();
        assert!(err_msg.contains("Low") && err_msg.contains("greater than"));
    }

    #[test]
    fn test_validate_all_prices_equal() {
        let validator = RecordValidator::new();
        let row = OhlcRow {
            timestamp: 0.0,
            open: 100.0,
            high: 100.0,
            low: 100.0,
            close: 100.0,
        };
        assert!(validator.validate(&Record::Bar(row), 2).is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_tick_price() {
        let validator = RecordValidator::new();
        let tick = Record::Tick(Tick::new(1.0, 0.0));
        assert!(validator.validate(&tick, 2).is_err());
    }
}
