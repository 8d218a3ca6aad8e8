use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, BotError>;

/// Errors raised by the bar engine and its collaborators
#[derive(Error, Debug)]
pub enum BotError {
    /// Invalid settings, raised before any tick is processed
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// An indicator was explicitly requested before enough bars existed
    #[error("Insufficient history: need {needed} bars, have {available}")]
    InsufficientHistory { needed: usize, available: usize },

    /// A bulk-ingest row was missing fields or held non-numeric values
    #[error("Malformed row at line {line}: {reason}")]
    MalformedRow { line: u64, reason: String },

    /// The exchange could not report balances
    #[error("Balance unavailable: {0}")]
    BalanceUnavailable(String),

    /// The exchange rejected or failed an order
    #[error("Exchange error: {0}")]
    Exchange(String),

    /// A live tick carried a non-finite timestamp or price
    #[error("Invalid tick: timestamp={timestamp}, price={price}")]
    InvalidTick { timestamp: f64, price: f64 },

    /// A bulk source had a header matching neither tick nor bar layout
    #[error("Unrecognized header: {0}")]
    UnrecognizedHeader(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
}

impl BotError {
    /// Whether the error only affects one ingest row and the load can continue
    pub fn is_recoverable_row(&self) -> bool {
        matches!(self, BotError::MalformedRow { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = BotError::MalformedRow {
            line: 7,
            reason: "missing price".to_string(),
        };
        assert_eq!(err.to_string(), "Malformed row at line 7: missing price");
        assert!(err.is_recoverable_row());

        let err = BotError::Configuration("low span must be lower".to_string());
        assert!(err.to_string().contains("Invalid configuration"));
        assert!(!err.is_recoverable_row());
    }
}
