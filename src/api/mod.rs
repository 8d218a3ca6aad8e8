// Boundaries to the exchange, its market data and the fill report store
pub mod paper;

use crate::models::{FillRecord, OhlcRow, Tick, TradeSide};
use crate::Result;
use serde::{Deserialize, Serialize};

pub use paper::{HistoricalFeed, PaperExchange};

/// Balances of one trading pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Balances {
    pub crypto: f64,
    pub fiat: f64,
}

/// Order type sent to the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    Market,
}

/// Exchange acknowledgement of a filled order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderConfirmation {
    pub side: TradeSide,
    pub amount: f64,
    /// Execution price when the exchange reports one
    pub price: Option<f64>,
    pub reference: Option<String>,
}

/// Source of historical bars and the latest trade
pub trait MarketData: Send {
    /// OHLC bars of `interval_minutes` starting at or after `since`, oldest first
    fn ohlc(&mut self, asset: &str, interval_minutes: u32, since: i64) -> Result<Vec<OhlcRow>>;

    fn latest_tick(&mut self, asset: &str) -> Result<Tick>;
}

/// Order placement and balance queries
///
/// Timeouts and retries belong to the implementation.
pub trait Exchange: Send {
    fn place_order(
        &mut self,
        side: TradeSide,
        kind: OrderKind,
        amount: f64,
        asset: &str,
    ) -> Result<OrderConfirmation>;

    /// Fails with `BalanceUnavailable` when balances cannot be read
    fn balances(&mut self, asset: &str, fiat: &str) -> Result<Balances>;
}

/// Append-only log of fills
pub trait ReportStore: Send {
    fn append(&mut self, fill: &FillRecord) -> Result<()>;

    /// Most recent fill, if any was recorded
    fn last_fill(&self) -> Result<Option<FillRecord>>;
}

impl ReportStore for Vec<FillRecord> {
    fn append(&mut self, fill: &FillRecord) -> Result<()> {
        self.push(*fill);
        Ok(())
    }

    fn last_fill(&self) -> Result<Option<FillRecord>> {
        Ok(self.last().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_report_store() {
        let mut store: Vec<FillRecord> = Vec::new();
        assert!(store.last_fill().unwrap().is_none());

        let fill = FillRecord {
            timestamp: 60.0,
            price: 10.0,
            amount: 2.0,
            side: TradeSide::Sell,
        };
        ReportStore::append(&mut store, &fill).unwrap();
        assert_eq!(store.last_fill().unwrap(), Some(fill));
    }

    #[test]
    fn test_confirmation_serialization() {
        let confirmation = OrderConfirmation {
            side: TradeSide::Buy,
            amount: 1.5,
            price: Some(10.0),
            reference: None,
        };
        let json = serde_json::to_string(&confirmation).unwrap();
        assert!(json.contains("\"side\":\"buy\""));

        let back: OrderConfirmation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, confirmation);
    }
}
