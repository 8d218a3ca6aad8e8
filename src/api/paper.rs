use super::{Balances, Exchange, MarketData, OrderConfirmation, OrderKind};
use crate::models::{OhlcRow, Tick, TradeSide};
use crate::{BotError, Result};
use std::collections::HashMap;

/// In-memory exchange filling market orders at a settable price
#[derive(Debug, Clone)]
pub struct PaperExchange {
    balances: Balances,
    price: Option<f64>,
    fee_rate: f64,
    available: bool,
    orders: Vec<OrderConfirmation>,
}

impl PaperExchange {
    pub fn new(balances: Balances, fee_rate: f64) -> Self {
        Self {
            balances,
            price: None,
            fee_rate,
            available: true,
            orders: Vec::new(),
        }
    }

    pub fn set_price(&mut self, price: f64) {
        self.price = Some(price);
    }

    /// Make balance queries fail, as an unreachable exchange would
    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    pub fn orders(&self) -> &[OrderConfirmation] {
        &self.orders
    }
}

impl Exchange for PaperExchange {
    fn place_order(
        &mut self,
        side: TradeSide,
        kind: OrderKind,
        amount: f64,
        asset: &str,
    ) -> Result<OrderConfirmation> {
        let price = self
            .price
            .ok_or_else(|| BotError::Exchange(format!("No market price for {}", asset)))?;

        match side {
            TradeSide::Buy => {
                let cost = amount * price;
                if cost > self.balances.fiat {
                    return Err(BotError::Exchange(format!(
                        "Insufficient funds: need {:.2}, have {:.2}",
                        cost, self.balances.fiat
                    )));
                }
                self.balances.fiat -= cost;
                self.balances.crypto += amount * (1.0 - self.fee_rate);
            }
            TradeSide::Sell => {
                if amount > self.balances.crypto {
                    return Err(BotError::Exchange(format!(
                        "Insufficient {}: need {}, have {}",
                        asset, amount, self.balances.crypto
                    )));
                }
                self.balances.crypto -= amount;
                self.balances.fiat += amount * price * (1.0 - self.fee_rate);
            }
        }

        let confirmation = OrderConfirmation {
            side,
            amount,
            price: Some(price),
            reference: Some(format!("{:?}-{}", kind, self.orders.len() + 1).to_lowercase()),
        };
        self.orders.push(confirmation.clone());
        Ok(confirmation)
    }

    fn balances(&mut self, _asset: &str, fiat: &str) -> Result<Balances> {
        if !self.available {
            return Err(BotError::BalanceUnavailable(format!(
                "{} balance query failed",
                fiat
            )));
        }
        Ok(self.balances)
    }
}

/// Market data served from preloaded bars, keyed by interval
#[derive(Debug, Clone, Default)]
pub struct HistoricalFeed {
    bars: HashMap<u32, Vec<OhlcRow>>,
}

impl HistoricalFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bars(mut self, interval_minutes: u32, mut rows: Vec<OhlcRow>) -> Self {
        rows.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        self.bars.insert(interval_minutes, rows);
        self
    }
}

impl MarketData for HistoricalFeed {
    fn ohlc(&mut self, _asset: &str, interval_minutes: u32, since: i64) -> Result<Vec<OhlcRow>> {
        Ok(self
            .bars
            .get(&interval_minutes)
            .map(|rows| {
                rows.iter()
                    .filter(|row| row.timestamp >= since as f64)
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn latest_tick(&mut self, asset: &str) -> Result<Tick> {
        self.bars
            .values()
            .flat_map(|rows| rows.last())
            .max_by(|a, b| a.timestamp.total_cmp(&b.timestamp))
            .map(|row| Tick::new(row.timestamp, row.close))
            .ok_or_else(|| BotError::Exchange(format!("No market data for {}", asset)))
    }
}
