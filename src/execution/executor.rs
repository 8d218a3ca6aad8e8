use super::position_tracker::{FiatAllowance, PositionTracker};
use crate::api::{Balances, Exchange, OrderKind, ReportStore};
use crate::models::{FillRecord, TradeSide};
use crate::series::BarSeries;
use crate::Result;

/// Fee haircut applied when sizing an order
pub const SIZING_FEE: f64 = 0.00025;

/// Fee charged when a simulated order settles
pub const SETTLEMENT_FEE: f64 = 0.0025;

/// Sizing and fee parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderLimits {
    /// Maximum fiat value of one order, `None` for no limit
    pub position_limit: Option<f64>,
    pub sizing_fee: f64,
    pub settlement_fee: f64,
}

impl Default for OrderLimits {
    fn default() -> Self {
        Self {
            position_limit: None,
            sizing_fee: SIZING_FEE,
            settlement_fee: SETTLEMENT_FEE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Fills settle against the tracker
    Simulated,
    /// Orders go to the exchange and balances are re-read afterwards
    Live,
}

/// Turns order intents into sized fills
pub struct OrderExecutor {
    limits: OrderLimits,
    mode: ExecutionMode,
    exchange: Option<Box<dyn Exchange>>,
    reports: Option<Box<dyn ReportStore>>,
    asset: String,
    fiat: String,
    fiat_allowance_cap: f64,
}

impl OrderExecutor {
    /// Executor settling every order locally
    pub fn simulated(limits: OrderLimits, asset: &str, fiat: &str) -> Self {
        Self {
            limits,
            mode: ExecutionMode::Simulated,
            exchange: None,
            reports: None,
            asset: asset.to_string(),
            fiat: fiat.to_string(),
            fiat_allowance_cap: 50.0,
        }
    }

    /// Executor dispatching every order to `exchange`
    pub fn live(limits: OrderLimits, exchange: Box<dyn Exchange>, asset: &str, fiat: &str) -> Self {
        Self {
            mode: ExecutionMode::Live,
            exchange: Some(exchange),
            ..Self::simulated(limits, asset, fiat)
        }
    }

    /// Read simulated balances from an exchange, capped by the fiat allowance
    pub fn with_balance_source(mut self, exchange: Box<dyn Exchange>, fiat_allowance_cap: f64) -> Self {
        self.exchange = Some(exchange);
        self.fiat_allowance_cap = fiat_allowance_cap;
        self
    }

    pub fn with_reports(mut self, reports: Box<dyn ReportStore>) -> Self {
        self.reports = Some(reports);
        self
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn limits(&self) -> &OrderLimits {
        &self.limits
    }

    /// Change the fiat cap of one order, `None` removes it
    pub fn set_position_limit(&mut self, limit: Option<f64>) {
        self.limits.position_limit = limit;
    }

    pub fn reports(&self) -> Option<&dyn ReportStore> {
        self.reports.as_deref()
    }

    /// Amount actually sent for a requested `amount` at `price`
    ///
    /// Caps to the position limit, then to the balance net of the sizing fee.
    pub fn size(&self, side: TradeSide, amount: f64, price: f64, tracker: &PositionTracker) -> f64 {
        let mut amount = amount;
        if let Some(limit) = self.limits.position_limit {
            amount = amount.min(limit / price);
        }

        let available = match side {
            TradeSide::Buy => tracker.fiat() / price * (1.0 - self.limits.sizing_fee),
            TradeSide::Sell => tracker.crypto() * (1.0 - self.limits.sizing_fee),
        };
        amount.min(available)
    }

    /// Order everything the balances allow at the latest close
    pub fn add_order_max(
        &mut self,
        side: TradeSide,
        series: &BarSeries,
        tracker: &mut PositionTracker,
        timestamp: f64,
    ) -> Result<Option<FillRecord>> {
        let Some(price) = series.last_price() else {
            tracing::warn!("No price available, {} order skipped", side);
            return Ok(None);
        };

        let amount = match side {
            TradeSide::Buy => tracker.fiat() / price,
            TradeSide::Sell => tracker.crypto(),
        };
        self.add_order(side, amount, price, tracker, timestamp)
    }

    /// Size, dispatch and record one order
    ///
    /// Returns `None` when the sized amount leaves nothing to trade.
    pub fn add_order(
        &mut self,
        side: TradeSide,
        amount: f64,
        price: f64,
        tracker: &mut PositionTracker,
        timestamp: f64,
    ) -> Result<Option<FillRecord>> {
        if !(price > 0.0 && price.is_finite()) {
            tracing::warn!("Invalid price {}, {} order skipped", price, side);
            return Ok(None);
        }

        let amount = self.size(side, amount, price, tracker);
        if !(amount > 0.0) {
            tracing::debug!("Nothing to {} at {}", side, price);
            return Ok(None);
        }

        let mut fill_price = price;
        match self.mode {
            ExecutionMode::Simulated => {
                tracker.apply_fill(side, amount, price, self.limits.settlement_fee);
            }
            ExecutionMode::Live => {
                let exchange = self.exchange.as_deref_mut().ok_or_else(|| {
                    crate::BotError::Configuration("Live execution without an exchange".to_string())
                })?;
                let confirmation = exchange.place_order(side, OrderKind::Market, amount, &self.asset)?;
                fill_price = confirmation.price.unwrap_or(price);
                tracker.refresh(exchange, &self.asset, &self.fiat, FiatAllowance::Full, Some(fill_price))?;
            }
        }

        let fill = FillRecord {
            timestamp,
            price: fill_price,
            amount,
            side,
        };
        tracker.record_fill(fill);
        if let Some(reports) = self.reports.as_mut() {
            reports.append(&fill)?;
        }

        tracing::info!(
            "{} {} {} at {} ({:?})",
            side,
            amount,
            self.asset,
            fill_price,
            tracker.stance()
        );
        Ok(Some(fill))
    }

    /// Re-read balances when a source is configured, otherwise re-derive the stance
    pub fn refresh_balances(&mut self, tracker: &mut PositionTracker, price: Option<f64>) -> Result<Balances> {
        let allowance = match self.mode {
            ExecutionMode::Simulated => FiatAllowance::Capped(self.fiat_allowance_cap),
            ExecutionMode::Live => FiatAllowance::Full,
        };

        match self.exchange.as_deref_mut() {
            Some(exchange) => tracker.refresh(exchange, &self.asset, &self.fiat, allowance, price),
            None => {
                tracker.derive_stance(price);
                Ok(Balances {
                    crypto: tracker.crypto(),
                    fiat: tracker.fiat(),
                })
            }
        }
    }
}
