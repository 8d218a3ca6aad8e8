use crate::api::{Balances, MarketData};
use crate::config::BotConfig;
use crate::execution::{OrderExecutor, PositionTracker};
use crate::models::{FillRecord, Record, Signal, Stance, TradeSide};
use crate::persistence::CsvReportStore;
use crate::series::BarSeries;
use crate::strategy::{EmaCrossover, Strategy};
use crate::Result;

/// Lookback of the seeding request, one day plus a second
pub const BOOTSTRAP_LOOKBACK_SECS: i64 = 86_401;

/// Interval of the coarse seeding bars, in minutes
pub const BOOTSTRAP_COARSE_INTERVAL: u32 = 5;

/// Interval of the fine seeding bars, in minutes
pub const BOOTSTRAP_FINE_INTERVAL: u32 = 1;

/// One asset's series, balances and strategy, driven tick by tick
///
/// Each tick runs ingest, edge consumption, evaluation and execution to
/// completion before the next one is accepted.
pub struct TradingSession<S: Strategy> {
    series: BarSeries,
    tracker: PositionTracker,
    executor: OrderExecutor,
    strategy: S,
    asset: String,
}

impl<S: Strategy> TradingSession<S> {
    pub fn new(
        series: BarSeries,
        tracker: PositionTracker,
        executor: OrderExecutor,
        strategy: S,
        asset: &str,
    ) -> Self {
        tracing::info!("Session for {} using {}", asset, strategy.name());
        Self {
            series,
            tracker,
            executor,
            strategy,
            asset: asset.to_string(),
        }
    }

    pub fn series(&self) -> &BarSeries {
        &self.series
    }

    pub fn tracker(&self) -> &PositionTracker {
        &self.tracker
    }

    pub fn executor(&self) -> &OrderExecutor {
        &self.executor
    }

    pub fn executor_mut(&mut self) -> &mut OrderExecutor {
        &mut self.executor
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn stance(&self) -> Stance {
        self.tracker.stance()
    }

    /// Ingest a live tick, then evaluate and execute
    pub fn on_tick(&mut self, timestamp: f64, price: f64) -> Result<Option<FillRecord>> {
        self.series.ingest(timestamp, price)?;
        let interval_closed = self.series.is_interval_closed();

        if self.series.len() < self.strategy.min_bars_required() {
            return Ok(None);
        }

        let stance = self.tracker.stance();
        let side = match self.strategy.evaluate(&self.series, stance, interval_closed) {
            Signal::Buy => TradeSide::Buy,
            Signal::Sell => TradeSide::Sell,
            Signal::Hold => return Ok(None),
        };
        if stance.side() != Some(side) {
            tracing::debug!("{} signal against {:?} stance ignored", side, stance);
            return Ok(None);
        }

        self.executor
            .add_order_max(side, &self.series, &mut self.tracker, timestamp)
    }

    /// Bulk-load history without evaluating the strategy
    pub fn load_history<I>(&mut self, records: I) -> usize
    where
        I: IntoIterator<Item = Record>,
    {
        self.series.append_many(records)
    }

    /// Override balances, for backtest seeding
    pub fn set_custom_balance(&mut self, crypto: f64, fiat: f64) {
        self.tracker
            .set_balances(crypto, fiat, self.series.last_price());
    }

    pub fn refresh_balances(&mut self) -> Result<Balances> {
        let price = self.series.last_price();
        self.executor.refresh_balances(&mut self.tracker, price)
    }

    /// Restore the last fill, seed the series for the past day, then read balances
    ///
    /// Coarse bars cover the day; fine bars from the last coarse one onward
    /// are fed as their open, high, low and close ticks.
    pub fn bootstrap(&mut self, market: &mut dyn MarketData, now: i64) -> Result<Balances> {
        if let Some(reports) = self.executor.reports() {
            if let Some(fill) = reports.last_fill()? {
                tracing::info!("Last order: {} {} at {}", fill.side, fill.amount, fill.price);
                self.tracker.record_fill(fill);
            }
        }

        let mut since = now - BOOTSTRAP_LOOKBACK_SECS;
        let coarse = market.ohlc(&self.asset, BOOTSTRAP_COARSE_INTERVAL, since)?;
        if let Some(last) = coarse.last() {
            since = last.timestamp as i64 - 1;
        }
        let coarse_count = self.series.append_bars(coarse);

        let fine = market.ohlc(&self.asset, BOOTSTRAP_FINE_INTERVAL, since)?;
        let ticks: Vec<Record> = fine
            .into_iter()
            .flat_map(|row| Record::Bar(row).as_ticks())
            .map(Record::Tick)
            .collect();
        let tick_count = self.load_history(ticks);

        tracing::info!(
            "Seeded {} with {} bars and {} ticks, series has {} bars",
            self.asset,
            coarse_count,
            tick_count,
            self.series.len()
        );

        let balances = self.refresh_balances()?;
        tracing::info!(
            "Initial balance: {} {}, {} fiat",
            balances.crypto,
            self.asset,
            balances.fiat
        );
        Ok(balances)
    }
}

impl TradingSession<EmaCrossover> {
    /// Simulated crossover session built from configuration
    pub fn from_config(config: &BotConfig) -> Result<Self> {
        config.validate()?;

        let series = BarSeries::with_settings(config.interval_minutes, &config.indicator_settings())?;
        let strategy = EmaCrossover::new(
            config.crossover.low,
            config.crossover.high,
            config.crossover.average,
            series.engine(),
        )?;
        let tracker = PositionTracker::new(config.balances.min_fiat_for_buy);

        let mut executor = OrderExecutor::simulated(config.order_limits(), &config.asset, &config.fiat);
        if let Some(path) = &config.report_path {
            executor = executor.with_reports(Box::new(CsvReportStore::new(path)));
        }

        Ok(Self::new(series, tracker, executor, strategy, &config.asset))
    }
}
