// Trading strategy module
pub mod ema_crossover;

use crate::models::{Signal, Stance};
use crate::series::BarSeries;
use chrono::DateTime;

pub use ema_crossover::{AverageKind, EmaCrossover};

/// Time format of decision log lines
pub const LOG_TIME_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

/// Base trait for all trading strategies
///
/// Strategies are stateless per tick: everything they read comes from the
/// series snapshot, the current stance and the interval-closed edge the
/// caller consumed for this tick.
pub trait Strategy: Send + Sync {
    /// Decide what to do after the latest tick
    fn evaluate(&self, series: &BarSeries, stance: Stance, interval_closed: bool) -> Signal;

    /// Get strategy name
    fn name(&self) -> &str;

    /// Minimum bars the series must hold before a signal can be produced
    fn min_bars_required(&self) -> usize;
}

/// Bucket start rendered for logs, UTC
pub fn format_bar_time(bucket_start: i64) -> String {
    DateTime::from_timestamp(bucket_start, 0)
        .map(|time| time.format(LOG_TIME_FORMAT).to_string())
        .unwrap_or_else(|| bucket_start.to_string())
}
