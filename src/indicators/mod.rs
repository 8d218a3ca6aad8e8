// Technical indicators module
// Rolling Bollinger statistics, weighted EMAs and smoothed averages,
// all maintained incrementally over a bar series

pub mod bollinger;
pub mod ema;
pub mod engine;
pub mod moving_average;
pub mod smma;

pub use bollinger::{gap_point, percent_b, BollingerBands};
pub use ema::{weighted_ema_series, WeightedEma};
pub use engine::{IndicatorEngine, IndicatorSettings};
pub use moving_average::{calculate_sma, RollingWindow, WindowStats};
pub use smma::SmoothedAverage;

/// EMA spans a series may be configured with
pub const EMA_SPANS: [u32; 7] = [5, 10, 20, 40, 50, 100, 200];

/// Default Bollinger window
pub const DEFAULT_WINDOW: usize = 30;

/// Default SMMA windows of the long-term profile
pub const DEFAULT_SMMA_WINDOWS: [usize; 2] = [5, 40];

/// Round to `decimals` places, ties to even
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}
