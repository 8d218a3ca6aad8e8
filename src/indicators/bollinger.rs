use super::moving_average::WindowStats;
use super::round_to;
use crate::models::{Bar, BollingerGapPoint};

/// Band multiplier applied to the sample standard deviation
pub const BAND_WIDTH_STD: f64 = 2.0;

/// Bollinger envelope derived from one window's statistics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub moving_average: f64,
    pub std_dev: f64,
    pub lower: f64,
    pub upper: f64,
}

impl BollingerBands {
    pub fn from_stats(stats: WindowStats) -> Self {
        Self {
            moving_average: stats.mean,
            std_dev: stats.std_dev,
            lower: stats.mean - BAND_WIDTH_STD * stats.std_dev,
            upper: stats.mean + BAND_WIDTH_STD * stats.std_dev,
        }
    }

    /// Write the envelope onto a bar, clearing it when undefined
    pub fn apply(bands: Option<Self>, bar: &mut Bar) {
        bar.moving_average = bands.map(|b| b.moving_average);
        bar.std_dev = bands.map(|b| b.std_dev);
        bar.lower_band = bands.map(|b| b.lower);
        bar.upper_band = bands.map(|b| b.upper);
    }
}

/// Unrounded percent position of `close` inside `[lower, upper]`
///
/// A zero-width envelope has no defined position.
pub fn percent_b(close: f64, lower: f64, upper: f64) -> Option<f64> {
    let width = upper - lower;
    if width == 0.0 || !width.is_finite() {
        return None;
    }
    Some((close - lower) / width * 100.0)
}

/// Gap point for a bar; `None` values while its bands are undefined
pub fn gap_point(bar: &Bar) -> BollingerGapPoint {
    let percent = match (bar.lower_band, bar.upper_band) {
        (Some(lower), Some(upper)) => percent_b(bar.close, lower, upper),
        _ => None,
    };

    BollingerGapPoint {
        bucket_start: bar.bucket_start,
        value: percent.map(|p| round_to(p, 2)),
        percent_b: percent,
    }
}
