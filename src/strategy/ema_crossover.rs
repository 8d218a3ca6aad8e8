use super::{format_bar_time, Strategy};
use crate::indicators::IndicatorEngine;
use crate::models::{Bar, Signal, Stance};
use crate::series::BarSeries;
use crate::{BotError, Result};
use serde::{Deserialize, Serialize};

/// Average family a crossover compares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AverageKind {
    #[default]
    Ema,
    Smma,
}

impl AverageKind {
    pub fn value(&self, bar: &Bar, period: u32) -> Option<f64> {
        match self {
            AverageKind::Ema => bar.ema(period),
            AverageKind::Smma => bar.smma(period as usize),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            AverageKind::Ema => "EMA",
            AverageKind::Smma => "SMMA",
        }
    }
}

/// Crossover of a fast and a slow average, evaluated once per closed bar
///
/// While holding fiat it buys whenever the fast average is above the slow
/// one on the bar that just closed, and while holding the asset it sells
/// whenever the fast average is below. Orders repeat on every qualifying
/// closed bar, not only at the crossing.
#[derive(Debug, Clone)]
pub struct EmaCrossover {
    low: u32,
    high: u32,
    average: AverageKind,
    name: String,
}

impl EmaCrossover {
    /// Create a crossover on periods the engine computes
    ///
    /// Fails when either period is not configured on `engine` or when
    /// `low >= high`.
    pub fn new(low: u32, high: u32, average: AverageKind, engine: &IndicatorEngine) -> Result<Self> {
        let configured: Vec<u32> = match average {
            AverageKind::Ema => engine.ema_spans(),
            AverageKind::Smma => engine.smma_windows().into_iter().map(|w| w as u32).collect(),
        };

        for period in [low, high] {
            if !configured.contains(&period) {
                return Err(BotError::Configuration(format!(
                    "{}{} is not computed (configured: {:?})",
                    average.label(),
                    period,
                    configured
                )));
            }
        }
        if low >= high {
            return Err(BotError::Configuration(format!(
                "Crossover needs low < high, got {} and {}",
                low, high
            )));
        }

        Ok(Self {
            low,
            high,
            average,
            name: format!("{}{}/{} crossover", average.label(), low, high),
        })
    }

    pub fn periods(&self) -> (u32, u32) {
        (self.low, self.high)
    }

    pub fn average(&self) -> AverageKind {
        self.average
    }
}

impl Strategy for EmaCrossover {
    fn evaluate(&self, series: &BarSeries, stance: Stance, interval_closed: bool) -> Signal {
        if stance == Stance::Undetermined || !interval_closed {
            return Signal::Hold;
        }

        // The last entry is the bar the closing tick just opened
        let Some(bar) = series.bar_from_end(1) else {
            return Signal::Hold;
        };
        let (Some(fast), Some(slow)) = (
            self.average.value(bar, self.low),
            self.average.value(bar, self.high),
        ) else {
            tracing::debug!("{}: not enough history", self.name);
            return Signal::Hold;
        };

        tracing::info!(
            "{} close {} {}{} {} {}{} {} ({:?})",
            format_bar_time(bar.bucket_start),
            bar.close,
            self.average.label(),
            self.low,
            fast,
            self.average.label(),
            self.high,
            slow,
            stance
        );

        match stance {
            // The ratio checks already follow from the strict comparisons
            Stance::Buy if fast > slow && fast / slow >= 1.0 => {
                tracing::info!("{}: buy", self.name);
                Signal::Buy
            }
            Stance::Sell if fast < slow && slow / fast >= 1.0 => {
                tracing::info!("{}: sell", self.name);
                Signal::Sell
            }
            _ => Signal::Hold,
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn min_bars_required(&self) -> usize {
        2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{IndicatorSettings, EMA_SPANS};

    fn intraday_series() -> BarSeries {
        BarSeries::with_settings(15, &IndicatorSettings::intraday(30, EMA_SPANS.to_vec())).unwrap()
    }

    /// Series whose second-to-last bar carries the given averages
    fn series_with_closed_bar(ema5: f64, ema40: f64) -> BarSeries {
        let mut series = intraday_series();
        series.ingest(0.0, 100.0).unwrap();
        series.ingest(900.0, 100.0).unwrap();

        let closed = &mut series.finalized_mut()[0];
        closed.ema.insert(5, ema5);
        closed.ema.insert(40, ema40);
        series
    }

    fn crossover(engine: &IndicatorEngine) -> EmaCrossover {
        EmaCrossover::new(5, 40, AverageKind::Ema, engine).unwrap()
    }

    #[test]
    fn test_rejects_unconfigured_or_inverted_pair() {
        let series = intraday_series();
        assert!(matches!(
            EmaCrossover::new(5, 30, AverageKind::Ema, series.engine()),
            Err(BotError::Configuration(_))
        ));
        assert!(EmaCrossover::new(40, 5, AverageKind::Ema, series.engine()).is_err());
        assert!(EmaCrossover::new(5, 5, AverageKind::Ema, series.engine()).is_err());
        assert!(EmaCrossover::new(5, 40, AverageKind::Smma, series.engine()).is_err());
    }

    #[test]
    fn test_buy_on_closed_bar() {
        let series = series_with_closed_bar(110.0, 100.0);
        let strategy = crossover(series.engine());

        assert_eq!(strategy.evaluate(&series, Stance::Buy, true), Signal::Buy);
        assert_eq!(strategy.evaluate(&series, Stance::Sell, true), Signal::Hold);
    }

    #[test]
    fn test_sell_on_closed_bar() {
        let series = series_with_closed_bar(90.0, 100.0);
        let strategy = crossover(series.engine());

        assert_eq!(strategy.evaluate(&series, Stance::Sell, true), Signal::Sell);
        assert_eq!(strategy.evaluate(&series, Stance::Buy, true), Signal::Hold);
    }

    #[test]
    fn test_slight_crossings_still_trade() {
        let below = series_with_closed_bar(100.0 - 1e-9, 100.0);
        let strategy = crossover(below.engine());
        assert_eq!(strategy.evaluate(&below, Stance::Sell, true), Signal::Sell);

        let above = series_with_closed_bar(100.0 + 1e-9, 100.0);
        assert_eq!(strategy.evaluate(&above, Stance::Buy, true), Signal::Buy);
    }

    #[test]
    fn test_waits_for_closed_interval_and_stance() {
        let series = series_with_closed_bar(110.0, 100.0);
        let strategy = crossover(series.engine());

        assert_eq!(strategy.evaluate(&series, Stance::Buy, false), Signal::Hold);
        assert_eq!(
            strategy.evaluate(&series, Stance::Undetermined, true),
            Signal::Hold
        );
    }

    #[test]
    fn test_equal_averages_hold() {
        let series = series_with_closed_bar(100.0, 100.0);
        let strategy = crossover(series.engine());

        assert_eq!(strategy.evaluate(&series, Stance::Buy, true), Signal::Hold);
        assert_eq!(strategy.evaluate(&series, Stance::Sell, true), Signal::Hold);
    }

    #[test]
    fn test_single_bar_holds() {
        let mut series = intraday_series();
        series.ingest(0.0, 100.0).unwrap();
        let strategy = crossover(series.engine());

        assert_eq!(strategy.evaluate(&series, Stance::Buy, true), Signal::Hold);
    }

    #[test]
    fn test_smma_crossover_needs_seeded_windows() {
        let mut series =
            BarSeries::with_settings(1440, &IndicatorSettings::long_term(vec![5, 40])).unwrap();
        let strategy = EmaCrossover::new(5, 40, AverageKind::Smma, series.engine()).unwrap();
        assert_eq!(strategy.name(), "SMMA5/40 crossover");

        for day in 0..10 {
            series.ingest(day as f64 * 86_400.0, 100.0 + day as f64).unwrap();
        }
        assert!(series.is_interval_closed());
        // SMMA40 is not seeded yet
        assert_eq!(strategy.evaluate(&series, Stance::Buy, true), Signal::Hold);

        for day in 10..45 {
            series.ingest(day as f64 * 86_400.0, 100.0 + day as f64).unwrap();
        }
        assert!(series.is_interval_closed());
        // Rising prices keep the fast average above the slow one
        assert_eq!(strategy.evaluate(&series, Stance::Buy, true), Signal::Buy);
    }
}
