use super::bollinger::BollingerBands;
use super::ema::WeightedEma;
use super::moving_average::RollingWindow;
use super::smma::SmoothedAverage;
use crate::models::Bar;
use crate::{BotError, Result};

/// Which indicator families run on a series
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSettings {
    /// Bollinger window, `None` disables the family
    pub bollinger_window: Option<usize>,
    pub ema_spans: Vec<u32>,
    pub smma_windows: Vec<usize>,
}

impl IndicatorSettings {
    /// Bollinger bands and EMAs, for short bar intervals
    pub fn intraday(window: usize, ema_spans: Vec<u32>) -> Self {
        Self {
            bollinger_window: Some(window),
            ema_spans,
            smma_windows: Vec::new(),
        }
    }

    /// Smoothed averages only, for daily bars
    pub fn long_term(smma_windows: Vec<usize>) -> Self {
        Self {
            bollinger_window: None,
            ema_spans: Vec::new(),
            smma_windows,
        }
    }
}

/// Incremental indicator state over a bar series
///
/// Finalized bars are committed once, in order; the in-progress bar is
/// previewed against the committed state on every tick without advancing
/// it.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    bands: Option<RollingWindow>,
    emas: Vec<WeightedEma>,
    smmas: Vec<SmoothedAverage>,
    committed: usize,
}

impl IndicatorEngine {
    pub fn new(settings: &IndicatorSettings) -> Result<Self> {
        if let Some(window) = settings.bollinger_window {
            if window < 2 {
                return Err(BotError::Configuration(format!(
                    "Bollinger window must be at least 2, got {}",
                    window
                )));
            }
        }
        if settings.ema_spans.iter().any(|&span| span == 0) {
            return Err(BotError::Configuration(
                "EMA spans must be positive".to_string(),
            ));
        }
        if settings.smma_windows.iter().any(|&window| window == 0) {
            return Err(BotError::Configuration(
                "SMMA windows must be positive".to_string(),
            ));
        }

        let mut spans = settings.ema_spans.clone();
        spans.sort_unstable();
        spans.dedup();
        let mut windows = settings.smma_windows.clone();
        windows.sort_unstable();
        windows.dedup();

        Ok(Self {
            bands: settings.bollinger_window.map(RollingWindow::new),
            emas: spans.into_iter().map(WeightedEma::new).collect(),
            smmas: windows.into_iter().map(SmoothedAverage::new).collect(),
            committed: 0,
        })
    }

    pub fn ema_spans(&self) -> Vec<u32> {
        self.emas.iter().map(|ema| ema.span()).collect()
    }

    pub fn smma_windows(&self) -> Vec<usize> {
        self.smmas.iter().map(|smma| smma.window()).collect()
    }

    pub fn bollinger_window(&self) -> Option<usize> {
        self.bands.as_ref().map(|window| window.capacity())
    }

    /// Number of finalized bars folded into the state
    pub fn committed(&self) -> usize {
        self.committed
    }

    /// Fold a finalized bar into the state and write its values
    pub fn commit(&mut self, bar: &mut Bar) {
        let close = bar.close;

        if let Some(window) = self.bands.as_mut() {
            let bands = window.push(close).map(BollingerBands::from_stats);
            BollingerBands::apply(bands, bar);
        }

        bar.ema.clear();
        for ema in &mut self.emas {
            bar.ema.insert(ema.span(), ema.push(close));
        }

        bar.smma.clear();
        for smma in &mut self.smmas {
            if let Some(value) = smma.push(close) {
                bar.smma.insert(smma.window(), value);
            }
        }

        self.committed += 1;
    }

    /// Write the values the in-progress bar would get if it closed now
    pub fn preview(&self, bar: &mut Bar) {
        let close = bar.close;

        if let Some(window) = self.bands.as_ref() {
            let bands = window.peek(close).map(BollingerBands::from_stats);
            BollingerBands::apply(bands, bar);
        }

        bar.ema.clear();
        for ema in &self.emas {
            bar.ema.insert(ema.span(), ema.peek(close));
        }

        bar.smma.clear();
        for smma in &self.smmas {
            if let Some(value) = smma.peek(close) {
                bar.smma.insert(smma.window(), value);
            }
        }
    }

    /// Recompute everything from scratch, for bulk loads
    pub fn rebuild(&mut self, bars: &mut [Bar], in_progress: Option<&mut Bar>) {
        self.reset();
        for bar in bars.iter_mut() {
            self.commit(bar);
        }
        if let Some(bar) = in_progress {
            self.preview(bar);
        }
    }

    pub fn reset(&mut self) {
        if let Some(window) = self.bands.as_mut() {
            window.clear();
        }
        for ema in &mut self.emas {
            ema.reset();
        }
        for smma in &mut self.smmas {
            smma.reset();
        }
        self.committed = 0;
    }
}
