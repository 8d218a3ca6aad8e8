use crate::indicators::{gap_point, IndicatorEngine, IndicatorSettings};
use crate::models::{Bar, BollingerGapPoint, OhlcRow, Record};
use crate::{BotError, Result};
use std::io::Write;

/// Append-only series of OHLC bars for one asset
///
/// Holds the finalized bars plus at most one in-progress bar, which is
/// always the last entry of the series. Indicator values are kept current
/// on every bar, the in-progress one included.
///
/// The interval-closed flag is latched when a bucket closes and cleared by
/// [`BarSeries::is_interval_closed`]. A caller relying on it must poll it
/// after every tick, otherwise edges get merged.
#[derive(Debug, Clone)]
pub struct BarSeries {
    interval_secs: i64,
    bars: Vec<Bar>,
    in_progress: Option<Bar>,
    interval_closed: bool,
    engine: IndicatorEngine,
}

impl BarSeries {
    /// Create an empty series
    ///
    /// # Arguments
    /// * `interval_minutes` - Bucket length, must be positive
    /// * `engine` - Indicator state, normally fresh
    pub fn new(interval_minutes: u32, engine: IndicatorEngine) -> Result<Self> {
        if interval_minutes == 0 {
            return Err(BotError::Configuration(
                "Bar interval must be positive".to_string(),
            ));
        }

        Ok(Self {
            interval_secs: i64::from(interval_minutes) * 60,
            bars: Vec::new(),
            in_progress: None,
            interval_closed: false,
            engine,
        })
    }

    pub fn with_settings(interval_minutes: u32, settings: &IndicatorSettings) -> Result<Self> {
        Self::new(interval_minutes, IndicatorEngine::new(settings)?)
    }

    pub fn interval_secs(&self) -> i64 {
        self.interval_secs
    }

    pub fn engine(&self) -> &IndicatorEngine {
        &self.engine
    }

    /// Start of the bucket containing `timestamp`
    pub fn bucket_start(&self, timestamp: f64) -> i64 {
        (timestamp - timestamp.rem_euclid(self.interval_secs as f64)) as i64
    }

    /// Ingest one live tick and refresh the indicators
    ///
    /// A tick stamped before the in-progress bucket is absorbed into that
    /// bar; closed bars are never reopened.
    pub fn ingest(&mut self, timestamp: f64, price: f64) -> Result<()> {
        if !timestamp.is_finite() || !price.is_finite() {
            return Err(BotError::InvalidTick { timestamp, price });
        }

        self.push_tick(timestamp, price, true);
        self.refresh_in_progress();
        Ok(())
    }

    /// Ingest records in timestamp order, recomputing indicators once at the end
    ///
    /// Bulk loads never raise the interval-closed edge. Returns the number
    /// of records applied. Records with non-finite
    /// fields and bars violating `low <= open, close <= high` are skipped.
    pub fn append_many<I>(&mut self, records: I) -> usize
    where
        I: IntoIterator<Item = Record>,
    {
        let mut records: Vec<Record> = records.into_iter().collect();
        records.sort_by(|a, b| a.timestamp().total_cmp(&b.timestamp()));

        let mut applied = 0;
        for record in records {
            let accepted = match record {
                Record::Tick(tick) if tick.timestamp.is_finite() && tick.price.is_finite() => {
                    self.push_tick(tick.timestamp, tick.price, false);
                    true
                }
                Record::Tick(tick) => {
                    tracing::warn!(
                        timestamp = tick.timestamp,
                        price = tick.price,
                        "Skipping non-finite tick"
                    );
                    false
                }
                Record::Bar(row) => self.push_row(&row),
            };
            if accepted {
                applied += 1;
            }
        }

        self.engine.rebuild(&mut self.bars, self.in_progress.as_mut());
        tracing::debug!(
            "Bulk load applied {} records, series has {} bars",
            applied,
            self.len()
        );
        applied
    }

    /// Append pre-aggregated bars, recomputing indicators once at the end
    pub fn append_bars<I>(&mut self, rows: I) -> usize
    where
        I: IntoIterator<Item = OhlcRow>,
    {
        self.append_many(rows.into_iter().map(Record::Bar))
    }

    /// Return and clear the interval-closed flag
    pub fn is_interval_closed(&mut self) -> bool {
        std::mem::take(&mut self.interval_closed)
    }

    /// Latest close, in-progress bar included
    pub fn last_price(&self) -> Option<f64> {
        self.last().map(|bar| bar.close)
    }

    /// Number of bars, in-progress bar included
    pub fn len(&self) -> usize {
        self.bars.len() + usize::from(self.in_progress.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&Bar> {
        match index.cmp(&self.bars.len()) {
            std::cmp::Ordering::Less => self.bars.get(index),
            std::cmp::Ordering::Equal => self.in_progress.as_ref(),
            std::cmp::Ordering::Greater => None,
        }
    }

    pub fn last(&self) -> Option<&Bar> {
        self.in_progress.as_ref().or_else(|| self.bars.last())
    }

    /// Bar `offset` positions before the last one
    pub fn bar_from_end(&self, offset: usize) -> Option<&Bar> {
        let index = self.len().checked_sub(offset + 1)?;
        self.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bar> {
        self.bars.iter().chain(self.in_progress.iter())
    }

    pub fn finalized(&self) -> &[Bar] {
        &self.bars
    }

    #[cfg(test)]
    pub(crate) fn finalized_mut(&mut self) -> &mut [Bar] {
        &mut self.bars
    }

    pub fn in_progress(&self) -> Option<&Bar> {
        self.in_progress.as_ref()
    }

    /// One gap point per bar, derived from the current bands
    pub fn bollinger_gaps(&self) -> Vec<BollingerGapPoint> {
        self.iter().map(gap_point).collect()
    }

    pub fn current_bollinger_value(&self) -> Option<f64> {
        self.last().and_then(|bar| gap_point(bar).value)
    }

    /// Write every bar with its indicators as CSV
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let spans = self.engine.ema_spans();
        let windows = self.engine.smma_windows();
        let mut csv = csv::Writer::from_writer(writer);

        let mut header: Vec<String> = ["Date", "Open", "High", "Low", "Close", "MA", "Std", "LBand", "HBand"]
            .iter()
            .map(|h| h.to_string())
            .collect();
        header.extend(spans.iter().map(|span| format!("EMA{}", span)));
        header.extend(windows.iter().map(|window| format!("SMMA{}", window)));
        csv.write_record(&header)?;

        let cell = |value: Option<f64>| value.map(|v| v.to_string()).unwrap_or_default();
        for bar in self.iter() {
            let mut row = vec![
                bar.bucket_start.to_string(),
                bar.open.to_string(),
                bar.high.to_string(),
                bar.low.to_string(),
                bar.close.to_string(),
                cell(bar.moving_average),
                cell(bar.std_dev),
                cell(bar.lower_band),
                cell(bar.upper_band),
            ];
            row.extend(spans.iter().map(|&span| cell(bar.ema(span))));
            row.extend(windows.iter().map(|&window| cell(bar.smma(window))));
            csv.write_record(&row)?;
        }

        csv.flush()?;
        Ok(())
    }

    fn push_tick(&mut self, timestamp: f64, price: f64, live: bool) {
        if let Some(bar) = self.in_progress.as_mut() {
            if timestamp < bar.bucket_start as f64 + self.interval_secs as f64 {
                bar.absorb_tick(price);
                return;
            }
            self.finalize_in_progress(live, live);
        }

        // Only reached with closed bars and nothing in progress
        let bucket = self.bucket_start(timestamp);
        if let Some(last) = self.bars.last() {
            if bucket <= last.bucket_start {
                tracing::warn!(
                    timestamp,
                    last_bucket = last.bucket_start,
                    "Ignoring tick older than the last closed bar"
                );
                return;
            }
        }

        self.in_progress = Some(Bar::open_at(bucket, price));
    }

    /// Route a pre-aggregated row through the in-progress slot
    fn push_row(&mut self, row: &OhlcRow) -> bool {
        let finite = [row.timestamp, row.open, row.high, row.low, row.close]
            .iter()
            .all(|v| v.is_finite());
        if !finite || row.low > row.open.min(row.close) || row.high < row.open.max(row.close) {
            tracing::warn!(timestamp = row.timestamp, "Skipping inconsistent OHLC row");
            return false;
        }

        let bucket = self.bucket_start(row.timestamp);
        let latest = self.last().map(|bar| bar.bucket_start);
        match latest {
            Some(latest) if bucket < latest => {
                tracing::debug!(bucket, latest, "Ignoring OHLC row older than the series");
                false
            }
            Some(latest) if bucket == latest && self.in_progress.is_some() => {
                if let Some(bar) = self.in_progress.as_mut() {
                    bar.absorb_row(row);
                }
                true
            }
            Some(latest) if bucket == latest => {
                tracing::debug!(bucket, "Ignoring OHLC row for an already closed bucket");
                false
            }
            _ => {
                self.finalize_in_progress(false, false);
                self.in_progress = Some(Bar::from_row(bucket, row));
                true
            }
        }
    }

    fn finalize_in_progress(&mut self, live: bool, raise_edge: bool) {
        let Some(mut bar) = self.in_progress.take() else {
            return;
        };

        if self
            .bars
            .last()
            .is_some_and(|last| last.bucket_start == bar.bucket_start)
        {
            tracing::debug!(bucket = bar.bucket_start, "Bar already finalized");
            return;
        }

        if live {
            self.engine.commit(&mut bar);
        }

        tracing::debug!(
            bucket = bar.bucket_start,
            open = bar.open,
            high = bar.high,
            low = bar.low,
            close = bar.close,
            "Bar closed"
        );

        self.bars.push(bar);
        if raise_edge {
            self.interval_closed = true;
        }
    }

    fn refresh_in_progress(&mut self) {
        if let Some(bar) = self.in_progress.as_mut() {
            self.engine.preview(bar);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::EMA_SPANS;
    use crate::models::Tick;

    fn series(interval_minutes: u32) -> BarSeries {
        BarSeries::with_settings(
            interval_minutes,
            &IndicatorSettings::intraday(30, EMA_SPANS.to_vec()),
        )
        .unwrap()
    }

    fn row(timestamp: f64, open: f64, high: f64, low: f64, close: f64) -> OhlcRow {
        OhlcRow {
            timestamp,
            open,
            high,
            low,
            close,
        }
    }

    #[test]
    fn test_rejects_zero_interval() {
        let engine = IndicatorEngine::new(&IndicatorSettings::long_term(vec![5])).unwrap();
        assert!(matches!(
            BarSeries::new(0, engine),
            Err(BotError::Configuration(_))
        ));
    }

    #[test]
    fn test_bucket_alignment() {
        let series = series(15);
        assert_eq!(series.bucket_start(1_000.0), 900);
        assert_eq!(series.bucket_start(1_799.9), 900);
        assert_eq!(series.bucket_start(1_800.0), 1_800);
    }

    #[test]
    fn test_first_tick_opens_bar() {
        let mut series = series(15);
        series.ingest(1_000.0, 42.0).unwrap();

        let bar = series.last().unwrap();
        assert_eq!(bar.bucket_start, 900);
        assert_eq!((bar.open, bar.high, bar.low, bar.close), (42.0, 42.0, 42.0, 42.0));
        assert!(series.finalized().is_empty());
        assert!(!series.is_interval_closed());
    }

    #[test]
    fn test_ohlc_invariant_within_bucket() {
        let mut series = series(15);
        let prices = [100.0, 103.0, 99.0, 101.5, 98.0, 104.0, 100.0];
        for (i, &price) in prices.iter().enumerate() {
            series.ingest(900.0 + i as f64 * 10.0, price).unwrap();
            assert!(series.last().unwrap().is_consistent());
        }

        let bar = series.last().unwrap();
        assert_eq!(bar.open, 100.0);
        assert_eq!(bar.high, 104.0);
        assert_eq!(bar.low, 98.0);
        assert_eq!(bar.close, 100.0);
    }

    #[test]
    fn test_bucket_boundary_is_deterministic() {
        let mut series = series(15);
        series.ingest(100.0, 1.0).unwrap();
        // Bucket of 100 is [0, 900)
        series.ingest(899.0, 2.0).unwrap();
        assert!(!series.is_interval_closed());
        assert!(series.finalized().is_empty());

        series.ingest(900.0, 3.0).unwrap();
        assert_eq!(series.finalized().len(), 1);
        assert_eq!(series.finalized()[0].close, 2.0);
        assert!(series.is_interval_closed());
    }

    #[test]
    fn test_interval_closed_is_consumed_once() {
        let mut series = series(1);
        series.ingest(0.0, 1.0).unwrap();
        series.ingest(60.0, 2.0).unwrap();

        assert!(series.is_interval_closed());
        assert!(!series.is_interval_closed());
    }

    #[test]
    fn test_bucket_starts_strictly_increase() {
        let mut series = series(1);
        for i in 0..20 {
            series.ingest(i as f64 * 45.0, 10.0 + i as f64).unwrap();
        }
        let starts: Vec<i64> = series.iter().map(|bar| bar.bucket_start).collect();
        assert!(starts.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_tick_in_open_bucket_after_bulk_load() {
        let mut series = series(1);
        series.append_many(vec![
            Record::Tick(Tick::new(0.0, 1.0)),
            Record::Tick(Tick::new(60.0, 2.0)),
            Record::Tick(Tick::new(120.0, 3.0)),
        ]);
        assert_eq!(series.len(), 3);

        // Still inside the in-progress bucket, so it updates it
        series.ingest(125.0, 4.0).unwrap();
        assert_eq!(series.last().unwrap().close, 4.0);
        assert_eq!(series.len(), 3);
    }

    #[test]
    fn test_late_live_tick_joins_current_bar() {
        let mut series = series(15);
        series.ingest(0.0, 10.0).unwrap();
        series.ingest(900.0, 11.0).unwrap();
        assert!(series.is_interval_closed());

        // Belongs to the closed first bucket, lands in the open one
        series.ingest(100.0, 9.0).unwrap();
        assert_eq!(series.finalized()[0].close, 10.0);
        let bar = series.in_progress().unwrap();
        assert_eq!(bar.bucket_start, 900);
        assert_eq!((bar.low, bar.close), (9.0, 9.0));
        assert!(!series.is_interval_closed());
    }

    #[test]
    fn test_last_price_and_second_to_last() {
        let mut series = series(1);
        assert!(series.last_price().is_none());
        assert!(series.bar_from_end(1).is_none());

        series.ingest(0.0, 10.0).unwrap();
        series.ingest(60.0, 11.0).unwrap();
        series.ingest(61.0, 12.0).unwrap();

        assert_eq!(series.last_price(), Some(12.0));
        assert_eq!(series.bar_from_end(1).unwrap().close, 10.0);
        assert_eq!(series.get(1).unwrap().close, 12.0);
        assert!(series.get(2).is_none());
    }

    #[test]
    fn test_constant_price_bands() {
        for price in [100.0, 0.1, 100.1] {
            let mut series = series(15);
            for i in 0..40 {
                series.ingest(i as f64 * 900.0, price).unwrap();
            }

            let closed = series.bar_from_end(1).unwrap();
            assert_eq!(closed.moving_average, Some(price));
            assert_eq!(closed.std_dev, Some(0.0));
            assert!(series.bollinger_gaps().iter().all(|gap| gap.value.is_none()));
            assert!(series.current_bollinger_value().is_none());
        }
    }

    #[test]
    fn test_live_indicators_match_bulk_load() {
        let ticks: Vec<Tick> = (0..400)
            .map(|i| Tick::new(i as f64 * 130.0, 50.0 + ((i * 7) % 13) as f64 * 0.5))
            .collect();

        let mut live = series(15);
        for tick in &ticks {
            live.ingest(tick.timestamp, tick.price).unwrap();
        }

        let mut bulk = series(15);
        bulk.append_many(ticks.iter().copied().map(Record::Tick));

        assert_eq!(live.len(), bulk.len());
        for (a, b) in live.iter().zip(bulk.iter()) {
            assert_eq!(a.bucket_start, b.bucket_start);
            assert_eq!(a.close, b.close);
            for span in EMA_SPANS {
                let (x, y) = (a.ema(span).unwrap(), b.ema(span).unwrap());
                assert!((x - y).abs() < 1e-9);
            }
            match (a.std_dev, b.std_dev) {
                (Some(x), Some(y)) => assert!((x - y).abs() < 1e-9),
                (None, None) => {}
                other => panic!("std mismatch: {:?}", other),
            }
        }
    }

    #[test]
    fn test_append_many_sorts_records() {
        let mut series = series(1);
        series.append_many(vec![
            Record::Tick(Tick::new(120.0, 3.0)),
            Record::Tick(Tick::new(0.0, 1.0)),
            Record::Tick(Tick::new(60.0, 2.0)),
        ]);
        let closes: Vec<f64> = series.iter().map(|bar| bar.close).collect();
        assert_eq!(closes, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_rows_resample_into_interval() {
        let mut series = series(15);
        let applied = series.append_bars(vec![
            row(900.0, 10.0, 11.0, 9.0, 10.5),
            row(1_200.0, 10.5, 12.0, 10.0, 11.5),
            row(1_500.0, 11.5, 11.8, 8.5, 9.0),
            row(1_800.0, 9.0, 9.5, 8.8, 9.2),
        ]);

        assert_eq!(applied, 4);
        assert!(!series.is_interval_closed());
        let first = &series.finalized()[0];
        assert_eq!(first.bucket_start, 900);
        assert_eq!((first.open, first.high, first.low, first.close), (10.0, 12.0, 8.5, 9.0));
        assert_eq!(series.in_progress().unwrap().bucket_start, 1_800);
    }

    #[test]
    fn test_ticks_continue_last_loaded_row() {
        let mut series = series(15);
        series.append_bars(vec![row(900.0, 10.0, 11.0, 9.0, 10.5)]);
        series.ingest(1_000.0, 12.0).unwrap();

        let bar = series.last().unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(bar.high, 12.0);
        assert_eq!(bar.close, 12.0);
        assert_eq!(bar.open, 10.0);
    }

    #[test]
    fn test_inconsistent_or_stale_rows_skipped() {
        let mut series = series(15);
        let applied = series.append_bars(vec![
            row(1_800.0, 10.0, 11.0, 9.0, 10.5),
            row(900.0, 10.0, 11.0, 9.0, 10.5),
            row(2_700.0, 10.0, 9.0, 11.0, 10.5),
        ]);
        assert_eq!(applied, 1);
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn test_invalid_tick_rejected() {
        let mut series = series(15);
        assert!(matches!(
            series.ingest(f64::NAN, 1.0),
            Err(BotError::InvalidTick { .. })
        ));
        assert!(series.is_empty());
    }

    #[test]
    fn test_write_csv_layout() {
        let mut series = BarSeries::with_settings(1, &IndicatorSettings::intraday(2, vec![5]))
            .unwrap();
        series.ingest(0.0, 1.0).unwrap();
        series.ingest(60.0, 3.0).unwrap();

        let mut out = Vec::new();
        series.write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Date,Open,High,Low,Close,MA,Std,LBand,HBand,EMA5");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("0,1,1,1,1,,,,,1"));
        assert!(lines[2].starts_with("60,3,3,3,3,2,"));
    }
}
