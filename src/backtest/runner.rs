use crate::backfill::{self, list_day_files, DAY_FILE_FORMAT, DAY_SECS};
use crate::backtest::metrics::{percent_change, BacktestMetrics};
use crate::config::BotConfig;
use crate::models::{Record, Tick};
use crate::session::TradingSession;
use crate::strategy::EmaCrossover;
use crate::{BotError, Result};
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

/// Starting balances and day selection of a backtest
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BacktestSettings {
    pub initial_crypto: f64,
    pub initial_fiat: f64,
    /// Only the most recent days are tested once at least this many exist
    pub recent_days: usize,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            initial_crypto: 0.0,
            initial_fiat: 50.0,
            recent_days: 5,
        }
    }
}

/// Price history of one UTC day
#[derive(Debug, Clone, PartialEq)]
pub struct DayData {
    pub day_start: i64,
    pub records: Vec<Record>,
}

/// Outcome of replaying one day, in the column layout of the results file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayResult {
    #[serde(rename = "Date")]
    pub day_start: i64,
    #[serde(rename = "Crypto")]
    pub crypto: f64,
    #[serde(rename = "Fiat")]
    pub fiat: f64,
    #[serde(rename = "OpeningPrice")]
    pub opening_price: f64,
    #[serde(rename = "ClosePrice")]
    pub close_price: f64,
    /// Against the starting balances valued at the opening price
    #[serde(rename = "OverallBenefit")]
    pub overall_benefit: f64,
    /// Against the starting balances valued at the close price
    #[serde(rename = "BotBenefit")]
    pub bot_benefit: f64,
}

impl DayResult {
    pub fn label(&self) -> String {
        DateTime::from_timestamp(self.day_start, 0)
            .map(|date| date.format(DAY_FILE_FORMAT).to_string())
            .unwrap_or_else(|| self.day_start.to_string())
    }
}

/// Replays price history through fresh simulated crossover sessions
pub struct BacktestRunner {
    config: BotConfig,
    settings: BacktestSettings,
}

impl BacktestRunner {
    /// Create a runner; fills are never written to the configured report file
    pub fn new(config: &BotConfig, settings: BacktestSettings) -> Result<Self> {
        config.validate()?;
        if settings.initial_crypto < 0.0 || settings.initial_fiat < 0.0 {
            return Err(BotError::Configuration(format!(
                "Starting balances must be non-negative: {} crypto, {} fiat",
                settings.initial_crypto, settings.initial_fiat
            )));
        }

        let mut config = config.clone();
        config.report_path = None;
        Ok(Self { config, settings })
    }

    pub fn settings(&self) -> &BacktestSettings {
        &self.settings
    }

    fn session(&self) -> Result<TradingSession<EmaCrossover>> {
        TradingSession::from_config(&self.config)
    }

    /// Indices of the days worth testing, given sorted day starts
    ///
    /// A day is tested when the day right before it exists. The first and
    /// the latest day are never tested.
    pub fn select_days(starts: &[i64], recent_days: usize) -> Vec<usize> {
        let n = starts.len();
        let mut selected = Vec::new();

        for (i, &start) in starts.iter().enumerate() {
            if recent_days > 0 && n >= recent_days && start < starts[n - recent_days] {
                continue;
            }
            if i == 0 || i + 1 == n {
                continue;
            }
            if starts[i - 1] != start - DAY_SECS {
                continue;
            }
            selected.push(i);
        }

        selected
    }

    /// Warm up on `previous`, then replay `day` tick by tick
    ///
    /// Returns `None` when either day holds no prices.
    pub fn run_day(&self, previous: &DayData, day: &DayData) -> Result<Option<DayResult>> {
        let mut session = self.session()?;
        session.load_history(previous.records.iter().copied());

        let Some(opening_price) = session.series().last_price() else {
            tracing::warn!("No history before day {}, skipping", day.day_start);
            return Ok(None);
        };

        let BacktestSettings {
            initial_crypto,
            initial_fiat,
            ..
        } = self.settings;
        session.set_custom_balance(initial_crypto, initial_fiat);

        let mut replayed = 0;
        for record in &day.records {
            for tick in record.as_ticks() {
                session.on_tick(tick.timestamp, tick.price)?;
                replayed += 1;
            }
        }
        if replayed == 0 {
            tracing::warn!("Day {} has no prices, skipping", day.day_start);
            return Ok(None);
        }

        let close_price = session.series().last_price().unwrap_or(opening_price);
        let tracker = session.tracker();
        let final_value = tracker.portfolio_value(close_price);

        let result = DayResult {
            day_start: day.day_start,
            crypto: tracker.crypto(),
            fiat: tracker.fiat(),
            opening_price,
            close_price,
            overall_benefit: percent_change(
                initial_fiat + initial_crypto * opening_price,
                final_value,
            ),
            bot_benefit: percent_change(initial_fiat + initial_crypto * close_price, final_value),
        };

        tracing::info!(
            "Day {}: {} ticks, overall {:+.2}%, bot {:+.2}%",
            result.label(),
            replayed,
            result.overall_benefit,
            result.bot_benefit
        );
        Ok(Some(result))
    }

    /// Run every selected day of a list sorted by day start
    pub fn run(&self, days: &[DayData]) -> Result<Vec<DayResult>> {
        let starts: Vec<i64> = days.iter().map(|d| d.day_start).collect();
        let mut results = Vec::new();

        for i in Self::select_days(&starts, self.settings.recent_days) {
            if let Some(result) = self.run_day(&days[i - 1], &days[i])? {
                results.push(result);
            }
        }

        Ok(results)
    }

    /// Run the selected days of a directory of `dd-mm-YYYY.csv` files
    ///
    /// A day whose files cannot be loaded is logged and skipped.
    pub fn run_directory(&self, dir: &Path) -> Result<Vec<DayResult>> {
        let files = list_day_files(dir)?;
        let starts: Vec<i64> = files.iter().map(|f| f.day_start).collect();
        tracing::info!("Found {} day files in {}", files.len(), dir.display());

        let load = |i: usize| -> Result<DayData> {
            let report = backfill::load_file(&files[i].path)?;
            Ok(DayData {
                day_start: files[i].day_start,
                records: report.records,
            })
        };

        let mut results = Vec::new();
        for i in Self::select_days(&starts, self.settings.recent_days) {
            let pair = load(i - 1).and_then(|previous| load(i).map(|day| (previous, day)));
            let (previous, day) = match pair {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!("Couldn't load day {}: {}", files[i].path.display(), e);
                    continue;
                }
            };
            if let Some(result) = self.run_day(&previous, &day)? {
                results.push(result);
            }
        }

        Ok(results)
    }

    /// Bulk-load the first `warmup` ticks, then replay the rest live
    pub fn run_ticks(&self, ticks: &[Tick], warmup: usize) -> Result<BacktestMetrics> {
        if ticks.len() <= warmup {
            return Err(BotError::InsufficientHistory {
                needed: warmup + 1,
                available: ticks.len(),
            });
        }
        let (history, replay) = ticks.split_at(warmup);

        let mut session = self.session()?;
        session.load_history(history.iter().copied().map(Record::Tick));

        let BacktestSettings {
            initial_crypto,
            initial_fiat,
            ..
        } = self.settings;
        session.set_custom_balance(initial_crypto, initial_fiat);

        let first_price = session.series().last_price().unwrap_or(replay[0].price);
        let initial_value = initial_fiat + initial_crypto * first_price;

        let mut equity = Vec::with_capacity(replay.len());
        let mut fills = Vec::new();
        for tick in replay {
            if let Some(fill) = session.on_tick(tick.timestamp, tick.price)? {
                fills.push(fill);
            }
            equity.push(session.tracker().portfolio_value(tick.price));
        }

        let last_price = replay[replay.len() - 1].price;
        let hold_value = initial_fiat + initial_crypto * last_price;

        Ok(BacktestMetrics::from_equity(
            initial_value,
            hold_value,
            &equity,
            fills,
            first_price,
            last_price,
        ))
    }

    /// Run ticks and print the report
    pub fn run_and_report(
        &self,
        ticks: &[Tick],
        warmup: usize,
        scenario_name: &str,
    ) -> Result<BacktestMetrics> {
        println!("\n🔬 Running backtest: {}", scenario_name);
        println!("   Ticks: {} ({} warm-up)", ticks.len(), warmup);
        println!(
            "   Initial Balances: {} {}, ${:.2}",
            self.settings.initial_crypto, self.config.asset, self.settings.initial_fiat
        );

        let metrics = self.run_ticks(ticks, warmup)?;
        metrics.print_report();

        Ok(metrics)
    }
}

/// Group ticks by UTC day, oldest day first
pub fn split_into_days(ticks: &[Tick]) -> Vec<DayData> {
    let mut days: Vec<DayData> = Vec::new();

    for tick in ticks {
        let day_start = (tick.timestamp as i64).div_euclid(DAY_SECS) * DAY_SECS;
        match days.last_mut() {
            Some(day) if day.day_start == day_start => day.records.push(Record::Tick(*tick)),
            _ => days.push(DayData {
                day_start,
                records: vec![Record::Tick(*tick)],
            }),
        }
    }

    days
}

/// Write day results as CSV
pub fn write_results<W: Write>(results: &[DayResult], writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for result in results {
        csv.serialize(result)?;
    }
    csv.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::synthetic::{MarketScenario, SyntheticDataGenerator};
    use std::fs;
    use tempfile::TempDir;

    const DAY0: i64 = 1_600_041_600;

    fn runner() -> BacktestRunner {
        BacktestRunner::new(&BotConfig::default(), BacktestSettings::default()).unwrap()
    }

    fn flat_day(day_start: i64, price: f64) -> DayData {
        let records = (0..96)
            .map(|i| Record::Tick(Tick::new((day_start + i * 900) as f64, price)))
            .collect();
        DayData { day_start, records }
    }

    #[test]
    fn test_select_days_rules() {
        let d = |n: i64| DAY0 + n * DAY_SECS;

        // First and last excluded
        assert_eq!(BacktestRunner::select_days(&[d(0), d(1), d(2)], 5), vec![1]);

        // Gap before day 3 breaks the chain
        assert_eq!(
            BacktestRunner::select_days(&[d(0), d(1), d(3), d(4)], 5),
            vec![1]
        );

        // Only the five most recent days are considered
        let starts: Vec<i64> = (0..8).map(d).collect();
        assert_eq!(BacktestRunner::select_days(&starts, 5), vec![4, 5, 6]);

        assert!(BacktestRunner::select_days(&[d(0)], 5).is_empty());
    }

    #[test]
    fn test_flat_day_has_no_benefit() {
        let runner = runner();
        let result = runner
            .run_day(&flat_day(DAY0, 100.0), &flat_day(DAY0 + DAY_SECS, 100.0))
            .unwrap()
            .unwrap();

        assert_eq!(result.day_start, DAY0 + DAY_SECS);
        assert_eq!(result.opening_price, 100.0);
        assert_eq!(result.close_price, 100.0);
        assert_eq!(result.crypto, 0.0);
        assert_eq!(result.fiat, 50.0);
        assert!(result.overall_benefit.abs() < 1e-9);
        assert!(result.bot_benefit.abs() < 1e-9);
    }

    #[test]
    fn test_empty_day_is_skipped() {
        let runner = runner();
        let empty = DayData {
            day_start: DAY0 + DAY_SECS,
            records: Vec::new(),
        };
        assert!(runner.run_day(&flat_day(DAY0, 100.0), &empty).unwrap().is_none());
        assert!(runner.run_day(&empty, &flat_day(DAY0, 100.0)).unwrap().is_none());
    }

    #[test]
    fn test_crypto_only_benefits() {
        let settings = BacktestSettings {
            initial_crypto: 1.0,
            initial_fiat: 0.0,
            recent_days: 5,
        };
        let runner = BacktestRunner::new(&BotConfig::default(), settings).unwrap();

        // Holding through a flat day at a higher level than the warm-up
        let result = runner
            .run_day(&flat_day(DAY0, 100.0), &flat_day(DAY0 + DAY_SECS, 110.0))
            .unwrap()
            .unwrap();

        assert_eq!(result.opening_price, 100.0);
        assert_eq!(result.close_price, 110.0);
        // The jump lifts the fast average above the slow one, so nothing is sold
        assert_eq!(result.crypto, 1.0);
        assert!((result.overall_benefit - 10.0).abs() < 1e-9);
        assert!(result.bot_benefit.abs() < 1e-9);
    }

    #[test]
    fn test_run_directory() {
        let dir = TempDir::new().unwrap();
        for (n, name) in ["14-09-2020", "15-09-2020", "16-09-2020"].iter().enumerate() {
            let start = DAY0 + n as i64 * DAY_SECS;
            let mut content = String::from("epoch,price\n");
            for i in 0..48 {
                content.push_str(&format!("{},100\n", start + i * 1800));
            }
            fs::write(dir.path().join(format!("{}.csv", name)), content).unwrap();
        }
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let results = runner().run_directory(dir.path()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].day_start, DAY0 + DAY_SECS);
        assert_eq!(results[0].label(), "15-09-2020");
    }

    #[test]
    fn test_write_results_layout() {
        let result = DayResult {
            day_start: DAY0,
            crypto: 0.0,
            fiat: 50.0,
            opening_price: 100.0,
            close_price: 101.0,
            overall_benefit: 0.0,
            bot_benefit: 0.0,
        };
        let mut out = Vec::new();
        write_results(&[result], &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("Date,Crypto,Fiat,OpeningPrice,ClosePrice,OverallBenefit,BotBenefit")
        );
        assert!(lines.next().unwrap().starts_with("1600041600,0.0,50.0,100.0,101.0"));
    }

    #[test]
    fn test_split_into_days() {
        let ticks = vec![
            Tick::new(DAY0 as f64, 1.0),
            Tick::new((DAY0 + 3600) as f64, 2.0),
            Tick::new((DAY0 + DAY_SECS) as f64, 3.0),
        ];
        let days = split_into_days(&ticks);
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].records.len(), 2);
        assert_eq!(days[1].day_start, DAY0 + DAY_SECS);
    }

    #[test]
    fn test_run_ticks_uptrend() {
        tracing_subscriber::fmt()
            .with_env_filter("crossbot=debug")
            .try_init()
            .ok();

        // Steady rise, one tick a minute for two days
        let ticks: Vec<Tick> = (0..2_880)
            .map(|i| Tick::new((DAY0 + i * 60) as f64, 100.0 + i as f64 * 0.01))
            .collect();

        let metrics = runner().run_ticks(&ticks, 1_440).unwrap();
        println!("Metrics: {:?}", metrics);

        assert!(metrics.buys >= 1);
        assert!(metrics.final_value > 0.0);
        assert_eq!(metrics.initial_value, 50.0);
        // Holding fiat only never moves
        assert!(metrics.hold_return_pct.abs() < 1e-9);
    }

    #[test]
    fn test_run_ticks_synthetic_scenarios() {
        let runner = runner();
        for scenario in MarketScenario::all() {
            let ticks = SyntheticDataGenerator::new(42).generate(scenario, 2_880, 60);
            let metrics = runner.run_ticks(&ticks, 1_440).unwrap();
            assert!(metrics.final_value > 0.0, "{} lost everything", scenario.name());
            assert_eq!(metrics.total_trades, metrics.buys + metrics.sells);
        }
    }

    #[test]
    fn test_run_ticks_insufficient_data() {
        let ticks = vec![Tick::new(DAY0 as f64, 1.0)];
        let result = runner().run_ticks(&ticks, 10);
        assert!(matches!(
            result,
            Err(BotError::InsufficientHistory {
                needed: 11,
                available: 1
            })
        ));
    }
}
