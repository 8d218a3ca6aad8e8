use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossbot::backfill;
use crossbot::backtest::{print_day_results, write_results, BacktestRunner, BacktestSettings};
use crossbot::config::BotConfig;
use crossbot::series::BarSeries;
use crossbot::session::TradingSession;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "crossbot")]
#[command(about = "EMA crossover bot over bucketed price bars", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML settings file, overridden by CROSSBOT__* variables
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Warm up on history, then replay prices tick by tick in simulated mode
    Replay {
        /// Tick or bar CSV loaded without trading
        #[arg(long)]
        history: Option<PathBuf>,

        /// Tick or bar CSV replayed live
        #[arg(long)]
        ticks: PathBuf,

        /// Starting asset balance
        #[arg(long, default_value = "0.0")]
        crypto: f64,

        /// Starting fiat balance
        #[arg(long, default_value = "50.0")]
        fiat: f64,

        /// Write the final bars with their indicators to this CSV
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Replay a directory of dd-mm-YYYY.csv day files
    Backtest {
        /// Directory holding the day files
        #[arg(long)]
        dir: PathBuf,

        /// Starting asset balance
        #[arg(long, default_value = "0.0")]
        crypto: f64,

        /// Starting fiat balance
        #[arg(long, default_value = "50.0")]
        fiat: f64,

        /// Number of most recent days considered
        #[arg(long, default_value = "5")]
        recent_days: usize,

        /// Write the day results to this CSV
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Bulk-load a price file and print bars with their indicators
    Indicators {
        /// Tick or bar CSV
        #[arg(long)]
        input: PathBuf,

        /// Write to this CSV instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let config = BotConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Replay {
            history,
            ticks,
            crypto,
            fiat,
            export,
        } => replay(&config, history.as_deref(), &ticks, crypto, fiat, export.as_deref()),
        Commands::Backtest {
            dir,
            crypto,
            fiat,
            recent_days,
            output,
        } => {
            let settings = BacktestSettings {
                initial_crypto: crypto,
                initial_fiat: fiat,
                recent_days,
            };
            backtest(&config, &dir, settings, output.as_deref())
        }
        Commands::Indicators { input, output } => indicators(&config, &input, output.as_deref()),
    }
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("crossbot=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn replay(
    config: &BotConfig,
    history: Option<&Path>,
    ticks: &Path,
    crypto: f64,
    fiat: f64,
    export: Option<&Path>,
) -> Result<()> {
    let mut session = TradingSession::from_config(config).context("Invalid session settings")?;

    if let Some(path) = history {
        let report = backfill::load_file(path)
            .with_context(|| format!("Failed to load history {}", path.display()))?;
        session.load_history(report.records);
    }
    session.set_custom_balance(crypto, fiat);

    let report = backfill::load_file(ticks)
        .with_context(|| format!("Failed to load ticks {}", ticks.display()))?;

    let mut fills = 0;
    for tick in report.records.iter().flat_map(|record| record.as_ticks()) {
        if session.on_tick(tick.timestamp, tick.price)?.is_some() {
            fills += 1;
        }
    }

    let price = session.series().last_price().unwrap_or_default();
    let tracker = session.tracker();
    println!("\n📊 REPLAY SUMMARY");
    println!("  Bars:                  {}", session.series().len());
    println!("  Fills:                 {}", fills);
    println!("  {:<22} {:.8}", format!("{}:", config.asset), tracker.crypto());
    println!("  {:<22} {:.2}", format!("{}:", config.fiat), tracker.fiat());
    println!("  Portfolio Value:       {:.2}", tracker.portfolio_value(price));

    if let Some(path) = export {
        let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        session.series().write_csv(file)?;
        tracing::info!("Bars written to {}", path.display());
    }

    Ok(())
}

fn backtest(
    config: &BotConfig,
    dir: &Path,
    settings: BacktestSettings,
    output: Option<&Path>,
) -> Result<()> {
    let runner = BacktestRunner::new(config, settings).context("Invalid backtest settings")?;
    let results = runner
        .run_directory(dir)
        .with_context(|| format!("Backtest over {} failed", dir.display()))?;

    print_day_results(&results);

    if let Some(path) = output {
        let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        write_results(&results, file)?;
        tracing::info!("Results written to {}", path.display());
    }

    Ok(())
}

fn indicators(config: &BotConfig, input: &Path, output: Option<&Path>) -> Result<()> {
    config.validate()?;
    let mut series = BarSeries::with_settings(config.interval_minutes, &config.indicator_settings())?;

    let report = backfill::load_file(input)
        .with_context(|| format!("Failed to load {}", input.display()))?;
    let loaded = series.append_many(report.records);
    tracing::info!(
        "Bucketed {} records into {} bars of {}s",
        loaded,
        series.len(),
        series.interval_secs()
    );

    match output {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
            series.write_csv(file)?;
        }
        None => series.write_csv(io::stdout().lock())?,
    }

    if let Some(value) = series.current_bollinger_value() {
        tracing::info!("Current Bollinger gap value: {}", value);
    }
    Ok(())
}
