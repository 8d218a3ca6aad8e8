use anyhow::{Context, Result};
use crossbot::backtest::{
    print_day_results, split_into_days, BacktestMetrics, BacktestRunner, BacktestSettings,
    MarketScenario, SyntheticDataGenerator,
};
use crossbot::config::BotConfig;
use tracing_subscriber::EnvFilter;

/// One tick a minute
const TICK_SECS: i64 = 60;

/// Three days of ticks, the first one used as warm-up
const NUM_TICKS: usize = 3 * 1_440;
const WARMUP_TICKS: usize = 1_440;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("crossbot=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("\n╔═══════════════════════════════════════════════════════╗");
    println!("║          CROSSBOT BACKTESTING SUITE                   ║");
    println!("╚═══════════════════════════════════════════════════════╝");

    let config = BotConfig::load(None).context("Failed to load configuration")?;
    let settings = BacktestSettings::default();
    let runner = BacktestRunner::new(&config, settings)?;

    let scenarios = [
        (MarketScenario::Uptrend, "📈 Uptrend (+2% daily)"),
        (MarketScenario::Downtrend, "📉 Downtrend (-2% daily)"),
        (MarketScenario::Sideways, "↔️  Sideways (mean-reverting)"),
        (MarketScenario::Volatile, "⚡ Volatile (±2% swings)"),
    ];

    let mut all_metrics = Vec::new();

    for (scenario, name) in scenarios {
        let mut generator = SyntheticDataGenerator::new(42);
        let ticks = generator.generate(scenario, NUM_TICKS, TICK_SECS);

        match runner.run_and_report(&ticks, WARMUP_TICKS, name) {
            Ok(metrics) => all_metrics.push((name.to_string(), metrics)),
            Err(e) => eprintln!("❌ Backtest failed for {}: {}", name, e),
        }

        // Same data, replayed one day at a time
        let days = split_into_days(&ticks);
        match runner.run(&days) {
            Ok(results) => print_day_results(&results),
            Err(e) => eprintln!("❌ Day-by-day backtest failed for {}: {}", name, e),
        }
    }

    print_summary_comparison(&all_metrics);

    Ok(())
}

fn print_summary_comparison(results: &[(String, BacktestMetrics)]) {
    println!("\n╔═══════════════════════════════════════════════════════╗");
    println!("║              SCENARIO COMPARISON                      ║");
    println!("╚═══════════════════════════════════════════════════════╝\n");

    println!(
        "{:<30} {:>10} {:>10} {:>8} {:>8}",
        "Scenario", "Return%", "Hold%", "Trades", "MaxDD%"
    );
    println!("{}", "─".repeat(70));

    for (name, metrics) in results {
        println!(
            "{:<30} {:>10.2} {:>10.2} {:>8} {:>8.2}",
            name,
            metrics.total_return_pct,
            metrics.hold_return_pct,
            metrics.total_trades,
            metrics.max_drawdown_pct
        );
    }

    println!("\n");

    if let Some((best_name, best_metrics)) = results
        .iter()
        .max_by(|a, b| a.1.total_return_pct.total_cmp(&b.1.total_return_pct))
    {
        println!(
            "🏆 Best Scenario: {} ({:+.2}%)",
            best_name, best_metrics.total_return_pct
        );
    }

    if let Some((worst_name, worst_metrics)) = results
        .iter()
        .min_by(|a, b| a.1.total_return_pct.total_cmp(&b.1.total_return_pct))
    {
        println!(
            "⚠️  Worst Scenario: {} ({:+.2}%)",
            worst_name, worst_metrics.total_return_pct
        );
    }

    let total_trades: usize = results.iter().map(|(_, m)| m.total_trades).sum();
    println!("\n📊 Overall Statistics:");
    println!("   Total Trades Across All Scenarios: {}", total_trades);

    println!("\n═══════════════════════════════════════════════════════\n");
}
