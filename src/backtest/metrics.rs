use super::runner::DayResult;
use crate::models::{FillRecord, TradeSide};
use serde::{Deserialize, Serialize};

/// Performance of one continuous replay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestMetrics {
    pub initial_value: f64,
    pub final_value: f64,
    pub total_return_pct: f64,
    /// Return of holding the starting balances unchanged
    pub hold_return_pct: f64,
    pub first_price: f64,
    pub last_price: f64,

    pub total_trades: usize,
    pub buys: usize,
    pub sells: usize,

    pub max_drawdown: f64,
    pub max_drawdown_pct: f64,

    pub fills: Vec<FillRecord>,
}

impl BacktestMetrics {
    /// Build metrics from the portfolio value after every tick
    ///
    /// # Arguments
    /// * `initial_value` - Portfolio value at the first replayed price
    /// * `hold_value` - Value of the starting balances at the last price
    /// * `equity` - Portfolio value after each replayed tick
    pub fn from_equity(
        initial_value: f64,
        hold_value: f64,
        equity: &[f64],
        fills: Vec<FillRecord>,
        first_price: f64,
        last_price: f64,
    ) -> Self {
        let final_value = equity.last().copied().unwrap_or(initial_value);
        let (max_drawdown, max_drawdown_pct) = Self::calculate_drawdown(equity, initial_value);
        let buys = fills.iter().filter(|f| f.side == TradeSide::Buy).count();

        Self {
            initial_value,
            final_value,
            total_return_pct: percent_change(initial_value, final_value),
            hold_return_pct: percent_change(initial_value, hold_value),
            first_price,
            last_price,
            total_trades: fills.len(),
            buys,
            sells: fills.len() - buys,
            max_drawdown,
            max_drawdown_pct,
            fills,
        }
    }

    /// Largest peak-to-trough fall, absolute and in percent of the peak
    fn calculate_drawdown(equity: &[f64], initial_value: f64) -> (f64, f64) {
        let mut peak = initial_value;
        let mut max_dd = 0.0;
        let mut max_dd_pct = 0.0;

        for &value in equity {
            if value > peak {
                peak = value;
            }
            let dd = peak - value;
            if dd > max_dd {
                max_dd = dd;
                max_dd_pct = if peak > 0.0 { dd / peak * 100.0 } else { 0.0 };
            }
        }

        (max_dd, max_dd_pct)
    }

    /// Print a formatted report to stdout
    pub fn print_report(&self) {
        println!("\n=== BACKTEST PERFORMANCE REPORT ===\n");

        println!("📊 P&L SUMMARY");
        println!("  Initial Portfolio:     ${:.2}", self.initial_value);
        println!("  Final Portfolio:       ${:.2}", self.final_value);
        println!("  Return:                {:+.2}%", self.total_return_pct);
        println!("  Holding Return:        {:+.2}%", self.hold_return_pct);
        println!(
            "  Price:                 {:.2} -> {:.2}",
            self.first_price, self.last_price
        );

        println!("\n📈 TRADE STATISTICS");
        println!("  Total Trades:          {}", self.total_trades);
        println!("  Buys / Sells:          {} / {}", self.buys, self.sells);

        println!("\n⚠️  RISK METRICS");
        println!(
            "  Max Drawdown:          ${:.2} ({:.2}%)",
            self.max_drawdown, self.max_drawdown_pct
        );
        println!();
    }
}

/// `(to / from - 1) * 100`, 0 when `from` is not positive
pub fn percent_change(from: f64, to: f64) -> f64 {
    if from > 0.0 {
        (to / from - 1.0) * 100.0
    } else {
        0.0
    }
}

/// Print day-by-day results with their averages
pub fn print_day_results(results: &[DayResult]) {
    println!(
        "{:<12} {:>12} {:>10} {:>10} {:>10} {:>9} {:>9}",
        "Date", "Crypto", "Fiat", "Open", "Close", "Overall%", "Bot%"
    );
    for day in results {
        println!(
            "{:<12} {:>12.6} {:>10.2} {:>10.2} {:>10.2} {:>+9.2} {:>+9.2}",
            day.label(),
            day.crypto,
            day.fiat,
            day.opening_price,
            day.close_price,
            day.overall_benefit,
            day.bot_benefit
        );
    }

    if !results.is_empty() {
        let n = results.len() as f64;
        let overall = results.iter().map(|d| d.overall_benefit).sum::<f64>() / n;
        let bot = results.iter().map(|d| d.bot_benefit).sum::<f64>() / n;
        println!("\n{} days, average overall {:+.2}%, bot {:+.2}%", results.len(), overall, bot);
    }
}
