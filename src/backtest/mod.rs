// Day-by-day and synthetic replays of the crossover session
pub mod metrics;
pub mod runner;
pub mod synthetic;

pub use metrics::{percent_change, print_day_results, BacktestMetrics};
pub use runner::{split_into_days, write_results, BacktestRunner, BacktestSettings, DayData, DayResult};
pub use synthetic::{MarketScenario, SyntheticDataGenerator};
