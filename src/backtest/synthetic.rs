use crate::models::Tick;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Midnight UTC, 14 September 2020
pub const DEFAULT_START: i64 = 1_600_041_600;

/// Market scenario types for synthetic data generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketScenario {
    /// Steady uptrend with noise (+2% daily average)
    Uptrend,
    /// Steady downtrend with noise (-2% daily average)
    Downtrend,
    /// Mean-reverting chop around the start price
    Sideways,
    /// Large swings, floored at half the start price
    Volatile,
}

impl MarketScenario {
    pub fn all() -> [MarketScenario; 4] {
        [
            MarketScenario::Uptrend,
            MarketScenario::Downtrend,
            MarketScenario::Sideways,
            MarketScenario::Volatile,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            MarketScenario::Uptrend => "uptrend",
            MarketScenario::Downtrend => "downtrend",
            MarketScenario::Sideways => "sideways",
            MarketScenario::Volatile => "volatile",
        }
    }
}

/// Generates reproducible tick streams for backtesting
pub struct SyntheticDataGenerator {
    rng: StdRng,
    base_price: f64,
}

impl SyntheticDataGenerator {
    /// Create a new generator with a seed for reproducibility
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_price: 150.0,
        }
    }

    /// Generate ticks for a scenario
    ///
    /// # Arguments
    /// * `scenario` - The market scenario to simulate
    /// * `num_ticks` - Number of ticks to generate
    /// * `tick_secs` - Seconds between ticks
    pub fn generate(&mut self, scenario: MarketScenario, num_ticks: usize, tick_secs: i64) -> Vec<Tick> {
        let ticks_per_day = 86_400.0 / tick_secs.max(1) as f64;
        let mut price = self.base_price;
        let mut ticks = Vec::with_capacity(num_ticks);

        for i in 0..num_ticks {
            let step = match scenario {
                MarketScenario::Uptrend => {
                    price * (0.02 / ticks_per_day + self.rng.gen_range(-0.001..0.001))
                }
                MarketScenario::Downtrend => {
                    price * (-0.02 / ticks_per_day + self.rng.gen_range(-0.001..0.001))
                }
                MarketScenario::Sideways => {
                    (self.base_price - price) * 0.1 + price * self.rng.gen_range(-0.01..0.01)
                }
                MarketScenario::Volatile => price * self.rng.gen_range(-0.02..0.02),
            };
            price = (price + step).max(self.base_price * 0.5);

            let timestamp = DEFAULT_START + i as i64 * tick_secs;
            ticks.push(Tick::new(timestamp as f64, price));
        }

        ticks
    }
}
