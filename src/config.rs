use crate::execution::OrderLimits;
use crate::indicators::{IndicatorSettings, DEFAULT_SMMA_WINDOWS, DEFAULT_WINDOW, EMA_SPANS};
use crate::strategy::AverageKind;
use crate::{BotError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix of environment overrides, e.g. `CROSSBOT__ORDERS__POSITION_LIMIT=100`
pub const ENV_PREFIX: &str = "CROSSBOT";

/// Which indicator families a session computes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Bollinger bands and EMAs
    #[default]
    Intraday,
    /// Smoothed averages on daily bars
    LongTerm,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossoverConfig {
    pub low: u32,
    pub high: u32,
    pub average: AverageKind,
}

impl Default for CrossoverConfig {
    fn default() -> Self {
        Self {
            low: 5,
            high: 40,
            average: AverageKind::Ema,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderConfig {
    /// Maximum fiat value of one order, 0 for no limit
    pub position_limit: f64,
    pub sizing_fee: f64,
    pub settlement_fee: f64,
}

impl Default for OrderConfig {
    fn default() -> Self {
        let limits = OrderLimits::default();
        Self {
            position_limit: 0.0,
            sizing_fee: limits.sizing_fee,
            settlement_fee: limits.settlement_fee,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceConfig {
    /// Fiat needed to lean towards buying when no price is known
    pub min_fiat_for_buy: f64,
    /// Cap of the fiat a simulated session may trade with
    pub fiat_allowance_cap: f64,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            min_fiat_for_buy: 10.0,
            fiat_allowance_cap: 50.0,
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub asset: String,
    pub fiat: String,
    pub interval_minutes: u32,
    pub profile: Profile,
    /// Bollinger window
    pub window: usize,
    pub ema_spans: Vec<u32>,
    pub smma_windows: Vec<usize>,
    pub crossover: CrossoverConfig,
    pub orders: OrderConfig,
    pub balances: BalanceConfig,
    /// CSV file receiving one row per fill
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_path: Option<PathBuf>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            asset: "ETH".to_string(),
            fiat: "USD".to_string(),
            interval_minutes: 15,
            profile: Profile::Intraday,
            window: DEFAULT_WINDOW,
            ema_spans: EMA_SPANS.to_vec(),
            smma_windows: DEFAULT_SMMA_WINDOWS.to_vec(),
            crossover: CrossoverConfig::default(),
            orders: OrderConfig::default(),
            balances: BalanceConfig::default(),
            report_path: None,
        }
    }
}

impl BotConfig {
    /// Defaults, then the TOML file when given, then `CROSSBOT__*` variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, Self::environment())
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("ema_spans")
            .with_list_parse_key("smma_windows")
    }

    fn load_with(path: Option<&Path>, environment: config::Environment) -> Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let config: Self = builder.add_source(environment).build()?.try_deserialize()?;
        config.validate()?;

        tracing::debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    /// Reject settings no session can run with
    pub fn validate(&self) -> Result<()> {
        let fail = |message: String| Err(BotError::Configuration(message));

        if self.asset.trim().is_empty() || self.fiat.trim().is_empty() {
            return fail("Asset and fiat codes must not be empty".to_string());
        }
        if self.interval_minutes == 0 {
            return fail("interval_minutes must be positive".to_string());
        }
        if self.window < 2 {
            return fail(format!("window must be at least 2, got {}", self.window));
        }
        if let Some(span) = self.ema_spans.iter().find(|span| !EMA_SPANS.contains(span)) {
            return fail(format!("EMA span {} is not one of {:?}", span, EMA_SPANS));
        }
        if self.smma_windows.contains(&0) {
            return fail("SMMA windows must be positive".to_string());
        }

        let CrossoverConfig { low, high, average } = self.crossover;
        let computed = match (self.profile, average) {
            (Profile::Intraday, AverageKind::Ema) => self.ema_spans.contains(&low) && self.ema_spans.contains(&high),
            (Profile::LongTerm, AverageKind::Smma) => {
                self.smma_windows.contains(&(low as usize)) && self.smma_windows.contains(&(high as usize))
            }
            _ => false,
        };
        if !computed {
            return fail(format!(
                "Crossover {:?} {}/{} is not computed by the {:?} profile",
                average, low, high, self.profile
            ));
        }
        if low >= high {
            return fail(format!("Crossover needs low < high, got {} and {}", low, high));
        }

        for (name, fee) in [
            ("sizing_fee", self.orders.sizing_fee),
            ("settlement_fee", self.orders.settlement_fee),
        ] {
            if !(0.0..1.0).contains(&fee) {
                return fail(format!("{} must be in [0, 1), got {}", name, fee));
            }
        }
        if !(self.orders.position_limit >= 0.0) {
            return fail(format!(
                "position_limit must not be negative, got {}",
                self.orders.position_limit
            ));
        }
        if !(self.balances.min_fiat_for_buy >= 0.0) || !(self.balances.fiat_allowance_cap > 0.0) {
            return fail("Balance thresholds must be positive".to_string());
        }

        Ok(())
    }

    pub fn indicator_settings(&self) -> IndicatorSettings {
        match self.profile {
            Profile::Intraday => IndicatorSettings::intraday(self.window, self.ema_spans.clone()),
            Profile::LongTerm => IndicatorSettings::long_term(self.smma_windows.clone()),
        }
    }

    pub fn order_limits(&self) -> OrderLimits {
        OrderLimits {
            position_limit: (self.orders.position_limit > 0.0).then_some(self.orders.position_limit),
            sizing_fee: self.orders.sizing_fee,
            settlement_fee: self.orders.settlement_fee,
        }
    }
}
