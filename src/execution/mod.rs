// Position tracking and order execution
pub mod executor;
pub mod position_tracker;

pub use executor::{ExecutionMode, OrderExecutor, OrderLimits, SETTLEMENT_FEE, SIZING_FEE};
pub use position_tracker::{FiatAllowance, PositionTracker, DEFAULT_MIN_FIAT_FOR_BUY};
