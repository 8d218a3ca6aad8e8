// Core modules
pub mod api;
pub mod backfill;
pub mod backtest;
pub mod config;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod persistence;
pub mod series;
pub mod session;
pub mod strategy;

// Re-export commonly used types
pub use error::{BotError, Result};
pub use models::*;
pub use series::BarSeries;
pub use session::TradingSession;
pub use strategy::Strategy;
