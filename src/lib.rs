// Core modules
pub mod api;
pub mod backtest;
pub mod dataset;
pub mod engine;
pub mod ledger;
pub mod models;
pub mod risk;
pub mod strategy;

// Re-export commonly used types
pub use engine::{CandleEngine, ResolveMode, SeriesTable, TimeframeRegistry};
pub use ledger::PositionLedger;
pub use models::*;
pub use strategy::Strategy;

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
