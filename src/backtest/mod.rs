pub mod report;
pub mod runner;
pub mod synthetic;

pub use report::BacktestReport;
pub use runner::{BacktestConfig, BacktestOutcome, BacktestRunner};
pub use synthetic::{MarketScenario, SyntheticDataGenerator};
