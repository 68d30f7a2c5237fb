// Risk management module
pub mod evaluator;

pub use evaluator::RiskEvaluator;
