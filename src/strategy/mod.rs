// Trading strategy module
pub mod sma_cross;

pub use sma_cross::SmaCrossStrategy;

use crate::models::{Candle, Signal};
use crate::Result;

/// Base trait for all trading strategies
pub trait Strategy: Send + Sync {
    /// Generate a trading signal from a window of closed candles, oldest
    /// first. Fewer candles than `min_candles_required` is an error.
    fn generate_signal(&self, candles: &[Candle]) -> Result<Signal>;

    /// Strategy name for logs and reports
    fn name(&self) -> &str;

    /// Minimum candles required before a signal can be generated
    fn min_candles_required(&self) -> usize;
}
