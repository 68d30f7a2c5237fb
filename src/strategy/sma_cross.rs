use super::Strategy;
use crate::models::{Candle, Signal};
use crate::Result;

/// Simple moving average over the most recent `period` prices.
fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }
    let sum: f64 = prices.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// SMA crossover demo strategy.
///
/// Buy when the fast average crosses above the slow one between the
/// previous and the latest candle, Sell on the opposite cross, Hold
/// otherwise.
#[derive(Debug, Clone)]
pub struct SmaCrossStrategy {
    fast_period: usize,
    slow_period: usize,
}

impl SmaCrossStrategy {
    pub fn new(fast_period: usize, slow_period: usize) -> Self {
        Self {
            fast_period,
            slow_period,
        }
    }
}

impl Default for SmaCrossStrategy {
    fn default() -> Self {
        Self::new(5, 20)
    }
}

impl Strategy for SmaCrossStrategy {
    fn generate_signal(&self, candles: &[Candle]) -> Result<Signal> {
        if candles.len() < self.min_candles_required() {
            return Err(format!(
                "Insufficient data: {} candles, need {}",
                candles.len(),
                self.min_candles_required()
            )
            .into());
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let previous = &closes[..closes.len() - 1];

        let fast_now = calculate_sma(&closes, self.fast_period)
            .ok_or("not enough closes for the fast average")?;
        let slow_now = calculate_sma(&closes, self.slow_period)
            .ok_or("not enough closes for the slow average")?;
        let fast_prev = calculate_sma(previous, self.fast_period)
            .ok_or("not enough closes for the fast average")?;
        let slow_prev = calculate_sma(previous, self.slow_period)
            .ok_or("not enough closes for the slow average")?;

        let signal = if fast_prev <= slow_prev && fast_now > slow_now {
            Signal::Buy
        } else if fast_prev >= slow_prev && fast_now < slow_now {
            Signal::Sell
        } else {
            Signal::Hold
        };
        Ok(signal)
    }

    fn name(&self) -> &str {
        "SmaCrossStrategy"
    }

    fn min_candles_required(&self) -> usize {
        // One candle beyond the slow window so a previous average exists
        self.slow_period + 1
    }
}
