use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::Candle;

/// Price-path shapes for generated series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketScenario {
    /// Steady climb with small noise (+2% per day equivalent)
    Uptrend,
    /// Steady decline with small noise (-2% per day equivalent)
    Downtrend,
    /// Mean-reverting chop around the base price (±1%)
    Sideways,
    /// Large swings (±5% per bar), floored at half the base price
    Volatile,
    /// Mild drift up for the first half, then a 25% slide
    Crash,
}

/// Deterministic candle generator for tests and the offline demo binary.
pub struct SyntheticDataGenerator {
    rng: StdRng,
    base_price: f64,
    base_volume: f64,
}

impl SyntheticDataGenerator {
    /// Create a generator seeded for reproducibility.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_price: 150.0,
            base_volume: 1_000_000.0,
        }
    }

    pub fn base_price(&self) -> f64 {
        self.base_price
    }

    /// Generate `count` candles spaced `duration_ms` apart starting at
    /// `start_ms`. Open times stay on the timeframe grid as long as
    /// `start_ms` is on it.
    pub fn generate(
        &mut self,
        scenario: MarketScenario,
        count: usize,
        start_ms: i64,
        duration_ms: i64,
    ) -> Vec<Candle> {
        let mut candles = Vec::with_capacity(count);
        let mut price = self.base_price;
        let bars_per_day = (24 * 60 * 60 * 1000) as f64 / duration_ms as f64;

        for i in 0..count {
            let open_time = start_ms + i as i64 * duration_ms;
            price = self.step_price(scenario, price, i, count, bars_per_day);
            candles.push(self.create_candle(price, open_time));
        }
        candles
    }

    /// Next close price along the scenario's path.
    fn step_price(
        &mut self,
        scenario: MarketScenario,
        current: f64,
        i: usize,
        count: usize,
        bars_per_day: f64,
    ) -> f64 {
        match scenario {
            MarketScenario::Uptrend => {
                let drift = current * (0.02 / bars_per_day);
                let noise = current * self.rng.gen_range(-0.001..0.001);
                current + drift + noise
            }
            MarketScenario::Downtrend => {
                let drift = current * (-0.02 / bars_per_day);
                let noise = current * self.rng.gen_range(-0.001..0.001);
                current + drift + noise
            }
            MarketScenario::Sideways => {
                // 10% pull back to the mean each bar keeps the chop bounded
                let reversion = (self.base_price - current) * 0.1;
                let noise = current * self.rng.gen_range(-0.01..0.01);
                current + reversion + noise
            }
            MarketScenario::Volatile => {
                let next = current + current * self.rng.gen_range(-0.05..0.05);
                next.max(self.base_price * 0.5)
            }
            MarketScenario::Crash => {
                if i < count / 2 {
                    current + current * self.rng.gen_range(-0.005..0.01)
                } else {
                    // -25% spread over the second half
                    let drop = current * (-0.25 / (count as f64 / 2.0));
                    let noise = current * self.rng.gen_range(-0.005..0.005);
                    current + drop + noise
                }
            }
        }
    }

    /// Build an OHLCV bar around a close price.
    fn create_candle(&mut self, price: f64, open_time: i64) -> Candle {
        let noise_pct = 0.002; // ±0.2% intrabar movement

        let high = price * (1.0 + self.rng.gen_range(0.0..noise_pct));
        let low = price * (1.0 - self.rng.gen_range(0.0..noise_pct));
        let open = (price * (1.0 + self.rng.gen_range(-noise_pct..noise_pct))).clamp(low, high);
        let volume = self.base_volume * self.rng.gen_range(0.7..1.3);

        Candle {
            open_time,
            open,
            high,
            low,
            close: price,
            volume,
        }
    }
}
