use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::Candle;

/// Composite key identifying one candle series.
///
/// Structured on purpose: concatenated-string keys can collide
/// ("BTC" + "USDT5m" vs "BTCUSDT" + "5m").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesKey {
    pub symbol: String,
    pub timeframe: String,
}

impl SeriesKey {
    pub fn new(symbol: &str, timeframe: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
        }
    }
}

/// Candle series per symbol and timeframe.
///
/// Append-only during a session; resolution never mutates it. Candles must be
/// pre-sorted ascending by `open_time` with no duplicates (the acquisition
/// layer guarantees this, it is not re-validated per query).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeriesTable {
    series: HashMap<String, HashMap<String, Vec<Candle>>>,
}

impl SeriesTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_series(&mut self, symbol: &str, timeframe: &str, candles: Vec<Candle>) {
        self.series
            .entry(symbol.to_string())
            .or_default()
            .insert(timeframe.to_string(), candles);
    }

    pub fn series(&self, symbol: &str, timeframe: &str) -> Option<&[Candle]> {
        self.series
            .get(symbol)?
            .get(timeframe)
            .map(|candles| candles.as_slice())
    }

    /// Symbols present in the table, sorted for reproducible iteration.
    pub fn symbols(&self) -> Vec<&str> {
        let mut symbols: Vec<&str> = self.series.keys().map(|s| s.as_str()).collect();
        symbols.sort_unstable();
        symbols
    }

    /// Timeframes stored for a symbol, sorted.
    pub fn timeframes(&self, symbol: &str) -> Vec<&str> {
        let mut timeframes: Vec<&str> = self
            .series
            .get(symbol)
            .map(|by_tf| by_tf.keys().map(|t| t.as_str()).collect())
            .unwrap_or_default();
        timeframes.sort_unstable();
        timeframes
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Last resolved index per (symbol, timeframe).
///
/// Owned by the engine instance that maintains it; there is no process-wide
/// cache. `clear` restarts a session after a bulk backward jump in time.
#[derive(Debug, Default)]
pub struct CursorCache {
    cursors: HashMap<SeriesKey, usize>,
}

impl CursorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &SeriesKey) -> Option<usize> {
        self.cursors.get(key).copied()
    }

    pub fn set(&mut self, key: SeriesKey, index: usize) {
        self.cursors.insert(key, index);
    }

    /// Drop the cursor for one series.
    pub fn reset(&mut self, key: &SeriesKey) {
        self.cursors.remove(key);
    }

    pub fn clear(&mut self) {
        self.cursors.clear();
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }
}
