use std::collections::HashMap;
use std::str::FromStr;

use crate::models::Candle;

use super::EngineError;

/// Fields that can be projected out of the current candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandleField {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl CandleField {
    pub fn extract(&self, candle: &Candle) -> f64 {
        match self {
            CandleField::Open => candle.open,
            CandleField::High => candle.high,
            CandleField::Low => candle.low,
            CandleField::Close => candle.close,
            CandleField::Volume => candle.volume,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CandleField::Open => "open",
            CandleField::High => "high",
            CandleField::Low => "low",
            CandleField::Close => "close",
            CandleField::Volume => "volume",
        }
    }
}

impl FromStr for CandleField {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(CandleField::Open),
            "high" => Ok(CandleField::High),
            "low" => Ok(CandleField::Low),
            "close" => Ok(CandleField::Close),
            "volume" => Ok(CandleField::Volume),
            _ => Err(EngineError::UnknownField(s.to_string())),
        }
    }
}

/// Validated set of fields projected into each tick snapshot.
///
/// Field names coming from configuration are checked here, once, at
/// construction. A typo fails the run immediately instead of surfacing as a
/// missing value thousands of ticks in.
#[derive(Debug, Clone)]
pub struct SnapshotSpec {
    fields: Vec<CandleField>,
}

impl SnapshotSpec {
    pub fn new(fields: Vec<CandleField>) -> Self {
        let mut deduped = Vec::new();
        for field in fields {
            if !deduped.contains(&field) {
                deduped.push(field);
            }
        }
        Self { fields: deduped }
    }

    pub fn parse(names: &[&str]) -> Result<Self, EngineError> {
        let fields = names
            .iter()
            .map(|name| name.parse())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(fields))
    }

    /// The minimum the risk evaluator needs: open, high, low.
    pub fn bounds() -> Self {
        Self::new(vec![CandleField::Open, CandleField::High, CandleField::Low])
    }

    pub fn fields(&self) -> &[CandleField] {
        &self.fields
    }
}

impl Default for SnapshotSpec {
    fn default() -> Self {
        Self::bounds()
    }
}

/// Open/high/low of the current candle, the risk evaluator's input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceBounds {
    pub open: f64,
    pub high: f64,
    pub low: f64,
}

/// Projected field values of one symbol's current candle.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolSnapshot {
    values: HashMap<CandleField, f64>,
}

impl SymbolSnapshot {
    pub fn project(candle: &Candle, spec: &SnapshotSpec) -> Self {
        let values = spec
            .fields()
            .iter()
            .map(|field| (*field, field.extract(candle)))
            .collect();
        Self { values }
    }

    pub fn get(&self, field: CandleField) -> Option<f64> {
        self.values.get(&field).copied()
    }

    /// Price bounds, present only when open, high, and low were all projected.
    pub fn bounds(&self) -> Option<PriceBounds> {
        Some(PriceBounds {
            open: self.get(CandleField::Open)?,
            high: self.get(CandleField::High)?,
            low: self.get(CandleField::Low)?,
        })
    }
}

/// Immutable view of the current candle across all symbols at one tick.
///
/// A fresh value is built every tick and handed to the consumer; symbols with
/// no current candle at the tick are absent.
#[derive(Debug, Clone, PartialEq)]
pub struct TickSnapshot {
    time: i64,
    symbols: HashMap<String, SymbolSnapshot>,
}

impl TickSnapshot {
    pub fn new(time: i64, symbols: HashMap<String, SymbolSnapshot>) -> Self {
        Self { time, symbols }
    }

    pub fn time(&self) -> i64 {
        self.time
    }

    pub fn symbol(&self, symbol: &str) -> Option<&SymbolSnapshot> {
        self.symbols.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Open price per symbol, the per-tick entry/exit price map for the ledger.
    pub fn open_prices(&self) -> HashMap<String, f64> {
        self.symbols
            .iter()
            .filter_map(|(symbol, snap)| {
                snap.get(CandleField::Open).map(|open| (symbol.clone(), open))
            })
            .collect()
    }
}
