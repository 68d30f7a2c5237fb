// Candle index engine: timestamp-to-candle resolution with cursor caching.
pub mod resolver;
pub mod series;
pub mod snapshot;
pub mod timeframe;

pub use resolver::{CandleEngine, ResolveMode};
pub use series::{CursorCache, SeriesKey, SeriesTable};
pub use snapshot::{CandleField, PriceBounds, SnapshotSpec, SymbolSnapshot, TickSnapshot};
pub use timeframe::TimeframeRegistry;

use thiserror::Error;

/// Configuration errors raised at construction or first use.
///
/// These abort a run. Data gaps (missing series, nothing closed yet) are not
/// errors; they resolve to empty results so a multi-symbol session keeps
/// going.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("unknown timeframe '{0}'")]
    UnknownTimeframe(String),
    #[error("unknown candle field '{0}'")]
    UnknownField(String),
}
