use std::collections::HashMap;

use crate::models::Candle;

use super::{
    CursorCache, EngineError, SeriesKey, SeriesTable, SnapshotSpec, SymbolSnapshot, TickSnapshot,
    TimeframeRegistry,
};

/// How `resolve_closed` locates the last closed candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Stateless O(log n) search, correct for arbitrary timestamp jumps.
    Binary,
    /// Cursor-seeded forward scan, amortized O(1) while timestamps advance.
    /// Falls back to binary search when time moves backward.
    Incremental,
}

/// Resolves which candles are visible at a query timestamp.
///
/// Two questions are answered per series: which candle is the last *closed*
/// one (its whole interval elapsed, so it belongs to history), and which
/// candle is *current* (its interval contains the timestamp, it may still be
/// accumulating). The engine owns a cursor cache keyed by (symbol, timeframe)
/// so that the monotonically advancing timestamps of a normal replay resolve
/// without a fresh search per tick.
#[derive(Debug)]
pub struct CandleEngine {
    table: SeriesTable,
    registry: TimeframeRegistry,
    spec: SnapshotSpec,
    min_timeframe: String,
    min_duration_ms: i64,
    cursors: CursorCache,
}

impl CandleEngine {
    /// Build an engine over a populated series table.
    ///
    /// `min_timeframe` is the finest granularity of the session and marks
    /// "now": current-candle resolution and tick snapshots use it. It must be
    /// registered, as must every field name in `spec` (already guaranteed by
    /// `SnapshotSpec` construction), so misconfiguration fails here, before
    /// the first tick.
    pub fn new(
        table: SeriesTable,
        registry: TimeframeRegistry,
        min_timeframe: &str,
        spec: SnapshotSpec,
    ) -> Result<Self, EngineError> {
        let min_duration_ms = registry.duration_ms(min_timeframe)?;
        Ok(Self {
            table,
            registry,
            spec,
            min_timeframe: min_timeframe.to_string(),
            min_duration_ms,
            cursors: CursorCache::new(),
        })
    }

    pub fn table(&self) -> &SeriesTable {
        &self.table
    }

    pub fn min_timeframe(&self) -> &str {
        &self.min_timeframe
    }

    /// Forget all cursors, e.g. before replaying from the start again.
    pub fn clear_cursors(&mut self) {
        self.cursors.clear();
    }

    /// Index of the last candle whose close time is <= `timestamp`.
    ///
    /// `Ok(None)` when no candle has closed yet or the series is missing or
    /// empty; an unknown timeframe name is a configuration error. Both modes
    /// refresh the cursor with the resolved index (and drop it on a `None`
    /// result), so binary and incremental calls can be interleaved freely.
    pub fn resolve_closed(
        &mut self,
        symbol: &str,
        timeframe: &str,
        timestamp: i64,
        mode: ResolveMode,
    ) -> Result<Option<usize>, EngineError> {
        let duration = self.registry.duration_ms(timeframe)?;
        let key = SeriesKey::new(symbol, timeframe);

        let series = match self.table.series(symbol, timeframe) {
            Some(series) if !series.is_empty() => series,
            _ => return Ok(None),
        };

        let resolved = match mode {
            ResolveMode::Binary => last_closed_index(series, duration, timestamp),
            ResolveMode::Incremental => match self.cursors.get(&key) {
                Some(cursor)
                    if cursor < series.len()
                        && series[cursor].close_time(duration) <= timestamp =>
                {
                    // Normal replay path: time advanced, walk forward from
                    // the cached index to the last closed candle.
                    let mut idx = cursor;
                    while idx + 1 < series.len()
                        && series[idx + 1].close_time(duration) <= timestamp
                    {
                        idx += 1;
                    }
                    Some(idx)
                }
                Some(_) => {
                    tracing::debug!(
                        "cursor for {}/{} is ahead of t={}, falling back to binary search",
                        symbol,
                        timeframe,
                        timestamp
                    );
                    last_closed_index(series, duration, timestamp)
                }
                None => last_closed_index(series, duration, timestamp),
            },
        };

        match resolved {
            Some(idx) => self.cursors.set(key, idx),
            None => self.cursors.reset(&key),
        }

        Ok(resolved)
    }

    /// Historical window ending at (and including) the last closed candle.
    ///
    /// With `limit = Some(n)` the window is the last `n` closed candles,
    /// clipped at the start of the series; with `None` it reaches back to the
    /// start. Empty when nothing has closed yet.
    pub fn history(
        &mut self,
        symbol: &str,
        timeframe: &str,
        timestamp: i64,
        limit: Option<usize>,
        mode: ResolveMode,
    ) -> Result<&[Candle], EngineError> {
        let resolved = self.resolve_closed(symbol, timeframe, timestamp, mode)?;
        let Some(idx) = resolved else {
            return Ok(&[]);
        };
        let Some(series) = self.table.series(symbol, timeframe) else {
            return Ok(&[]);
        };

        let end = idx + 1;
        let start = match limit {
            Some(limit) => end.saturating_sub(limit),
            None => 0,
        };
        Ok(&series[start..end])
    }

    /// Index of the candle containing `timestamp` on the minimum timeframe.
    ///
    /// Containment is inclusive of both interval boundaries. When the
    /// timestamp is exactly the close time of one candle and the open time of
    /// the next, the later candle wins: the tick belongs to the bar that just
    /// opened. That is guaranteed by searching for the rightmost candle with
    /// `open_time <= timestamp` rather than probing intervals pairwise, so it
    /// holds whether or not the series has a gap at the boundary.
    pub fn resolve_current(&self, symbol: &str, timestamp: i64) -> Option<usize> {
        let series = self.table.series(symbol, &self.min_timeframe)?;
        current_index(series, self.min_duration_ms, timestamp)
    }

    /// Fresh snapshot of every symbol's current candle at `timestamp`.
    ///
    /// Symbols without a current candle (gap, exhausted series, or series
    /// missing on the minimum timeframe) are simply absent.
    pub fn snapshot(&self, timestamp: i64) -> TickSnapshot {
        let mut symbols = HashMap::new();
        for symbol in self.table.symbols() {
            let Some(idx) = self.resolve_current(symbol, timestamp) else {
                continue;
            };
            let Some(series) = self.table.series(symbol, &self.min_timeframe) else {
                continue;
            };
            symbols.insert(
                symbol.to_string(),
                SymbolSnapshot::project(&series[idx], &self.spec),
            );
        }
        TickSnapshot::new(timestamp, symbols)
    }
}

/// Rightmost index whose candle has fully closed at `timestamp`, i.e. the
/// last index satisfying `open_time + duration <= timestamp`.
fn last_closed_index(series: &[Candle], duration_ms: i64, timestamp: i64) -> Option<usize> {
    let n = series.partition_point(|c| c.open_time + duration_ms <= timestamp);
    n.checked_sub(1)
}

/// Index of the candle whose `[open_time, open_time + duration]` interval
/// contains `timestamp`, preferring the later candle on exact boundaries.
fn current_index(series: &[Candle], duration_ms: i64, timestamp: i64) -> Option<usize> {
    let n = series.partition_point(|c| c.open_time <= timestamp);
    let idx = n.checked_sub(1)?;
    if timestamp <= series[idx].open_time + duration_ms {
        Some(idx)
    } else {
        None
    }
}
