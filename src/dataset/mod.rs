use std::path::Path;

use anyhow::{Context, Result};

use crate::api::BinanceFuturesClient;
use crate::engine::SeriesTable;

/// Timeframes fetched for every symbol, finest first.
pub const DATASET_TIMEFRAMES: [&str; 5] = ["5m", "15m", "1h", "4h", "1d"];

/// Bars of the finest timeframe fetched by default.
pub const DEFAULT_LIMIT: usize = 10_000;
/// Extra bars on the coarser timeframes so indicators have history at the
/// start of the 5m range.
pub const DEFAULT_BUFFER: usize = 1_000;

/// Bars of `timeframe` covering `limit` 5m bars, plus warm-up buffer.
fn scaled_limit(timeframe: &str, limit: usize, buffer: usize) -> usize {
    match timeframe {
        "15m" => limit / 3 + buffer + 5,
        "1h" => limit / 12 + buffer + 5,
        "4h" => limit / 48 + buffer + 5,
        "1d" => limit / 288 + buffer + 5,
        _ => limit,
    }
}

/// Fetch one symbol's multi-timeframe dataset into `table`.
///
/// The finest timeframe gets `limit` bars; coarser ones proportionally fewer
/// plus `buffer` bars so their history reaches back past the start of the 5m
/// range.
pub async fn fetch_symbol(
    client: &BinanceFuturesClient,
    table: &mut SeriesTable,
    symbol: &str,
    limit: usize,
    buffer: usize,
) -> Result<()> {
    for timeframe in DATASET_TIMEFRAMES {
        let want = scaled_limit(timeframe, limit, buffer);
        let candles = client
            .get_historical_klines(symbol, timeframe, want)
            .await
            .with_context(|| format!("fetching {} {}", symbol, timeframe))?;
        table.insert_series(symbol, timeframe, candles);
    }
    Ok(())
}

/// Write a dataset to a pretty-printed JSON file, creating parent directories.
pub fn save_dataset(table: &SeriesTable, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }

    let content = serde_json::to_string_pretty(table).context("serializing dataset")?;
    std::fs::write(path, content)
        .with_context(|| format!("writing dataset to {}", path.display()))?;

    tracing::info!("Saved dataset to {}", path.display());
    Ok(())
}

/// Load a dataset written by [`save_dataset`].
pub fn load_dataset(path: impl AsRef<Path>) -> Result<SeriesTable> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading dataset from {}", path.display()))?;
    serde_json::from_str(&content).context("parsing dataset JSON")
}
