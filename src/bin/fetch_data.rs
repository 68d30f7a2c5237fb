use clap::Parser;
use futsim::api::BinanceFuturesClient;
use futsim::dataset::{self, DEFAULT_BUFFER, DEFAULT_LIMIT};
use futsim::engine::SeriesTable;
use futsim::Result;
use std::path::PathBuf;

/// Fetch multi-timeframe futures klines into a dataset file.
#[derive(Parser, Debug)]
#[command(name = "fetch_data", version, about)]
struct Args {
    /// Symbols to fetch, comma separated
    #[arg(long, default_value = "BTCUSDT", value_delimiter = ',')]
    symbols: Vec<String>,

    /// 5m bars per symbol; coarser timeframes scale down from this
    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    limit: usize,

    /// Warm-up bars added to the coarser timeframes
    #[arg(long, default_value_t = DEFAULT_BUFFER)]
    buffer: usize,

    /// Where to write the dataset
    #[arg(long, default_value = "backtest_data.json")]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter("futsim=info")
        .init();

    let args = Args::parse();

    let client = BinanceFuturesClient::new()?;
    let mut table = SeriesTable::new();

    for symbol in &args.symbols {
        tracing::info!("📥 Fetching {} ({} 5m bars)...", symbol, args.limit);
        dataset::fetch_symbol(&client, &mut table, symbol, args.limit, args.buffer).await?;
    }

    dataset::save_dataset(&table, &args.output)?;
    println!("Dataset written to {}", args.output.display());

    Ok(())
}
