use clap::Parser;
use futsim::backtest::{BacktestConfig, BacktestRunner};
use futsim::dataset;
use futsim::engine::TimeframeRegistry;
use futsim::strategy::SmaCrossStrategy;
use futsim::Result;
use std::path::PathBuf;

/// Run a futures backtest over a stored JSON dataset.
#[derive(Parser, Debug)]
#[command(name = "futsim", version, about)]
struct Args {
    /// Dataset JSON file produced by fetch_data
    #[arg(long, default_value = "backtest_data.json")]
    dataset: PathBuf,

    /// Symbol whose minimum-timeframe bars drive the tick sequence
    #[arg(long, default_value = "BTCUSDT")]
    symbol: String,

    /// Timeframe the strategy reads
    #[arg(long, default_value = "5m")]
    timeframe: String,

    /// Starting balance; falls back to INITIAL_BALANCE from the environment
    #[arg(long)]
    initial_balance: Option<f64>,

    #[arg(long, default_value_t = 10.0)]
    leverage: f64,

    /// Notional amount per open
    #[arg(long, default_value_t = 1000.0)]
    amount: f64,

    /// Stop distance as a fraction of the entry price (0 disables)
    #[arg(long, default_value_t = 0.02)]
    stop_loss: f64,

    /// Take-profit distance as a fraction of the entry price (0 disables)
    #[arg(long, default_value_t = 0.04)]
    take_profit: f64,

    /// Trade-log path; default auto-numbers under profit_record/
    #[arg(long)]
    record: Option<PathBuf>,

    /// Fast SMA window of the demo strategy
    #[arg(long, default_value_t = 5)]
    fast: usize,

    /// Slow SMA window of the demo strategy
    #[arg(long, default_value_t = 20)]
    slow: usize,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let args = Args::parse();

    let table = dataset::load_dataset(&args.dataset)?;
    tracing::info!(
        "Loaded dataset {} ({} symbols)",
        args.dataset.display(),
        table.symbols().len()
    );

    let mut config = BacktestConfig::new(&args.symbol);
    config.strategy_timeframe = args.timeframe.clone();
    config.initial_balance = args.initial_balance.unwrap_or_else(initial_balance_from_env);
    config.leverage = args.leverage;
    config.amount = args.amount;
    config.stop_loss_frac = (args.stop_loss > 0.0).then_some(args.stop_loss);
    config.take_profit_frac = (args.take_profit > 0.0).then_some(args.take_profit);
    config.record_path = args.record.clone();

    let strategy = SmaCrossStrategy::new(args.fast, args.slow);
    let runner = BacktestRunner::new(config);
    let label = format!("{} from {}", args.symbol, args.dataset.display());

    runner.run_and_report(table, TimeframeRegistry::standard(), &strategy, &label)?;

    Ok(())
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter("futsim=info")
        .init();
}

fn initial_balance_from_env() -> f64 {
    std::env::var("INITIAL_BALANCE")
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(10_000.0)
}
