use clap::Parser;
use futsim::backtest::BacktestReport;
use futsim::ledger::trade_log::{latest_record_path, read_trades, DEFAULT_RECORD_DIR};
use futsim::Result;
use std::path::PathBuf;

/// Summarize a recorded trade log.
#[derive(Parser, Debug)]
#[command(name = "report", version, about)]
struct Args {
    /// Trade-log CSV; default is the latest profits_N.csv under profit_record/
    #[arg(long)]
    path: Option<PathBuf>,

    /// Directory scanned when --path is not given
    #[arg(long, default_value = DEFAULT_RECORD_DIR)]
    dir: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("futsim=info")
        .init();

    let args = Args::parse();

    let path = match args.path {
        Some(path) => path,
        None => latest_record_path(&args.dir)
            .ok_or_else(|| format!("no trade logs under {}", args.dir.display()))?,
    };

    println!("📄 Reading {}", path.display());
    let trades = read_trades(&path)?;
    println!("   {} closed trades", trades.len());

    BacktestReport::from_trades(&trades).print_report();

    Ok(())
}
