use futsim::backtest::{
    BacktestConfig, BacktestReport, BacktestRunner, MarketScenario, SyntheticDataGenerator,
};
use futsim::engine::{CandleEngine, ResolveMode, SeriesTable, SnapshotSpec, TimeframeRegistry};
use futsim::ledger::trade_log::read_trades;
use futsim::models::Candle;
use futsim::strategy::SmaCrossStrategy;
use std::time::{SystemTime, UNIX_EPOCH};

const FIVE_MIN_MS: i64 = 300_000;
const FIFTEEN_MIN_MS: i64 = 900_000;
const START_MS: i64 = 1_700_000_100_000;

fn candle(open_time: i64, open: f64, high: f64, low: f64, close: f64) -> Candle {
    Candle {
        open_time,
        open,
        high,
        low,
        close,
        volume: 1_000.0,
    }
}

fn tmp_record(tag: &str) -> std::path::PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("futsim_e2e_{}_{}.csv", tag, nanos))
}

#[test]
fn test_engine_resolution_workflow() {
    let _ = tracing_subscriber::fmt::try_init();

    println!("=== Starting Engine Resolution E2E ===\n");

    // 1. Two 5m bars back to back
    println!("1. Building the series...");
    let mut table = SeriesTable::new();
    table.insert_series(
        "BTCUSDT",
        "5m",
        vec![
            candle(0, 100.0, 105.0, 95.0, 102.0),
            candle(300_000, 102.0, 110.0, 98.0, 108.0),
        ],
    );
    let mut engine = CandleEngine::new(
        table,
        TimeframeRegistry::standard(),
        "5m",
        SnapshotSpec::bounds(),
    )
    .unwrap();
    println!("   ✓ 2 bars on BTCUSDT/5m");

    // 2. At the first close time: first bar closed, second bar current
    println!("\n2. Resolving t=300000...");
    let closed = engine
        .resolve_closed("BTCUSDT", "5m", 300_000, ResolveMode::Binary)
        .unwrap();
    assert_eq!(closed, Some(0), "bar 0 closes exactly at t=300000");

    let current = engine.resolve_current("BTCUSDT", 300_000);
    assert_eq!(current, Some(1), "bar 1 opens exactly at t=300000");
    println!("   ✓ closed index 0, current index 1");

    // 3. Both modes agree on an out-of-order query sequence
    println!("\n3. Checking mode parity on out-of-order queries...");
    let timestamps = [600_000, 0, 300_000, 150_000, 599_999, 300_001, 600_000];
    for &t in &timestamps {
        let binary = engine
            .resolve_closed("BTCUSDT", "5m", t, ResolveMode::Binary)
            .unwrap();
        let incremental = engine
            .resolve_closed("BTCUSDT", "5m", t, ResolveMode::Incremental)
            .unwrap();
        assert_eq!(binary, incremental, "modes disagree at t={}", t);
    }
    println!(
        "   ✓ binary and incremental agree on {} timestamps",
        timestamps.len()
    );

    // 4. Snapshot carries the current bar's bounds
    println!("\n4. Snapshotting t=300000...");
    let snapshot = engine.snapshot(300_000);
    let bounds = snapshot.symbol("BTCUSDT").unwrap().bounds().unwrap();
    assert_eq!(bounds.open, 102.0);
    assert_eq!(bounds.high, 110.0);
    assert_eq!(bounds.low, 98.0);
    println!(
        "   ✓ open {} high {} low {}",
        bounds.open, bounds.high, bounds.low
    );

    // 5. History window ends at the last closed bar
    println!("\n5. Pulling history at t=600000...");
    let window = engine
        .history("BTCUSDT", "5m", 600_000, Some(10), ResolveMode::Incremental)
        .unwrap();
    assert_eq!(window.len(), 2);
    assert_eq!(window[1].close, 108.0);
    println!("   ✓ window of {} closed bars", window.len());

    println!("\n=== Engine Resolution E2E Complete ✅ ===");
}

#[test]
fn test_full_backtest_workflow() {
    let _ = tracing_subscriber::fmt::try_init();

    println!("=== Starting Full Backtest E2E ===\n");

    // 1. Synthetic sideways market
    println!("1. Generating synthetic data...");
    let mut generator = SyntheticDataGenerator::new(42);
    let candles = generator.generate(MarketScenario::Sideways, 500, START_MS, FIVE_MIN_MS);
    assert_eq!(candles.len(), 500);
    println!(
        "   ✓ {} 5m bars, first open ${:.2}",
        candles.len(),
        candles[0].open
    );

    // 2. Dataset
    println!("\n2. Building the series table...");
    let mut table = SeriesTable::new();
    table.insert_series("SYNTH", "5m", candles);

    // 3. Backtest with the demo strategy
    println!("\n3. Running the backtest...");
    let record = tmp_record("full");
    let mut config = BacktestConfig::new("SYNTH");
    config.record_path = Some(record.clone());
    let initial_balance = config.initial_balance;

    let runner = BacktestRunner::new(config);
    let outcome = runner
        .run(
            table,
            TimeframeRegistry::standard(),
            &SmaCrossStrategy::default(),
        )
        .unwrap();

    println!(
        "   ✓ {} trades, final balance ${:.2}",
        outcome.report.total_trades, outcome.final_balance
    );
    assert!(outcome.report.total_trades > 0, "sideways chop should trade");

    // 4. Ledger and report agree
    println!("\n4. Reconciling balances...");
    let expected = initial_balance + outcome.report.total_profit;
    assert!(
        (outcome.final_balance - expected).abs() < 1e-6,
        "final balance {} vs initial + pnl {}",
        outcome.final_balance,
        expected
    );
    println!("   ✓ final = initial + total pnl");

    // 5. The CSV reloads into the identical trade list
    println!("\n5. Reloading the trade log...");
    let reloaded = read_trades(&record).unwrap();
    assert_eq!(reloaded, outcome.trades);

    let rebuilt = BacktestReport::from_trades(&reloaded);
    assert_eq!(rebuilt.total_trades, outcome.report.total_trades);
    assert!((rebuilt.total_profit - outcome.report.total_profit).abs() < 1e-9);
    assert_eq!(rebuilt.max_daily_trades, outcome.report.max_daily_trades);
    println!("   ✓ {} rows reload identically", reloaded.len());

    std::fs::remove_file(&record).ok();

    println!("\n=== Full Backtest E2E Complete ✅ ===");
}

#[test]
fn test_multi_timeframe_workflow() {
    let _ = tracing_subscriber::fmt::try_init();

    println!("=== Starting Multi-Timeframe E2E ===\n");

    // 1. 5m bars drive the ticks, 15m bars feed the strategy
    println!("1. Generating two timeframes...");
    let mut fine = SyntheticDataGenerator::new(7);
    let mut coarse = SyntheticDataGenerator::new(7);

    let mut table = SeriesTable::new();
    table.insert_series(
        "SYNTH",
        "5m",
        fine.generate(MarketScenario::Sideways, 510, START_MS, FIVE_MIN_MS),
    );
    table.insert_series(
        "SYNTH",
        "15m",
        coarse.generate(MarketScenario::Sideways, 170, START_MS, FIFTEEN_MIN_MS),
    );
    println!("   ✓ 510 5m bars, 170 15m bars");

    // 2. Run with the strategy reading the coarse frame
    println!("\n2. Running with a 15m strategy window...");
    let record = tmp_record("mtf");
    let mut config = BacktestConfig::new("SYNTH");
    config.strategy_timeframe = "15m".to_string();
    config.record_path = Some(record.clone());
    let initial_balance = config.initial_balance;

    let runner = BacktestRunner::new(config);
    let outcome = runner
        .run(
            table,
            TimeframeRegistry::standard(),
            &SmaCrossStrategy::default(),
        )
        .unwrap();
    println!(
        "   ✓ {} trades, final balance ${:.2}",
        outcome.report.total_trades, outcome.final_balance
    );

    // 3. Entries only ever happen on 5m tick boundaries
    println!("\n3. Verifying tick alignment and balances...");
    for trade in &outcome.trades {
        assert_eq!(
            trade.entry_time % FIVE_MIN_MS,
            0,
            "entry off the tick grid: {}",
            trade.entry_time
        );
    }
    let expected = initial_balance + outcome.report.total_profit;
    assert!((outcome.final_balance - expected).abs() < 1e-6);
    println!("   ✓ all entries on the 5m grid, balances reconcile");

    std::fs::remove_file(&record).ok();

    println!("\n=== Multi-Timeframe E2E Complete ✅ ===");
}
