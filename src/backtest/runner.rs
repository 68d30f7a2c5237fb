use std::path::PathBuf;

use crate::backtest::report::BacktestReport;
use crate::engine::{CandleEngine, ResolveMode, SeriesTable, SnapshotSpec, TimeframeRegistry};
use crate::ledger::{trade_log, ClosedTrade, OpenOutcome, PositionLedger, TradeLog};
use crate::models::{ExitReason, Side, Signal};
use crate::risk::RiskEvaluator;
use crate::strategy::Strategy;
use crate::Result;

/// Knobs for a simulation run.
#[derive(Debug, Clone)]
pub struct BacktestConfig {
    /// Symbol whose minimum-timeframe bars define the tick sequence.
    pub driver_symbol: String,
    /// Finest timeframe of the dataset; one tick per bar of it.
    pub min_timeframe: String,
    /// Timeframe whose closed candles feed the strategy.
    pub strategy_timeframe: String,
    pub initial_balance: f64,
    pub leverage: f64,
    /// Notional amount per open (margin * leverage).
    pub amount: f64,
    /// Stop distance as a fraction of the entry price, None for no stop.
    pub stop_loss_frac: Option<f64>,
    /// Take-profit distance as a fraction of the entry price.
    pub take_profit_frac: Option<f64>,
    pub resolve_mode: ResolveMode,
    /// Directory for auto-numbered trade logs.
    pub record_dir: PathBuf,
    /// Explicit trade-log path; overrides `record_dir` numbering.
    pub record_path: Option<PathBuf>,
}

impl BacktestConfig {
    pub fn new(driver_symbol: &str) -> Self {
        Self {
            driver_symbol: driver_symbol.to_string(),
            min_timeframe: "5m".to_string(),
            strategy_timeframe: "5m".to_string(),
            initial_balance: 10_000.0,
            leverage: 10.0,
            amount: 1000.0,
            stop_loss_frac: Some(0.02),
            take_profit_frac: Some(0.04),
            resolve_mode: ResolveMode::Incremental,
            record_dir: PathBuf::from(trade_log::DEFAULT_RECORD_DIR),
            record_path: None,
        }
    }
}

/// What a finished run produced.
#[derive(Debug)]
pub struct BacktestOutcome {
    pub report: BacktestReport,
    /// Every closed trade, in close order.
    pub trades: Vec<ClosedTrade>,
    pub final_balance: f64,
    /// Where the CSV went, when at least one trade was recorded.
    pub record_path: Option<PathBuf>,
}

/// Drives a full simulation: ticks from the driver symbol's bars, risk
/// checks, strategy signals, ledger opens, and the trade log.
pub struct BacktestRunner {
    config: BacktestConfig,
}

impl BacktestRunner {
    pub fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    /// Run a backtest over `table` with the given strategy.
    ///
    /// Per tick: snapshot, ledger tick update, risk scan, then one strategy
    /// signal once enough candles have closed. Buy opens a LONG and Sell a
    /// SHORT sized from the config; rejected opens are logged and skipped.
    /// Whatever is still open at the end settles manually at the last
    /// tick's price.
    pub fn run<S: Strategy>(
        &self,
        table: SeriesTable,
        registry: TimeframeRegistry,
        strategy: &S,
    ) -> Result<BacktestOutcome> {
        let cfg = &self.config;
        let mut engine =
            CandleEngine::new(table, registry, &cfg.min_timeframe, SnapshotSpec::bounds())?;

        let ticks: Vec<i64> = match engine.table().series(&cfg.driver_symbol, &cfg.min_timeframe)
        {
            Some(series) if !series.is_empty() => {
                series.iter().map(|c| c.open_time).collect()
            }
            _ => {
                return Err(format!(
                    "no {} series for driver symbol {}",
                    cfg.min_timeframe, cfg.driver_symbol
                )
                .into())
            }
        };

        let min_candles = strategy.min_candles_required();
        tracing::info!(
            "Starting backtest: {} ticks on {}/{}, strategy {} needs {} candles",
            ticks.len(),
            cfg.driver_symbol,
            cfg.min_timeframe,
            strategy.name(),
            min_candles
        );

        let mut ledger = PositionLedger::new(cfg.initial_balance);
        let evaluator = RiskEvaluator::new();
        let mut log = self.open_log()?;
        let mut recorded = 0usize;

        for &tick in &ticks {
            let snapshot = engine.snapshot(tick);
            ledger.apply_tick(tick, snapshot.open_prices());

            let closed = evaluator.check_exits(&mut ledger, &snapshot)?;
            if !closed.is_empty() {
                log.append_all(&closed)?;
                recorded += closed.len();
            }

            let window = engine.history(
                &cfg.driver_symbol,
                &cfg.strategy_timeframe,
                tick,
                Some(min_candles),
                cfg.resolve_mode,
            )?;
            if window.len() < min_candles {
                continue;
            }

            let signal = match strategy.generate_signal(window) {
                Ok(signal) => signal,
                Err(e) => {
                    tracing::warn!("Signal generation failed at t={}: {}", tick, e);
                    continue;
                }
            };
            let side = match signal {
                Signal::Buy => Side::Long,
                Signal::Sell => Side::Short,
                Signal::Hold => continue,
            };
            self.open_position(&mut ledger, side)?;
        }

        // Whatever survived the last tick settles at its open price
        let leftovers = ledger.close_all(ExitReason::Manual)?;
        if !leftovers.is_empty() {
            log.append_all(&leftovers)?;
            recorded += leftovers.len();
        }

        let trades = ledger.closed_trades().to_vec();
        let report = BacktestReport::from_trades(&trades);
        let final_balance = ledger.balance();

        tracing::info!(
            "Backtest complete: {} trades, total pnl {:.2}, final balance {:.2}",
            report.total_trades,
            report.total_profit,
            final_balance
        );

        Ok(BacktestOutcome {
            report,
            trades,
            final_balance,
            record_path: (recorded > 0).then(|| log.path().to_path_buf()),
        })
    }

    /// Run and print the report plus the trade-log location.
    pub fn run_and_report<S: Strategy>(
        &self,
        table: SeriesTable,
        registry: TimeframeRegistry,
        strategy: &S,
        label: &str,
    ) -> Result<BacktestOutcome> {
        println!("\n🔬 Running backtest: {}", label);
        println!("   Strategy: {}", strategy.name());
        println!("   Driver symbol: {}", self.config.driver_symbol);
        println!("   Initial balance: ${:.2}", self.config.initial_balance);

        let outcome = self.run(table, registry, strategy)?;
        outcome.report.print_report();

        if let Some(path) = &outcome.record_path {
            println!("Trade log written to {}", path.display());
        } else {
            println!("No trades closed; no trade log written");
        }
        Ok(outcome)
    }

    fn open_log(&self) -> Result<TradeLog> {
        let log = match &self.config.record_path {
            Some(path) => TradeLog::at_path(path.clone())?,
            None => TradeLog::create_in(&self.config.record_dir)?,
        };
        Ok(log)
    }

    fn open_position(&self, ledger: &mut PositionLedger, side: Side) -> Result<()> {
        let cfg = &self.config;
        let price = ledger.current_price(&cfg.driver_symbol)?;

        let (stop_loss, take_profit) = match side {
            Side::Long => (
                cfg.stop_loss_frac.map(|f| price * (1.0 - f)),
                cfg.take_profit_frac.map(|f| price * (1.0 + f)),
            ),
            Side::Short => (
                cfg.stop_loss_frac.map(|f| price * (1.0 + f)),
                cfg.take_profit_frac.map(|f| price * (1.0 - f)),
            ),
        };

        match ledger.open(
            &cfg.driver_symbol,
            side,
            cfg.leverage,
            cfg.amount,
            stop_loss,
            take_profit,
        )? {
            OpenOutcome::Opened(_) => {}
            OpenOutcome::Rejected(reason) => {
                tracing::debug!("Open {} {} rejected: {}", side, cfg.driver_symbol, reason);
            }
        }
        Ok(())
    }
}
