use std::collections::HashMap;

use chrono::{NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::ClosedTrade;
use crate::models::Side;

/// Aggregated performance summary of a finished run.
///
/// A zero-pnl trade counts as neither win nor loss in the statistics, so
/// `winning_trades + losing_trades` can fall short of `total_trades`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    pub total_trades: usize,
    pub long_trades: usize,
    pub short_trades: usize,
    /// long / short count ratio, 0 when there are no shorts.
    pub long_short_ratio: f64,
    /// Most trades entered within a single UTC day.
    pub max_daily_trades: usize,
    pub total_profit: f64,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Winning trades as a percentage of all trades.
    pub win_rate: f64,
    pub avg_profit: f64,
    pub avg_win: f64,
    /// Mean of the losing pnls (negative).
    pub avg_loss: f64,
    /// |avg_win / avg_loss|, 0 when there are no losses.
    pub profit_loss_ratio: f64,
    pub max_single_win: f64,
    /// Most negative single pnl, 0 when there are no losses.
    pub max_single_loss: f64,
    /// Most negative pnl sum over any contiguous run of trades, 0 when no
    /// run loses money.
    pub max_accumulated_drawdown: f64,
    /// Running pnl sum, starting at 0 (length = trades + 1).
    pub cumulative_pnl: Vec<f64>,
}

impl BacktestReport {
    /// Aggregate closed trades (in close order) into a report.
    pub fn from_trades(trades: &[ClosedTrade]) -> Self {
        let profits: Vec<f64> = trades.iter().map(|t| t.pnl).collect();

        let total_trades = trades.len();
        let long_trades = trades.iter().filter(|t| t.side == Side::Long).count();
        let short_trades = total_trades - long_trades;
        let long_short_ratio = if short_trades > 0 {
            long_trades as f64 / short_trades as f64
        } else {
            0.0
        };

        let total_profit: f64 = profits.iter().sum();
        let wins: Vec<f64> = profits.iter().copied().filter(|p| *p > 0.0).collect();
        let losses: Vec<f64> = profits.iter().copied().filter(|p| *p < 0.0).collect();

        let winning_trades = wins.len();
        let losing_trades = losses.len();
        let win_rate = if total_trades > 0 {
            winning_trades as f64 / total_trades as f64 * 100.0
        } else {
            0.0
        };
        let avg_profit = if total_trades > 0 {
            total_profit / total_trades as f64
        } else {
            0.0
        };
        let avg_win = if winning_trades > 0 {
            wins.iter().sum::<f64>() / winning_trades as f64
        } else {
            0.0
        };
        let avg_loss = if losing_trades > 0 {
            losses.iter().sum::<f64>() / losing_trades as f64
        } else {
            0.0
        };
        let profit_loss_ratio = if avg_loss != 0.0 {
            (avg_win / avg_loss).abs()
        } else {
            0.0
        };

        let max_single_win = wins.iter().copied().fold(0.0, f64::max);
        let max_single_loss = losses.iter().copied().fold(0.0, f64::min);

        let mut cumulative_pnl = vec![0.0];
        let mut running = 0.0;
        for p in &profits {
            running += p;
            cumulative_pnl.push(running);
        }

        Self {
            total_trades,
            long_trades,
            short_trades,
            long_short_ratio,
            max_daily_trades: max_daily_trades(trades),
            total_profit,
            winning_trades,
            losing_trades,
            win_rate,
            avg_profit,
            avg_win,
            avg_loss,
            profit_loss_ratio,
            max_single_win,
            max_single_loss,
            max_accumulated_drawdown: max_accumulated_drawdown(&profits),
            cumulative_pnl,
        }
    }

    /// Print a formatted report to stdout.
    pub fn print_report(&self) {
        println!("\n╔═══════════════════════════════════════════════╗");
        println!("║            BACKTEST PROFIT REPORT             ║");
        println!("╚═══════════════════════════════════════════════╝\n");

        println!("📊 TRADES");
        println!("  Total:                 {}", self.total_trades);
        println!(
            "  Long / Short:          {} / {} (ratio {:.3})",
            self.long_trades, self.short_trades, self.long_short_ratio
        );
        println!("  Max in one day:        {}", self.max_daily_trades);

        println!("\n💰 PROFIT");
        println!("  Total:                 {:.3}", self.total_profit);
        println!(
            "  Wins / Losses:         {} / {} (win rate {:.3}%)",
            self.winning_trades, self.losing_trades, self.win_rate
        );
        println!("  Average per trade:     {:.3}", self.avg_profit);
        println!("  Average win:           {:.3}", self.avg_win);
        println!("  Average loss:          {:.3}", self.avg_loss);
        println!("  Profit/loss ratio:     {:.3}", self.profit_loss_ratio);

        println!("\n⚠️  RISK");
        println!("  Max single win:        {:.3}", self.max_single_win);
        println!("  Max single loss:       {:.3}", self.max_single_loss);
        println!("  Max drawdown:          {:.3}", self.max_accumulated_drawdown);

        let final_pnl = self.cumulative_pnl.last().copied().unwrap_or(0.0);
        println!("\n📈 EQUITY");
        println!("  Final cumulative pnl:  {:.3}", final_pnl);
        println!();
    }
}

/// Most trades whose entry falls on the same UTC date.
fn max_daily_trades(trades: &[ClosedTrade]) -> usize {
    let mut by_day: HashMap<NaiveDate, usize> = HashMap::new();
    for trade in trades {
        if let chrono::LocalResult::Single(dt) = Utc.timestamp_millis_opt(trade.entry_time) {
            *by_day.entry(dt.date_naive()).or_insert(0) += 1;
        }
    }
    by_day.values().copied().max().unwrap_or(0)
}

/// Minimum contiguous-window sum of `profits`, capped above at 0.
fn max_accumulated_drawdown(profits: &[f64]) -> f64 {
    let mut worst = 0.0_f64;
    let mut running = 0.0_f64;
    for &p in profits {
        running = if running < 0.0 { running + p } else { p };
        if running < worst {
            worst = running;
        }
    }
    worst
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExitReason;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn trade(side: Side, pnl: f64, entry_time: i64) -> ClosedTrade {
        ClosedTrade {
            symbol: "BTCUSDT".to_string(),
            side,
            entry_time,
            entry_price: 100.0,
            exit_time: entry_time + 300_000,
            exit_price: 100.0,
            exit_reason: ExitReason::Manual,
            amount: 1000.0,
            leverage: 10.0,
            pnl,
            pnl_pct: pnl,
            win: pnl > 0.0,
        }
    }

    #[test]
    fn test_counts_and_averages() {
        let trades = vec![
            trade(Side::Long, 100.0, 0),
            trade(Side::Long, 50.0, 0),
            trade(Side::Short, -30.0, 0),
        ];
        let report = BacktestReport::from_trades(&trades);

        assert_eq!(report.total_trades, 3);
        assert_eq!(report.long_trades, 2);
        assert_eq!(report.short_trades, 1);
        assert!((report.long_short_ratio - 2.0).abs() < 1e-9);
        assert_eq!(report.winning_trades, 2);
        assert_eq!(report.losing_trades, 1);
        assert!((report.win_rate - 66.6666).abs() < 0.001);
        assert!((report.total_profit - 120.0).abs() < 1e-9);
        assert!((report.avg_profit - 40.0).abs() < 1e-9);
        assert!((report.avg_win - 75.0).abs() < 1e-9);
        assert!((report.avg_loss - (-30.0)).abs() < 1e-9);
        assert!((report.profit_loss_ratio - 2.5).abs() < 1e-9);
        assert_eq!(report.max_single_win, 100.0);
        assert_eq!(report.max_single_loss, -30.0);
    }

    #[test]
    fn test_no_trades_yields_zeros() {
        let report = BacktestReport::from_trades(&[]);

        assert_eq!(report.total_trades, 0);
        assert_eq!(report.win_rate, 0.0);
        assert_eq!(report.avg_profit, 0.0);
        assert_eq!(report.profit_loss_ratio, 0.0);
        assert_eq!(report.long_short_ratio, 0.0);
        assert_eq!(report.max_daily_trades, 0);
        assert_eq!(report.max_accumulated_drawdown, 0.0);
        assert_eq!(report.cumulative_pnl, vec![0.0]);
    }

    #[test]
    fn test_no_shorts_means_zero_ratio() {
        let trades = vec![trade(Side::Long, 10.0, 0), trade(Side::Long, -5.0, 0)];
        let report = BacktestReport::from_trades(&trades);
        assert_eq!(report.long_short_ratio, 0.0);
    }

    #[test]
    fn test_zero_pnl_trade_is_neither_win_nor_loss() {
        let report = BacktestReport::from_trades(&[trade(Side::Long, 0.0, 0)]);

        assert_eq!(report.total_trades, 1);
        assert_eq!(report.winning_trades, 0);
        assert_eq!(report.losing_trades, 0);
        assert_eq!(report.avg_win, 0.0);
        assert_eq!(report.avg_loss, 0.0);
    }

    #[test]
    fn test_max_daily_trades_buckets_by_utc_date() {
        // 2023-11-14 22:13:20 UTC and +1h / +90m land on the same date
        let day1 = 1_700_000_000_000;
        let trades = vec![
            trade(Side::Long, 1.0, day1),
            trade(Side::Long, 1.0, day1 + 3_600_000),
            trade(Side::Short, 1.0, day1 + 5_400_000),
            trade(Side::Long, 1.0, day1 + 2 * 86_400_000),
        ];
        let report = BacktestReport::from_trades(&trades);
        assert_eq!(report.max_daily_trades, 3);
    }

    #[test]
    fn test_cumulative_curve_starts_at_zero() {
        let trades = vec![trade(Side::Long, 100.0, 0), trade(Side::Short, -50.0, 0)];
        let report = BacktestReport::from_trades(&trades);
        assert_eq!(report.cumulative_pnl, vec![0.0, 100.0, 50.0]);
    }

    #[test]
    fn test_drawdown_picks_worst_run() {
        // Worst contiguous run is -200 +50 -100 = -250
        let profits = [100.0, -200.0, 50.0, -100.0];
        assert!((max_accumulated_drawdown(&profits) - (-250.0)).abs() < 1e-9);
    }

    #[test]
    fn test_drawdown_zero_when_never_down() {
        assert_eq!(max_accumulated_drawdown(&[10.0, 20.0, 5.0]), 0.0);
        assert_eq!(max_accumulated_drawdown(&[]), 0.0);
    }

    fn brute_force_drawdown(profits: &[f64]) -> f64 {
        let mut worst = 0.0_f64;
        for i in 0..profits.len() {
            for j in i..profits.len() {
                let sum: f64 = profits[i..=j].iter().sum();
                if sum < worst {
                    worst = sum;
                }
            }
        }
        worst
    }

    #[test]
    fn test_drawdown_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(7);
        let profits: Vec<f64> = (0..60).map(|_| rng.gen_range(-100.0..100.0)).collect();

        let fast = max_accumulated_drawdown(&profits);
        let slow = brute_force_drawdown(&profits);
        assert!(
            (fast - slow).abs() < 1e-6,
            "scan {} vs brute force {}",
            fast,
            slow
        );
    }
}
