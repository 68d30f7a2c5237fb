use crate::engine::TickSnapshot;
use crate::ledger::{CloseOutcome, ClosedTrade, Position, PositionLedger};
use crate::models::{ExitReason, Side};

/// Scans open positions against each tick's price bounds and forces exits.
///
/// Priority per position: liquidation, then stop loss, then take profit.
/// At most one exit fires per position per tick, settled at the trigger
/// level rather than the bar open.
#[derive(Debug, Default)]
pub struct RiskEvaluator;

impl RiskEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Check every open position against `snapshot` and close the triggered
    /// ones through the ledger.
    ///
    /// Positions entered at this very tick are not checked (an entry must
    /// survive into the next bar before its own levels apply in the
    /// reference semantics). Positions whose symbol has no high/low in the
    /// snapshot are left untouched for the tick.
    pub fn check_exits(
        &self,
        ledger: &mut PositionLedger,
        snapshot: &TickSnapshot,
    ) -> anyhow::Result<Vec<ClosedTrade>> {
        // Collect triggers first; closing mutates the position list.
        let triggered: Vec<(String, Side, f64, ExitReason)> = ledger
            .open_positions()
            .iter()
            .filter(|p| p.entry_time != snapshot.time())
            .filter_map(|p| {
                let bounds = snapshot.symbol(&p.symbol)?.bounds()?;
                let (price, reason) = exit_trigger(p, bounds.high, bounds.low)?;
                Some((p.symbol.clone(), p.side, price, reason))
            })
            .collect();

        let mut closed = Vec::new();
        for (symbol, side, price, reason) in triggered {
            tracing::info!("Forced exit: {} {} {} @ {:.4}", reason, side, symbol, price);
            if let CloseOutcome::Closed(trade) =
                ledger.close(&symbol, side, Some(price), reason)?
            {
                closed.push(trade);
            }
        }
        Ok(closed)
    }
}

/// Exit price and reason for `position` given the bar's extremes, if any
/// level was touched.
fn exit_trigger(position: &Position, high: f64, low: f64) -> Option<(f64, ExitReason)> {
    let liquidation = position.liquidation_price();
    match position.side {
        Side::Long => {
            if low <= liquidation {
                return Some((liquidation, ExitReason::Liquidation));
            }
            if let Some(sl) = position.stop_loss {
                if low <= sl {
                    return Some((sl, ExitReason::StopLoss));
                }
            }
            if let Some(tp) = position.take_profit {
                if high >= tp {
                    return Some((tp, ExitReason::TakeProfit));
                }
            }
        }
        Side::Short => {
            if high >= liquidation {
                return Some((liquidation, ExitReason::Liquidation));
            }
            if let Some(sl) = position.stop_loss {
                if high >= sl {
                    return Some((sl, ExitReason::StopLoss));
                }
            }
            if let Some(tp) = position.take_profit {
                if low <= tp {
                    return Some((tp, ExitReason::TakeProfit));
                }
            }
        }
    }
    None
}
