use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{NaiveDateTime, TimeZone, Utc};

use crate::models::{ExitReason, Side};

use super::ClosedTrade;

/// Default directory for auto-numbered record files.
pub const DEFAULT_RECORD_DIR: &str = "profit_record";

const HEADER: &str = "symbol,position_type,entry_time,entry_price,exit_time,exit_price,\
                      exit_reason,amount,leverage,pnl,pnl_pct,win/loss";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Append-only CSV log of closed trades.
///
/// The header (and the file itself) is written lazily on the first trade, so
/// a run that never closes a position leaves nothing behind.
pub struct TradeLog {
    path: PathBuf,
    header_written: bool,
}

impl TradeLog {
    /// Open a log at the lowest unused `profits_{i}.csv` under `dir`.
    pub fn create_in(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("creating record directory {}", dir.display()))?;

        let mut i = 0;
        let path = loop {
            let candidate = dir.join(format!("profits_{}.csv", i));
            if !candidate.exists() {
                break candidate;
            }
            i += 1;
        };
        tracing::info!("Trade log: {}", path.display());
        Ok(Self {
            path,
            header_written: false,
        })
    }

    /// Open a log at an explicit path, creating parent directories. An
    /// existing file is truncated when the first trade is written.
    pub fn at_path(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        Ok(Self {
            path,
            header_written: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one closed trade as a CSV row.
    pub fn append(&mut self, trade: &ClosedTrade) -> anyhow::Result<()> {
        if !self.header_written {
            fs::write(&self.path, format!("{}\n", HEADER))
                .with_context(|| format!("writing header to {}", self.path.display()))?;
            self.header_written = true;
        }

        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))?;
        writeln!(
            file,
            "{},{},{},{},{},{},{},{},{},{},{},{}",
            trade.symbol,
            trade.side,
            format_time(trade.entry_time),
            trade.entry_price,
            format_time(trade.exit_time),
            trade.exit_price,
            trade.exit_reason,
            trade.amount,
            trade.leverage,
            trade.pnl,
            trade.pnl_pct,
            if trade.win { "win" } else { "loss" },
        )
        .with_context(|| format!("appending to {}", self.path.display()))?;
        Ok(())
    }

    /// Append trades in order.
    pub fn append_all(&mut self, trades: &[ClosedTrade]) -> anyhow::Result<()> {
        for trade in trades {
            self.append(trade)?;
        }
        Ok(())
    }
}

/// Highest-numbered `profits_{i}.csv` under `dir`, if any exists.
pub fn latest_record_path(dir: impl AsRef<Path>) -> Option<PathBuf> {
    let entries = fs::read_dir(dir.as_ref()).ok()?;
    let mut best: Option<(u32, PathBuf)> = None;
    for entry in entries.flatten() {
        let path = entry.path();
        let index = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix("profits_"))
            .and_then(|n| n.strip_suffix(".csv"))
            .and_then(|n| n.parse::<u32>().ok());
        if let Some(index) = index {
            if best.as_ref().map_or(true, |(b, _)| index > *b) {
                best = Some((index, path));
            }
        }
    }
    best.map(|(_, path)| path)
}

/// Read a trade-log CSV back into closed trades.
///
/// Fields are split on ','; symbols and reasons never contain commas, so no
/// quoting is involved on either side.
pub fn read_trades(path: impl AsRef<Path>) -> anyhow::Result<Vec<ClosedTrade>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading trade log {}", path.display()))?;

    let mut lines = content.lines();
    match lines.next() {
        Some(header) if header.trim() == HEADER => {}
        _ => anyhow::bail!("{} is not a trade log (header mismatch)", path.display()),
    }

    let mut trades = Vec::new();
    for (i, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let trade =
            parse_row(line).with_context(|| format!("{} line {}", path.display(), i + 2))?;
        trades.push(trade);
    }
    Ok(trades)
}

fn parse_row(line: &str) -> anyhow::Result<ClosedTrade> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != 12 {
        anyhow::bail!("expected 12 columns, found {}", fields.len());
    }

    let side: Side = fields[1].parse()?;
    let exit_reason: ExitReason = fields[6].parse()?;
    let win = match fields[11] {
        "win" => true,
        "loss" => false,
        other => anyhow::bail!("unrecognized win/loss value '{}'", other),
    };

    Ok(ClosedTrade {
        symbol: fields[0].to_string(),
        side,
        entry_time: parse_time(fields[2])?,
        entry_price: fields[3].parse()?,
        exit_time: parse_time(fields[4])?,
        exit_price: fields[5].parse()?,
        exit_reason,
        amount: fields[7].parse()?,
        leverage: fields[8].parse()?,
        pnl: fields[9].parse()?,
        pnl_pct: fields[10].parse()?,
        win,
    })
}

/// Millisecond timestamp rendered as `YYYY-mm-dd HH:MM:SS` UTC.
pub fn format_time(ms: i64) -> String {
    match Utc.timestamp_millis_opt(ms) {
        chrono::LocalResult::Single(dt) => dt.format(TIME_FORMAT).to_string(),
        _ => ms.to_string(),
    }
}

/// Parse a trade-log timestamp back to epoch milliseconds.
pub fn parse_time(s: &str) -> anyhow::Result<i64> {
    let naive = NaiveDateTime::parse_from_str(s, TIME_FORMAT)
        .with_context(|| format!("bad timestamp '{}'", s))?;
    Ok(naive.and_utc().timestamp_millis())
}
