use std::collections::BTreeMap;

use chrono::Datelike;
use serde::Serialize;

use crate::error::Result;
use crate::table::WorkingTable;
use crate::trades::{Side, TradeRecord};

/// P&L per trade, in input order.
pub fn compute_pnl(trades: &[TradeRecord]) -> Vec<Option<f64>> {
    trades.iter().map(TradeRecord::pnl).collect()
}

/// P&L for every row of an unfiltered working table.
///
/// The bear sign flip is taken from the row's own `bearTrade` flag, so
/// non-trade rows still get `exitPrice - entryPrice` (or `None`).
pub fn compute_table_pnl(table: &WorkingTable) -> Result<Vec<Option<f64>>> {
    table.validate()?;
    let pnl = table
        .entry_price
        .iter()
        .zip(&table.exit_price)
        .zip(&table.bear_trade)
        .map(|((entry, exit), &bear)| {
            let raw = (*exit)? - (*entry)?;
            Some(if bear { -raw } else { raw })
        })
        .collect();
    Ok(pnl)
}

/// Largest drop of a value below the running maximum of the values before
/// it, reported as a non-positive number.
///
/// The input is per-trade P&L in input order, NOT a cumulative equity curve:
/// `running_max(pnl) - pnl` is taken elementwise and the maximum of that is
/// negated. An empty slice yields `0.0`.
pub fn max_drawdown(pnl: &[f64]) -> f64 {
    let mut running_max = f64::NEG_INFINITY;
    let mut max_draw = 0.0_f64;
    for &value in pnl {
        running_max = running_max.max(value);
        max_draw = max_draw.max(running_max - value);
    }
    -max_draw
}

/// Flat per-trade P&L row consumed by [`monthly_summary`].
#[derive(Debug, Clone, PartialEq)]
pub struct PnlRow {
    pub side: Side,
    pub year: i32,
    pub month: u32,
    pub pnl: Option<f64>,
}

impl PnlRow {
    pub fn from_trade(trade: &TradeRecord) -> Self {
        Self {
            side: trade.side,
            year: trade.timestamp.year(),
            month: trade.timestamp.month(),
            pnl: trade.pnl(),
        }
    }
}

pub fn pnl_rows(trades: &[TradeRecord]) -> Vec<PnlRow> {
    trades.iter().map(PnlRow::from_trade).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySummary {
    pub side: Side,
    pub year: i32,
    pub month: u32,
    #[serde(rename = "cumPnl")]
    pub cum_pnl: f64,
    #[serde(rename = "maxDraw")]
    pub max_draw: f64,
    pub trades: usize,
    pub win_count: usize,
    pub loss_count: usize,
    pub win_percent: f64,
}

type GroupKey = (Side, i32, u32);

/// P&L of a row, treating `NaN` the same as a missing value.
fn usable_pnl(row: &PnlRow) -> Option<f64> {
    row.pnl.filter(|pnl| !pnl.is_nan())
}

fn count_by_group<'a>(
    rows: impl Iterator<Item = &'a PnlRow>,
    pred: impl Fn(f64) -> bool,
) -> BTreeMap<GroupKey, usize> {
    let mut counts = BTreeMap::new();
    for row in rows {
        if usable_pnl(row).is_some_and(&pred) {
            *counts.entry((row.side, row.year, row.month)).or_insert(0) += 1;
        }
    }
    counts
}

/// Per (side, year, month) performance, ordered by side label then year then
/// month.
///
/// Rows without a P&L (or with a `NaN` one) are dropped before grouping. Win and loss counts are
/// counted separately and outer-joined, so a bucket with only wins reports a
/// loss count of 0 rather than disappearing.
pub fn monthly_summary(rows: &[PnlRow]) -> Vec<MonthlySummary> {
    let mut groups: BTreeMap<GroupKey, Vec<f64>> = BTreeMap::new();
    for row in rows {
        if let Some(pnl) = usable_pnl(row) {
            groups
                .entry((row.side, row.year, row.month))
                .or_default()
                .push(pnl);
        }
    }

    let wins = count_by_group(rows.iter(), |pnl| pnl > 0.0);
    let losses = count_by_group(rows.iter(), |pnl| pnl <= 0.0);

    let mut combined: BTreeMap<GroupKey, (usize, usize)> = BTreeMap::new();
    for (key, n) in &wins {
        combined.entry(*key).or_default().0 = *n;
    }
    for (key, n) in &losses {
        combined.entry(*key).or_default().1 = *n;
    }

    groups
        .into_iter()
        .map(|(key @ (side, year, month), pnls)| {
            let (win_count, loss_count) = combined.get(&key).copied().unwrap_or_default();
            let trades = pnls.len();
            MonthlySummary {
                side,
                year,
                month,
                cum_pnl: pnls.iter().sum(),
                max_draw: max_drawdown(&pnls),
                trades,
                win_count,
                loss_count,
                win_percent: win_count as f64 / trades as f64,
            }
        })
        .collect()
}
