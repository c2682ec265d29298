use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::table::WorkingTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Bull,
    Bear,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bull => "Bull",
            Self::Bear => "Bear",
        }
    }
}

// Sides sort by label, so summaries list Bear before Bull.
impl Ord for Side {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for Side {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One executed trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    #[serde(rename = "DateTime", with = "timestamp_format")]
    pub timestamp: NaiveDateTime,
    pub side: Side,
    #[serde(rename = "entryInd")]
    pub entry_ind: Option<usize>,
    #[serde(rename = "entryPrice")]
    pub entry_price: Option<f64>,
    #[serde(rename = "exitInd")]
    pub exit_ind: Option<usize>,
    #[serde(rename = "exitPrice")]
    pub exit_price: Option<f64>,
}

impl TradeRecord {
    /// Points gained by the trade; shorts profit when price falls.
    ///
    /// `None` while the trade has no entry or exit price.
    pub fn pnl(&self) -> Option<f64> {
        let raw = self.exit_price? - self.entry_price?;
        Some(match self.side {
            Side::Bull => raw,
            Side::Bear => -raw,
        })
    }
}

/// Side label per row. Bull wins when both flags are set; rows with neither
/// flag get `None`.
pub fn get_side(table: &WorkingTable) -> Vec<Option<Side>> {
    table
        .bull_trade
        .iter()
        .zip(&table.bear_trade)
        .map(|(&bull, &bear)| {
            if bull {
                Some(Side::Bull)
            } else if bear {
                Some(Side::Bear)
            } else {
                None
            }
        })
        .collect()
}

/// Reduce a working table to the rows where a trade was opened.
pub fn filter_trades(table: &WorkingTable) -> Result<Vec<TradeRecord>> {
    table.validate()?;
    let sides = get_side(table);

    let trades = sides
        .into_iter()
        .enumerate()
        .filter_map(|(i, side)| {
            side.map(|side| TradeRecord {
                timestamp: table.timestamps[i],
                side,
                entry_ind: table.entry_ind[i],
                entry_price: table.entry_price[i],
                exit_ind: table.exit_ind[i],
                exit_price: table.exit_price[i],
            })
        })
        .collect();
    Ok(trades)
}

pub(crate) mod timestamp_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::dates::{DATETIME_FORMAT, parse_timestamp};

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&ts.format(DATETIME_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Bar;
    use crate::table::tests::{flat_bar, ts};

    fn trade_bar(hour: u32, bull: bool, bear: bool, entry: f64, exit: f64) -> Bar {
        Bar {
            bull_trade: bull,
            bear_trade: bear,
            entry_ind: Some(hour as usize),
            entry_price: Some(entry),
            exit_ind: Some(hour as usize + 2),
            exit_price: Some(exit),
            ..flat_bar(4, hour, entry)
        }
    }

    #[test]
    fn test_get_side_handles_unfiltered_rows() {
        let table = WorkingTable::from_bars(vec![
            trade_bar(9, true, false, 100.0, 101.0),
            flat_bar(4, 10, 100.0),
            trade_bar(11, false, true, 100.0, 99.0),
        ]);
        assert_eq!(
            get_side(&table),
            vec![Some(Side::Bull), None, Some(Side::Bear)]
        );
    }

    #[test]
    fn test_get_side_prefers_bull_when_both_flags_set() {
        let table = WorkingTable::from_bars(vec![trade_bar(9, true, true, 100.0, 101.0)]);
        assert_eq!(get_side(&table), vec![Some(Side::Bull)]);
    }

    #[test]
    fn test_filter_trades_keeps_only_trade_rows_with_contiguous_positions() {
        let table = WorkingTable::from_bars(vec![
            flat_bar(4, 8, 99.0),
            trade_bar(9, true, false, 100.0, 103.0),
            flat_bar(4, 10, 101.0),
            flat_bar(4, 11, 102.0),
            trade_bar(12, false, true, 102.0, 98.0),
        ]);

        let trades = filter_trades(&table).unwrap();

        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].timestamp, ts(4, 9));
        assert_eq!(trades[0].side, Side::Bull);
        assert_eq!(trades[0].entry_ind, Some(9));
        assert_eq!(trades[0].exit_price, Some(103.0));
        assert_eq!(trades[1].timestamp, ts(4, 12));
        assert_eq!(trades[1].side, Side::Bear);
        assert_eq!(trades[1].exit_ind, Some(14));
    }

    #[test]
    fn test_filter_trades_on_table_without_trades_is_empty() {
        let table = WorkingTable::from_bars(vec![flat_bar(4, 8, 99.0)]);
        assert!(filter_trades(&table).unwrap().is_empty());
    }

    #[test]
    fn test_pnl_sign_flips_for_bear() {
        let bear = TradeRecord {
            timestamp: ts(4, 9),
            side: Side::Bear,
            entry_ind: Some(0),
            entry_price: Some(100.0),
            exit_ind: Some(1),
            exit_price: Some(90.0),
        };
        let bull = TradeRecord {
            side: Side::Bull,
            ..bear.clone()
        };
        assert_eq!(bear.pnl(), Some(10.0));
        assert_eq!(bull.pnl(), Some(-10.0));
    }

    #[test]
    fn test_side_orders_by_label() {
        assert!(Side::Bear < Side::Bull);
        let mut sides = vec![Side::Bull, Side::Bear, Side::Bull];
        sides.sort();
        assert_eq!(sides, vec![Side::Bear, Side::Bull, Side::Bull]);
    }

    #[test]
    fn test_pnl_missing_when_trade_never_exited() {
        let open = TradeRecord {
            timestamp: ts(4, 9),
            side: Side::Bull,
            entry_ind: Some(0),
            entry_price: Some(100.0),
            exit_ind: None,
            exit_price: None,
        };
        assert_eq!(open.pnl(), None);
    }
}
