use std::fs::File;
use std::path::Path;

use chrono::NaiveDateTime;
use csv::ReaderBuilder;
use serde::Deserialize;

use crate::dates::{create_datetime, parse_timestamp};
use crate::error::{HarnessError, Result};

/// Trade/exit flag columns of a [`WorkingTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagColumn {
    BullTrade,
    BearTrade,
    BullExit,
    BearExit,
}

/// The flag columns saved and restored between passes over a working table.
pub const FLAG_COLUMNS: [FlagColumn; 4] = [
    FlagColumn::BullTrade,
    FlagColumn::BearTrade,
    FlagColumn::BullExit,
    FlagColumn::BearExit,
];

impl FlagColumn {
    pub fn name(self) -> &'static str {
        match self {
            Self::BullTrade => "bullTrade",
            Self::BearTrade => "bearTrade",
            Self::BullExit => "bullExit",
            Self::BearExit => "bearExit",
        }
    }
}

/// Per-bar simulator output for one parameter combination, stored by column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkingTable {
    pub timestamps: Vec<NaiveDateTime>,
    pub close: Vec<f64>,
    pub bull_trade: Vec<bool>,
    pub bear_trade: Vec<bool>,
    pub bull_exit: Vec<bool>,
    pub bear_exit: Vec<bool>,
    pub entry_ind: Vec<Option<usize>>,
    pub entry_price: Vec<Option<f64>>,
    pub exit_ind: Vec<Option<usize>>,
    pub exit_price: Vec<Option<f64>>,
}

/// One bar as handed over by a simulator.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub close: f64,
    pub bull_trade: bool,
    pub bear_trade: bool,
    pub bull_exit: bool,
    pub bear_exit: bool,
    pub entry_ind: Option<usize>,
    pub entry_price: Option<f64>,
    pub exit_ind: Option<usize>,
    pub exit_price: Option<f64>,
}

impl WorkingTable {
    pub fn from_bars(bars: impl IntoIterator<Item = Bar>) -> Self {
        let mut table = Self::default();
        for bar in bars {
            table.push(bar);
        }
        table
    }

    pub fn push(&mut self, bar: Bar) {
        self.timestamps.push(bar.timestamp);
        self.close.push(bar.close);
        self.bull_trade.push(bar.bull_trade);
        self.bear_trade.push(bar.bear_trade);
        self.bull_exit.push(bar.bull_exit);
        self.bear_exit.push(bar.bear_exit);
        self.entry_ind.push(bar.entry_ind);
        self.entry_price.push(bar.entry_price);
        self.exit_ind.push(bar.exit_ind);
        self.exit_price.push(bar.exit_price);
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn flag(&self, column: FlagColumn) -> &[bool] {
        match column {
            FlagColumn::BullTrade => &self.bull_trade,
            FlagColumn::BearTrade => &self.bear_trade,
            FlagColumn::BullExit => &self.bull_exit,
            FlagColumn::BearExit => &self.bear_exit,
        }
    }

    pub fn flag_mut(&mut self, column: FlagColumn) -> &mut Vec<bool> {
        match column {
            FlagColumn::BullTrade => &mut self.bull_trade,
            FlagColumn::BearTrade => &mut self.bear_trade,
            FlagColumn::BullExit => &mut self.bull_exit,
            FlagColumn::BearExit => &mut self.bear_exit,
        }
    }

    /// Fails if any column disagrees with the timestamp column on row count.
    pub fn validate(&self) -> Result<()> {
        let n = self.len();
        let lengths = [
            ("Close", self.close.len()),
            ("bullTrade", self.bull_trade.len()),
            ("bearTrade", self.bear_trade.len()),
            ("bullExit", self.bull_exit.len()),
            ("bearExit", self.bear_exit.len()),
            ("entryInd", self.entry_ind.len()),
            ("entryPrice", self.entry_price.len()),
            ("exitInd", self.exit_ind.len()),
            ("exitPrice", self.exit_price.len()),
        ];
        for (name, len) in lengths {
            if len != n {
                return Err(HarnessError::SchemaMismatch(format!(
                    "column {name} has {len} rows, expected {n}"
                )));
            }
        }
        Ok(())
    }

    /// Keep only the rows where `mask` is true.
    pub fn filter(&self, mask: &[bool]) -> Result<Self> {
        self.validate()?;
        if mask.len() != self.len() {
            return Err(HarnessError::SchemaMismatch(format!(
                "mask has {} rows, table has {}",
                mask.len(),
                self.len()
            )));
        }

        fn keep<T: Clone>(col: &[T], mask: &[bool]) -> Vec<T> {
            col.iter()
                .zip(mask)
                .filter(|(_, keep)| **keep)
                .map(|(v, _)| v.clone())
                .collect()
        }

        Ok(Self {
            timestamps: keep(&self.timestamps, mask),
            close: keep(&self.close, mask),
            bull_trade: keep(&self.bull_trade, mask),
            bear_trade: keep(&self.bear_trade, mask),
            bull_exit: keep(&self.bull_exit, mask),
            bear_exit: keep(&self.bear_exit, mask),
            entry_ind: keep(&self.entry_ind, mask),
            entry_price: keep(&self.entry_price, mask),
            exit_ind: keep(&self.exit_ind, mask),
            exit_price: keep(&self.exit_price, mask),
        })
    }

    /// Load a simulator's per-bar output.
    ///
    /// Accepts either a single `DateTime` column or split `Date` + `Time`
    /// columns. Flag columns are 0/1 integers; entry/exit cells may be empty.
    pub fn from_csv(path: &Path) -> Result<Self> {
        let load_err = |source| HarnessError::Load {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path)?;
        let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(file);

        let mut table = Self::default();
        for result in rdr.deserialize::<BarRow>() {
            let row = result.map_err(load_err)?;
            table.push(row.into_bar()?);
        }
        Ok(table)
    }
}

#[derive(Debug, Deserialize)]
struct BarRow {
    #[serde(rename = "DateTime", default)]
    datetime: Option<String>,
    #[serde(rename = "Date", default)]
    date: Option<String>,
    #[serde(rename = "Time", default)]
    time: Option<String>,
    #[serde(rename = "Close")]
    close: f64,
    #[serde(rename = "bullTrade")]
    bull_trade: u8,
    #[serde(rename = "bearTrade")]
    bear_trade: u8,
    #[serde(rename = "bullExit")]
    bull_exit: u8,
    #[serde(rename = "bearExit")]
    bear_exit: u8,
    #[serde(rename = "entryInd", default)]
    entry_ind: Option<usize>,
    #[serde(rename = "entryPrice", default)]
    entry_price: Option<f64>,
    #[serde(rename = "exitInd", default)]
    exit_ind: Option<usize>,
    #[serde(rename = "exitPrice", default)]
    exit_price: Option<f64>,
}

impl BarRow {
    fn into_bar(self) -> Result<Bar> {
        let timestamp = match (&self.datetime, &self.date, &self.time) {
            (Some(dt), _, _) if !dt.is_empty() => parse_timestamp(dt)?,
            (_, Some(date), Some(time)) => create_datetime(date, time)?,
            _ => {
                return Err(HarnessError::SchemaMismatch(
                    "bar has neither DateTime nor Date+Time".to_string(),
                ));
            }
        };
        Ok(Bar {
            timestamp,
            close: self.close,
            bull_trade: self.bull_trade != 0,
            bear_trade: self.bear_trade != 0,
            bull_exit: self.bull_exit != 0,
            bear_exit: self.bear_exit != 0,
            entry_ind: self.entry_ind,
            entry_price: self.entry_price,
            exit_ind: self.exit_ind,
            exit_price: self.exit_price,
        })
    }
}
