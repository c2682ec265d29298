use std::fs::{self, File};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};
use tracing::debug;

use crate::aggregate::ParamTable;
use crate::error::{HarnessError, Result};
use crate::performance::MonthlySummary;
use crate::trades::TradeRecord;

pub const TRADE_COLUMNS: [&str; 6] = [
    "DateTime",
    "side",
    "entryInd",
    "entryPrice",
    "exitInd",
    "exitPrice",
];

/// Destination of flushed batches.
pub trait BatchWriter {
    fn write_batch(&self, key: &str, params: &ParamTable, trades: &[TradeRecord]) -> Result<()>;
}

/// Writes `{key}_params.csv` and `{key}_trades.csv` into one directory.
#[derive(Debug, Clone)]
pub struct CsvBatchWriter {
    output_dir: PathBuf,
}

impl CsvBatchWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn params_path(&self, key: &str) -> PathBuf {
        self.output_dir.join(format!("{key}_params.csv"))
    }

    pub fn trades_path(&self, key: &str) -> PathBuf {
        self.output_dir.join(format!("{key}_trades.csv"))
    }
}

impl BatchWriter for CsvBatchWriter {
    fn write_batch(&self, key: &str, params: &ParamTable, trades: &[TradeRecord]) -> Result<()> {
        fs::create_dir_all(&self.output_dir)?;

        let params_path = self.params_path(key);
        write_params(&params_path, params)?;
        debug!(path = ?params_path, rows = params.len(), "wrote params");

        let trades_path = self.trades_path(key);
        write_trades(&trades_path, trades)?;
        debug!(path = ?trades_path, rows = trades.len(), "wrote trades");

        Ok(())
    }
}

fn persist_err(path: &Path) -> impl FnOnce(csv::Error) -> HarnessError + '_ {
    move |source| HarnessError::Persist {
        path: path.to_path_buf(),
        source,
    }
}

pub fn write_params(path: &Path, params: &ParamTable) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(persist_err(path))?;
    wtr.write_record(params.columns()).map_err(persist_err(path))?;
    for row in params.rows() {
        let record = std::iter::once(row.paramset_id.to_string())
            .chain(row.values.iter().map(f64::to_string));
        wtr.write_record(record).map_err(persist_err(path))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_trades(path: &Path, trades: &[TradeRecord]) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(persist_err(path))?;
    wtr.write_record(TRADE_COLUMNS).map_err(persist_err(path))?;
    for trade in trades {
        wtr.serialize(trade).map_err(persist_err(path))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Load a trades file written by [`write_trades`].
pub fn read_trades(path: &Path) -> Result<Vec<TradeRecord>> {
    let file = File::open(path)?;
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(file);

    let mut trades = Vec::new();
    for result in rdr.deserialize::<TradeRecord>() {
        let trade = result.map_err(|source| HarnessError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        trades.push(trade);
    }
    Ok(trades)
}

pub fn write_monthly_summary(path: &Path, summary: &[MonthlySummary]) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(persist_err(path))?;
    for row in summary {
        wtr.serialize(row).map_err(persist_err(path))?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::ParamSet;
    use crate::table::tests::ts;
    use crate::trades::Side;

    fn trade(hour: u32, side: Side, exit: Option<f64>) -> TradeRecord {
        TradeRecord {
            timestamp: ts(8, hour),
            side,
            entry_ind: Some(hour as usize),
            entry_price: Some(100.25),
            exit_ind: exit.map(|_| hour as usize + 1),
            exit_price: exit,
        }
    }

    #[test]
    fn test_write_trades_then_read_back_keeps_rows_and_empty_exits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t_trades.csv");
        let trades = vec![trade(9, Side::Bull, Some(101.0)), trade(10, Side::Bear, None)];

        write_trades(&path, &trades).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("DateTime,side,entryInd,entryPrice,exitInd,exitPrice")
        );
        assert_eq!(lines.next(), Some("2024-01-08 09:00:00,Bull,9,100.25,10,101.0"));
        assert_eq!(lines.next(), Some("2024-01-08 10:00:00,Bear,10,100.25,,"));

        assert_eq!(read_trades(&path).unwrap(), trades);
    }

    #[test]
    fn test_write_trades_with_no_rows_still_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty_trades.csv");

        write_trades(&path, &[]).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap().trim_end(),
            TRADE_COLUMNS.join(",")
        );
        assert!(read_trades(&path).unwrap().is_empty());
    }

    #[test]
    fn test_write_params_puts_paramset_id_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p_params.csv");
        let mut table = ParamTable::new(&["lookback".to_string(), "fastEmaLen".to_string()]);
        table
            .push(ParamSet {
                paramset_id: 7,
                values: vec![3.0, 12.0],
            })
            .unwrap();

        write_params(&path, &table).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "paramset_id,lookback,fastEmaLen\n7,3,12\n"
        );
    }

    #[test]
    fn test_csv_batch_writer_uses_key_with_suffixes() {
        let dir = tempfile::tempdir().unwrap();
        let writer = CsvBatchWriter::new(dir.path().join("nested"));
        let table = ParamTable::new(&["lookback".to_string()]);

        writer.write_batch("NQ_15min_dblc_1", &table, &[]).unwrap();

        assert!(dir.path().join("nested/NQ_15min_dblc_1_params.csv").exists());
        assert!(dir.path().join("nested/NQ_15min_dblc_1_trades.csv").exists());
    }

    #[test]
    fn test_write_to_missing_directory_is_a_persist_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does/not/exist.csv");
        assert!(matches!(
            write_trades(&path, &[]),
            Err(HarnessError::Persist { .. })
        ));
    }
}
