//! Accumulates per-combination results across a sweep and flushes them in
//! batches.

use std::path::PathBuf;

use tracing::info;

use crate::error::{HarnessError, Result};
use crate::storage::{BatchWriter, CsvBatchWriter};
use crate::trades::TradeRecord;

/// One assignment of values to every swept parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSet {
    pub paramset_id: u64,
    pub values: Vec<f64>,
}

/// Params table: a `paramset_id` column followed by one column per parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamTable {
    columns: Vec<String>,
    rows: Vec<ParamSet>,
}

impl ParamTable {
    pub fn new(param_names: &[String]) -> Self {
        let columns = std::iter::once("paramset_id".to_string())
            .chain(param_names.iter().cloned())
            .collect();
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: ParamSet) -> Result<()> {
        let expected = self.columns.len() - 1;
        if row.values.len() != expected {
            return Err(HarnessError::SchemaMismatch(format!(
                "paramset {} has {} values, expected {expected}",
                row.paramset_id,
                row.values.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[ParamSet] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Identifies a sweep's output files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputKey {
    pub security: String,
    pub timeframe: String,
    pub algo_name: String,
}

impl OutputKey {
    pub fn with_combo(&self, combo: u64) -> String {
        format!(
            "{}_{}_{}_{}",
            self.security, self.timeframe, self.algo_name, combo
        )
    }
}

/// What a successful flush wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushSummary {
    pub key: String,
    pub paramsets: usize,
    pub trades: usize,
}

pub struct AggregationBatcher<W = CsvBatchWriter> {
    writer: W,
    output_key: OutputKey,
    /// Combination number used in the next flush's key.
    combo: u64,
    total_combos: u64,
    param_names: Vec<String>,
    paramsets: Vec<ParamSet>,
    trade_tables: Vec<Vec<TradeRecord>>,
}

impl AggregationBatcher<CsvBatchWriter> {
    pub fn new(
        file_output: impl Into<PathBuf>,
        output_key: OutputKey,
        combo_start: u64,
        total_combos: u64,
        param_names: Vec<String>,
    ) -> Self {
        Self::with_writer(
            CsvBatchWriter::new(file_output),
            output_key,
            combo_start,
            total_combos,
            param_names,
        )
    }
}

impl<W: BatchWriter> AggregationBatcher<W> {
    pub fn with_writer(
        writer: W,
        output_key: OutputKey,
        combo_start: u64,
        total_combos: u64,
        param_names: Vec<String>,
    ) -> Self {
        Self {
            writer,
            output_key,
            combo: combo_start,
            total_combos,
            param_names,
            paramsets: Vec::new(),
            trade_tables: Vec::new(),
        }
    }

    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    pub fn combo(&self) -> u64 {
        self.combo
    }

    pub fn total_combos(&self) -> u64 {
        self.total_combos
    }

    /// Number of buffered parameter sets.
    pub fn buffered(&self) -> usize {
        self.paramsets.len()
    }

    pub fn buffered_trades(&self) -> usize {
        self.trade_tables.iter().map(Vec::len).sum()
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Buffer one combination's parameters and trades.
    ///
    /// Value count must match the declared parameter names; nothing is
    /// buffered otherwise.
    pub fn append(
        &mut self,
        paramset_id: u64,
        values: Vec<f64>,
        trades: Vec<TradeRecord>,
    ) -> Result<()> {
        if values.len() != self.param_names.len() {
            return Err(HarnessError::SchemaMismatch(format!(
                "paramset {paramset_id} has {} values for {} parameters {:?}",
                values.len(),
                self.param_names.len(),
                self.param_names
            )));
        }
        self.paramsets.push(ParamSet {
            paramset_id,
            values,
        });
        self.trade_tables.push(trades);
        Ok(())
    }

    /// Flush when more than `threshold` parameter sets are buffered.
    pub fn maybe_flush(&mut self, threshold: usize) -> Result<Option<FlushSummary>> {
        if self.paramsets.len() > threshold {
            self.flush()
        } else {
            Ok(None)
        }
    }

    /// Merge the buffers into one params table and one trades table.
    pub fn build_aggregated_data(&self) -> Result<(ParamTable, Vec<TradeRecord>)> {
        let mut params = ParamTable::new(&self.param_names);
        for paramset in &self.paramsets {
            params.push(paramset.clone())?;
        }
        let trades = self.trade_tables.iter().flatten().cloned().collect();
        Ok((params, trades))
    }

    /// Persist and clear the buffers.
    ///
    /// Returns `Ok(None)` without writing when nothing is buffered. On a
    /// write error the buffers and the key counter are left as they were, so
    /// the flush can be retried.
    pub fn flush(&mut self) -> Result<Option<FlushSummary>> {
        if self.paramsets.is_empty() {
            return Ok(None);
        }

        let key = self.output_key.with_combo(self.combo);
        info!(
            %key,
            paramsets = self.paramsets.len(),
            total_combos = self.total_combos,
            "Saving data"
        );

        let (params, trades) = self.build_aggregated_data()?;
        self.writer.write_batch(&key, &params, &trades)?;

        let summary = FlushSummary {
            key,
            paramsets: params.len(),
            trades: trades.len(),
        };
        self.combo += self.paramsets.len() as u64;
        self.paramsets.clear();
        self.trade_tables.clear();
        Ok(Some(summary))
    }
}
