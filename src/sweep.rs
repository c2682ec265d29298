use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::aggregate::AggregationBatcher;
use crate::dates::SessionWindow;
use crate::storage::BatchWriter;
use crate::table::WorkingTable;
use crate::trades::filter_trades;

/// Ordered parameter axes of a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamGrid {
    axes: Vec<(String, Vec<f64>)>,
}

impl ParamGrid {
    pub fn new(axes: Vec<(String, Vec<f64>)>) -> Self {
        Self { axes }
    }

    pub fn names(&self) -> Vec<String> {
        self.axes.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn total_combinations(&self) -> u64 {
        if self.axes.is_empty() {
            return 0;
        }
        self.axes.iter().map(|(_, values)| values.len() as u64).product()
    }

    /// Values of the `combo`-th combination (1-based), last axis fastest.
    pub fn combination(&self, combo: u64) -> Option<Vec<f64>> {
        if combo == 0 || combo > self.total_combinations() {
            return None;
        }
        let mut rest = combo - 1;
        let mut values = vec![0.0; self.axes.len()];
        for (slot, (_, axis)) in values.iter_mut().zip(&self.axes).rev() {
            let len = axis.len() as u64;
            *slot = axis[(rest % len) as usize];
            rest /= len;
        }
        Some(values)
    }

    /// `(combo, values)` for every combination from `combo_start` on.
    pub fn combinations(&self, combo_start: u64) -> impl Iterator<Item = (u64, Vec<f64>)> + '_ {
        (combo_start.max(1)..=self.total_combinations())
            .filter_map(move |combo| self.combination(combo).map(|values| (combo, values)))
    }
}

/// Black-box backtest producing a working table for one combination.
pub trait Simulator {
    fn simulate(&mut self, combo: u64, values: &[f64]) -> Result<WorkingTable>;
}

/// Replays working tables an external simulator wrote as `{input_dir}/{combo}.csv`.
pub struct ReplaySimulator {
    input_dir: PathBuf,
}

impl ReplaySimulator {
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
        }
    }
}

impl Simulator for ReplaySimulator {
    fn simulate(&mut self, combo: u64, _values: &[f64]) -> Result<WorkingTable> {
        let path = self.input_dir.join(format!("{combo}.csv"));
        WorkingTable::from_csv(&path)
            .with_context(|| format!("failed to load working table {:?}", path))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub combinations: u64,
    pub trades: usize,
    pub flushes: usize,
}

pub fn run_sweep<S, W>(
    grid: &ParamGrid,
    combo_start: u64,
    simulator: &mut S,
    batcher: &mut AggregationBatcher<W>,
    flush_threshold: usize,
    session: Option<SessionWindow>,
) -> Result<SweepReport>
where
    S: Simulator,
    W: BatchWriter,
{
    let mut report = SweepReport::default();

    for (combo, values) in grid.combinations(combo_start) {
        let mut table = simulator
            .simulate(combo, &values)
            .with_context(|| format!("simulation failed for combination {combo}"))?;
        if let Some(window) = session {
            table = table.filter(&window.mask(&table.timestamps))?;
        }

        let trades = filter_trades(&table)?;
        debug!(combo, trades = trades.len(), "combination done");
        report.combinations += 1;
        report.trades += trades.len();

        batcher.append(combo, values, trades)?;
        if batcher.maybe_flush(flush_threshold)?.is_some() {
            report.flushes += 1;
        }
    }

    if batcher.flush()?.is_some() {
        report.flushes += 1;
    }

    info!(
        combinations = report.combinations,
        trades = report.trades,
        flushes = report.flushes,
        "Sweep finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::OutputKey;
    use crate::storage::read_trades;
    use crate::table::Bar;
    use crate::table::tests::flat_bar;

    fn grid() -> ParamGrid {
        ParamGrid::new(vec![
            ("lookbacks".to_string(), vec![3.0, 4.0]),
            ("fastEmaLens".to_string(), vec![10.0, 12.0, 14.0]),
        ])
    }

    /// Emits one bull trade at 07:00 and one bear trade at 10:00 per combination.
    struct TwoTradeSimulator {
        calls: Vec<u64>,
    }

    impl Simulator for TwoTradeSimulator {
        fn simulate(&mut self, combo: u64, values: &[f64]) -> Result<WorkingTable> {
            self.calls.push(combo);
            let entry = 100.0 + values[0];
            Ok(WorkingTable::from_bars(vec![
                Bar {
                    bull_trade: true,
                    entry_ind: Some(0),
                    entry_price: Some(entry),
                    exit_ind: Some(1),
                    exit_price: Some(entry + 1.0),
                    ..flat_bar(9, 7, entry)
                },
                flat_bar(9, 8, entry),
                Bar {
                    bear_trade: true,
                    entry_ind: Some(2),
                    entry_price: Some(entry),
                    exit_ind: Some(3),
                    exit_price: Some(entry - 2.0),
                    ..flat_bar(9, 10, entry)
                },
            ]))
        }
    }

    fn output_key() -> OutputKey {
        OutputKey {
            security: "ES".to_string(),
            timeframe: "5min".to_string(),
            algo_name: "dblc".to_string(),
        }
    }

    #[test]
    fn test_grid_enumerates_last_axis_fastest() {
        let all: Vec<_> = grid().combinations(1).collect();
        assert_eq!(all.len(), 6);
        assert_eq!(all[0], (1, vec![3.0, 10.0]));
        assert_eq!(all[1], (2, vec![3.0, 12.0]));
        assert_eq!(all[3], (4, vec![4.0, 10.0]));
        assert_eq!(all[5], (6, vec![4.0, 14.0]));
    }

    #[test]
    fn test_grid_resumes_from_combo_start() {
        let combos: Vec<_> = grid().combinations(5).map(|(c, _)| c).collect();
        assert_eq!(combos, vec![5, 6]);
        assert_eq!(grid().combination(7), None);
        assert_eq!(grid().combination(0), None);
        assert_eq!(grid().combinations(0).count(), 6);
    }

    #[test]
    fn test_empty_grid_has_no_combinations() {
        let empty = ParamGrid::new(vec![]);
        assert_eq!(empty.total_combinations(), 0);
        assert_eq!(empty.combinations(1).count(), 0);
    }

    #[test]
    fn test_run_sweep_flushes_by_threshold_and_at_the_end() {
        let dir = tempfile::tempdir().unwrap();
        let grid = grid();
        let mut batcher =
            AggregationBatcher::new(dir.path(), output_key(), 1, grid.total_combinations(), grid.names());
        let mut sim = TwoTradeSimulator { calls: vec![] };

        let report = run_sweep(&grid, 1, &mut sim, &mut batcher, 3, None).unwrap();

        // 4 buffered > 3 triggers one flush, the remaining 2 flush at the end.
        assert_eq!(report.combinations, 6);
        assert_eq!(report.trades, 12);
        assert_eq!(report.flushes, 2);
        assert_eq!(sim.calls, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(batcher.buffered(), 0);

        let first = read_trades(&dir.path().join("ES_5min_dblc_1_trades.csv")).unwrap();
        let second = read_trades(&dir.path().join("ES_5min_dblc_5_trades.csv")).unwrap();
        assert_eq!(first.len(), 8);
        assert_eq!(second.len(), 4);
    }

    #[test]
    fn test_run_sweep_applies_session_window_before_extracting() {
        let dir = tempfile::tempdir().unwrap();
        let grid = grid();
        let mut batcher =
            AggregationBatcher::new(dir.path(), output_key(), 5, grid.total_combinations(), grid.names());
        let mut sim = TwoTradeSimulator { calls: vec![] };
        let session = SessionWindow {
            start_time: chrono::NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            eod_time: chrono::NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
            subtract_hours: 0,
        };

        let report = run_sweep(&grid, 5, &mut sim, &mut batcher, 100, Some(session)).unwrap();

        assert_eq!(report.combinations, 2);
        assert_eq!(report.trades, 2);
        assert_eq!(report.flushes, 1);
        let trades = read_trades(&dir.path().join("ES_5min_dblc_5_trades.csv")).unwrap();
        assert!(trades.iter().all(|t| t.side == crate::trades::Side::Bear));
    }

    #[test]
    fn test_replay_simulator_reports_missing_table() {
        let dir = tempfile::tempdir().unwrap();
        let mut sim = ReplaySimulator::new(dir.path());
        let err = sim.simulate(3, &[]).unwrap_err();
        assert!(format!("{err:#}").contains("3.csv"));
    }
}
