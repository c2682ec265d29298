use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use candle_sweep::aggregate::AggregationBatcher;
use candle_sweep::config::SweepConfig;
use candle_sweep::output::print_sweep_report;
use candle_sweep::sweep::{ReplaySimulator, run_sweep};

/// Sweep every parameter combination, extracting trades from the simulator's
/// working tables and writing them out in batches.
#[derive(Debug, Parser)]
struct Args {
    /// config-file path
    #[arg(long)]
    config: PathBuf,

    /// Override the configured starting combination (resume an interrupted sweep), 1-based
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    combo_start: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = SweepConfig::load(args.config.clone())
        .with_context(|| format!("failed to load config {:?}", args.config))?;

    let combo_start = args.combo_start.unwrap_or(config.combo_start);
    let grid = config.grid();
    let total_combos = grid.total_combinations();
    let session = config.session()?;

    info!(
        security = %config.security,
        timeframe = %config.timeframe,
        algo = %config.algo_name,
        combo_start,
        total_combos,
        "Starting sweep"
    );

    let mut batcher = AggregationBatcher::new(
        &config.file_output,
        config.output_key(),
        combo_start,
        total_combos,
        grid.names(),
    );
    let mut simulator = ReplaySimulator::new(&config.input_dir);

    let report = run_sweep(
        &grid,
        combo_start,
        &mut simulator,
        &mut batcher,
        config.flush_threshold,
        session,
    )?;

    println!();
    print_sweep_report(&report, total_combos);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_reject_zero_combo_start() {
        let parsed = Args::try_parse_from(["candle_sweep", "--config", "sweep.toml", "--combo-start", "0"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_args_accept_positive_combo_start() {
        let args =
            Args::try_parse_from(["candle_sweep", "--config", "sweep.toml", "--combo-start", "501"])
                .unwrap();
        assert_eq!(args.combo_start, Some(501));
    }
}
