use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{info, warn};

use candle_sweep::output::print_monthly_summary;
use candle_sweep::performance::{monthly_summary, pnl_rows};
use candle_sweep::storage::{read_trades, write_monthly_summary};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Json,
}

/// Per side and month performance of one or more flushed trade files.
#[derive(Debug, Parser)]
struct Args {
    /// Trades file written by a sweep (repeatable)
    #[arg(long, required = true)]
    trades: Vec<PathBuf>,

    /// Where to write the summary; printed only when absent
    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Format::Csv)]
    format: Format,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut trades = Vec::new();
    for path in &args.trades {
        let loaded =
            read_trades(path).with_context(|| format!("failed to read trades from {:?}", path))?;
        info!(path = ?path, trades = loaded.len(), "Loaded trades");
        trades.extend(loaded);
    }

    let rows = pnl_rows(&trades);
    let open = rows
        .iter()
        .filter(|r| r.pnl.is_none_or(f64::is_nan))
        .count();
    if open > 0 {
        warn!(open, "Skipping trades without a usable exit price");
    }

    let summary = monthly_summary(&rows);
    if summary.is_empty() {
        println!("No closed trades found.");
        return Ok(());
    }
    print_monthly_summary(&summary);

    if let Some(output) = &args.output {
        match args.format {
            Format::Csv => write_monthly_summary(output, &summary)?,
            Format::Json => {
                let json = serde_json::to_string_pretty(&summary)?;
                fs::write(output, json)
                    .with_context(|| format!("failed to write {:?}", output))?;
            }
        }
        info!(path = ?output, rows = summary.len(), "Wrote monthly summary");
    }

    Ok(())
}
