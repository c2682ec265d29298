use crate::performance::MonthlySummary;
use crate::sweep::SweepReport;

pub fn print_sweep_report(report: &SweepReport, total_combos: u64) {
    println!("=== Sweep Summary ===");
    println!("Combinations run:  {} of {}", report.combinations, total_combos);
    println!("Trades recorded:   {}", report.trades);
    println!("Batches written:   {}", report.flushes);
}

pub fn print_monthly_summary(summary: &[MonthlySummary]) {
    println!(
        "{:<5} {:>4} {:>2} {:>10} {:>10} {:>6} {:>5} {:>5} {:>7}",
        "side", "year", "mo", "cumPnl", "maxDraw", "trades", "wins", "loss", "win%"
    );
    for row in summary {
        println!(
            "{:<5} {:>4} {:>2} {:>10.2} {:>10.2} {:>6} {:>5} {:>5} {:>6.2}%",
            row.side,
            row.year,
            row.month,
            row.cum_pnl,
            row.max_draw,
            row.trades,
            row.win_count,
            row.loss_count,
            row.win_percent * 100.0
        );
    }
}
