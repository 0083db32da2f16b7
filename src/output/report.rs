//! Plain-text reports for the `crawl` and `targets` commands

use crate::crawler::{RunSummary, TargetOutcome, TargetPlan};
use std::fmt::Write;

/// Formats the routing of a game's targets (dry run)
pub fn format_target_plan(game_id: &str, plan: &TargetPlan) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}: {} routed, {} skipped",
        game_id,
        plan.routed.len(),
        plan.unrouted.len()
    );
    for target in &plan.routed {
        let _ = writeln!(out, "  {:<12} {}", target.family.source_name(), target.url);
    }
    for skipped in &plan.unrouted {
        let _ = writeln!(out, "  {:<12} {} ({})", "-", skipped.url, skipped.reason);
    }
    out
}

/// Formats the per-target outcome of a finished run
pub fn format_run_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    let totals = &summary.totals;
    let _ = writeln!(
        out,
        "Run #{} (since {}): {}/{} targets ok, {} new, {} already stored",
        summary.run_id,
        summary.cutoff.format("%Y-%m-%d"),
        totals.targets_total - totals.targets_failed,
        totals.targets_total,
        totals.records_inserted,
        totals.records_duplicate
    );

    for report in &summary.targets {
        let status = match &report.outcome {
            TargetOutcome::Completed(discovery) => match discovery.stop {
                Some(stop) => format!("ok, {}", stop),
                None => "ok".to_string(),
            },
            TargetOutcome::Failed(reason) => format!("FAILED: {}", reason),
        };
        let _ = writeln!(
            out,
            "  [{}] {} - {} seen, {} new, {} skipped ({})",
            report.family, report.url, report.tally.seen, report.tally.inserted, report.tally.skipped, status
        );
    }
    for skipped in &summary.unrouted {
        let _ = writeln!(out, "  [-] {} - not crawled ({})", skipped.url, skipped.reason);
    }
    out
}
