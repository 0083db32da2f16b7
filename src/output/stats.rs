//! Statistics generation from the review store
//!
//! This module provides functionality for extracting and displaying
//! per-game ingestion statistics: records per source, how many of them the
//! analysis engine has processed, and the most recent run.

use crate::storage::{ContentStore, RunRecord, SourceCount, StorageResult};
use std::fmt::Write;

/// Ingestion statistics for one game
#[derive(Debug, Clone, PartialEq)]
pub struct GameStatistics {
    pub game_id: String,

    /// Record counts per source, sorted by source name
    pub sources: Vec<SourceCount>,

    pub last_run: Option<RunRecord>,
}

impl GameStatistics {
    pub fn total(&self) -> u64 {
        self.sources.iter().map(|s| s.total).sum()
    }

    pub fn analyzed(&self) -> u64 {
        self.sources.iter().map(|s| s.analyzed).sum()
    }

    pub fn pending(&self) -> u64 {
        self.sources.iter().map(SourceCount::pending).sum()
    }
}

/// Loads statistics for one game from the store
///
/// # Arguments
///
/// * `store` - The store to query
/// * `game_id` - Game to summarize
///
/// # Returns
///
/// * `Ok(GameStatistics)` - Counts and last run (empty for an unseen game)
/// * `Err(StorageError)` - Failed to query the store
pub fn load_statistics(store: &dyn ContentStore, game_id: &str) -> StorageResult<GameStatistics> {
    Ok(GameStatistics {
        game_id: game_id.to_string(),
        sources: store.counts_by_source(game_id)?,
        last_run: store.latest_run(Some(game_id))?,
    })
}

/// Formats statistics as a plain-text table
pub fn format_statistics(stats: &GameStatistics) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {} ===", stats.game_id);

    if stats.sources.is_empty() {
        let _ = writeln!(out, "  No records stored");
    } else {
        let _ = writeln!(
            out,
            "  {:<14} {:>8} {:>9} {:>8}",
            "source", "records", "analyzed", "pending"
        );
        for source in &stats.sources {
            let _ = writeln!(
                out,
                "  {:<14} {:>8} {:>9} {:>8}",
                source.source_name,
                source.total,
                source.analyzed,
                source.pending()
            );
        }
        let _ = writeln!(
            out,
            "  {:<14} {:>8} {:>9} {:>8}",
            "total",
            stats.total(),
            stats.analyzed(),
            stats.pending()
        );
    }

    match &stats.last_run {
        Some(run) => {
            let _ = writeln!(
                out,
                "  Last run #{}: {} (started {}, cutoff {})",
                run.id,
                run.status.to_db_string(),
                run.started_at.format("%Y-%m-%d %H:%M"),
                run.cutoff.format("%Y-%m-%d")
            );
            let _ = writeln!(
                out,
                "    targets: {} ({} failed), new records: {}, already stored: {}",
                run.totals.targets_total,
                run.totals.targets_failed,
                run.totals.records_inserted,
                run.totals.records_duplicate
            );
        }
        None => {
            let _ = writeln!(out, "  No runs recorded");
        }
    }
    out
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &GameStatistics) {
    print!("{}", format_statistics(stats));
}
