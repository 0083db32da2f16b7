//! Output module for run reports and store statistics
//!
//! This module handles:
//! - Dry-run listings of how a game's targets are routed
//! - Per-target summaries of a finished crawl
//! - Per-source record counts and the last run, for the `stats` command

mod report;
pub mod stats;

pub use report::{format_run_summary, format_target_plan};
pub use stats::{format_statistics, load_statistics, print_statistics, GameStatistics};
