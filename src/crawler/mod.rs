//! Crawler module for running a game's targets
//!
//! This module contains the run-level logic, including:
//! - Routing configured URLs to site families
//! - Randomized pacing between browser actions
//! - Per-target isolation, authentication and run bookkeeping

mod orchestrator;
mod pacing;
mod routing;

pub use orchestrator::{
    plan_targets, CrawlRequest, Orchestrator, RunSummary, TargetOutcome, TargetPlan, TargetReport,
    UnroutedTarget,
};
pub use pacing::Pacer;
pub use routing::{matches_source_filter, route, route_target};

use crate::browser::{BrowserSession, CdpSession};
use crate::config::Config;
use crate::storage::{open_store, BackupLedger};
use crate::Result;
use std::path::Path;

/// Runs a complete crawl for one game
///
/// This is the main entry point for a crawl. It will:
/// 1. Open the store and the backup ledger
/// 2. Launch (or attach to) the browser
/// 3. Route, authenticate and crawl every target in order
/// 4. Record the run and close the browser
///
/// # Arguments
///
/// * `config` - Loaded configuration
/// * `request` - Game, optional lookback override and source filter
///
/// # Returns
///
/// * `Ok(RunSummary)` - The run finished, possibly with failed targets
/// * `Err(SweepError)` - The store, ledger or browser could not be opened
pub async fn run_crawl(config: &Config, request: &CrawlRequest) -> Result<RunSummary> {
    let store = open_store(Path::new(&config.output.database_path))?;
    let ledger = BackupLedger::open(Path::new(&config.output.backup_dir))?;

    let mut browser: Box<dyn BrowserSession> = Box::new(CdpSession::open(&config.browser).await?);
    let mut orchestrator = Orchestrator::new(config, Box::new(store), ledger);
    let result = orchestrator.run(browser.as_mut(), request).await;

    if let Err(e) = browser.shutdown().await {
        tracing::warn!("Browser did not shut down cleanly: {}", e);
    }
    result
}
