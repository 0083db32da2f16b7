//! Crawl orchestrator - runs one game's targets through their adapters
//!
//! A run owns one browser session and walks the game's targets strictly in
//! order. Every target is isolated: navigation errors, missing page
//! structure, panics inside an adapter and the per-target time budget are
//! all caught here, recorded against the target, and the run moves on.
//! Only failing to reach the store or the browser aborts a run.

use crate::adapters::{Adapter, AdapterContext, Discovery};
use crate::auth::{authenticate, AuthPolicy};
use crate::browser::{BrowserSession, PageDriver};
use crate::config::{validate_lookback, Config, GameConfig};
use crate::crawler::routing::{matches_source_filter, route, route_target};
use crate::crawler::Pacer;
use crate::record::{SiteFamily, SourceTarget};
use crate::state::SessionStatus;
use crate::storage::{BackupLedger, ContentStore, RecordSink, RunStatus, RunTotals, SinkTally};
use crate::{ConfigError, Result, SweepError};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use url::Url;

/// What the operator asked to crawl
#[derive(Debug, Clone, Default)]
pub struct CrawlRequest {
    pub game_id: String,

    /// Overrides the game's configured lookback
    pub days: Option<u32>,

    /// Source name, alias or URL substring
    pub source_filter: Option<String>,
}

impl CrawlRequest {
    pub fn new(game_id: &str) -> Self {
        Self {
            game_id: game_id.to_string(),
            ..Self::default()
        }
    }
}

/// A configured target that will not be crawled
#[derive(Debug)]
pub struct UnroutedTarget {
    pub url: String,
    pub reason: SweepError,
}

/// The game's targets after routing and filtering
#[derive(Debug, Default)]
pub struct TargetPlan {
    pub routed: Vec<SourceTarget>,
    pub unrouted: Vec<UnroutedTarget>,
}

/// Routes a game's configured targets and applies the source filter
///
/// Unroutable targets only survive the filter on a URL match, since they
/// have no family to match by name.
pub fn plan_targets(game_id: &str, game: &GameConfig, filter: Option<&str>) -> TargetPlan {
    let mut plan = TargetPlan::default();
    for raw in &game.targets {
        let family = Url::parse(raw.trim()).ok().as_ref().and_then(route);
        if let Some(filter) = filter {
            if !matches_source_filter(filter, family, raw) {
                continue;
            }
        }
        match route_target(raw, game_id) {
            Ok(target) => plan.routed.push(target),
            Err(reason) => plan.unrouted.push(UnroutedTarget {
                url: raw.clone(),
                reason,
            }),
        }
    }
    plan
}

/// How one target ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    Completed(Discovery),
    Failed(String),
}

/// Result of one target within a run
#[derive(Debug, Clone)]
pub struct TargetReport {
    pub url: String,
    pub family: SiteFamily,
    pub outcome: TargetOutcome,
    pub tally: SinkTally,
}

impl TargetReport {
    pub fn failed(&self) -> bool {
        matches!(self.outcome, TargetOutcome::Failed(_))
    }
}

/// Everything a finished run produced
#[derive(Debug)]
pub struct RunSummary {
    pub run_id: i64,
    pub cutoff: DateTime<Utc>,
    pub targets: Vec<TargetReport>,
    pub unrouted: Vec<UnroutedTarget>,
    pub totals: RunTotals,
}

/// Main crawl orchestrator
pub struct Orchestrator<'a> {
    config: &'a Config,
    store: Box<dyn ContentStore>,
    ledger: BackupLedger,
    pacer: Pacer,
    auth_policy: AuthPolicy,
    sessions: HashMap<SiteFamily, SessionStatus>,
    now: DateTime<Utc>,
}

impl<'a> Orchestrator<'a> {
    /// Creates an orchestrator writing to `store` and `ledger`
    ///
    /// The run's clock is fixed at creation; use `with_now` to pin it.
    pub fn new(config: &'a Config, store: Box<dyn ContentStore>, ledger: BackupLedger) -> Self {
        Self {
            config,
            store,
            ledger,
            pacer: Pacer::from(&config.pacing),
            auth_policy: AuthPolicy::from(&config.auth),
            sessions: HashMap::new(),
            now: Utc::now(),
        }
    }

    /// Pins the run start used for the cutoff and relative dates
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Replaces the configured pacing
    pub fn with_pacer(mut self, pacer: Pacer) -> Self {
        self.pacer = pacer;
        self
    }

    /// Session status of every family touched so far
    pub fn sessions(&self) -> &HashMap<SiteFamily, SessionStatus> {
        &self.sessions
    }

    /// Runs one game's crawl on `browser`
    ///
    /// # Arguments
    ///
    /// * `browser` - The run's single browser context
    /// * `request` - Game, optional lookback override and source filter
    ///
    /// # Returns
    ///
    /// * `Ok(RunSummary)` - The run finished; individual targets may have failed
    /// * `Err(SweepError)` - Unknown game, lookback out of range, or the run
    ///   record could not be written (the run is then marked failed if possible)
    pub async fn run(
        &mut self,
        browser: &mut dyn BrowserSession,
        request: &CrawlRequest,
    ) -> Result<RunSummary> {
        let config = self.config;
        let game = config
            .game(&request.game_id)
            .ok_or_else(|| SweepError::UnknownGame(request.game_id.clone()))?;

        let plan = plan_targets(&request.game_id, game, request.source_filter.as_deref());
        for skipped in &plan.unrouted {
            tracing::warn!("Skipping target {}: {}", skipped.url, skipped.reason);
        }

        let lookback_days = request.days.unwrap_or(game.lookback_days);
        validate_lookback(lookback_days)?;
        let cutoff = ChronoDuration::try_days(i64::from(lookback_days))
            .and_then(|span| self.now.checked_sub_signed(span))
            .ok_or_else(|| {
                ConfigError::Validation(format!(
                    "lookback of {} days reaches before the earliest representable date",
                    lookback_days
                ))
            })?;
        let ctx = AdapterContext {
            game_id: request.game_id.clone(),
            cutoff,
            now: self.now,
            lookback_days,
            limits: config.pagination.clone(),
            pacer: self.pacer,
        };

        let run_id = self.store.create_run(&request.game_id, self.now, cutoff)?;
        tracing::info!(
            "Starting run {} for {} ({} targets, last {} days, since {})",
            run_id,
            game.display_name,
            plan.routed.len(),
            lookback_days,
            cutoff.format("%Y-%m-%d")
        );

        let mut totals = RunTotals {
            targets_total: plan.routed.len() as u32,
            ..RunTotals::default()
        };
        let mut reports = Vec::with_capacity(plan.routed.len());

        for (i, target) in plan.routed.iter().enumerate() {
            if i > 0 {
                self.pacer.pause().await;
            }
            tracing::info!(
                "Target {}/{}: {} ({})",
                i + 1,
                plan.routed.len(),
                target.url,
                target.family
            );

            let report = self.run_target(browser, target, &ctx).await;
            match &report.outcome {
                TargetOutcome::Completed(discovery) => tracing::info!(
                    "Finished {}: {} items seen, {} new, {} already stored ({})",
                    target.url,
                    report.tally.seen,
                    report.tally.inserted,
                    report.tally.duplicate,
                    discovery
                        .stop
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "done".to_string())
                ),
                TargetOutcome::Failed(reason) => {
                    tracing::error!("Target {} failed: {}", target.url, reason);
                    totals.targets_failed += 1;
                }
            }
            totals.records_inserted += report.tally.inserted;
            totals.records_duplicate += report.tally.duplicate;
            reports.push(report);
        }

        if let Err(e) = self
            .store
            .finish_run(run_id, RunStatus::Completed, &totals, Utc::now())
        {
            tracing::error!("Failed to complete run {}: {}", run_id, e);
            if let Err(mark) = self
                .store
                .finish_run(run_id, RunStatus::Failed, &totals, Utc::now())
            {
                tracing::warn!("Could not mark run {} failed: {}", run_id, mark);
            }
            return Err(e.into());
        }
        tracing::info!(
            "Run {} completed: {}/{} targets ok, {} new records, {} already stored",
            run_id,
            totals.targets_total - totals.targets_failed,
            totals.targets_total,
            totals.records_inserted,
            totals.records_duplicate
        );

        Ok(RunSummary {
            run_id,
            cutoff,
            targets: reports,
            unrouted: plan.unrouted,
            totals,
        })
    }

    /// Crawls one target in its own tab; never fails the run
    async fn run_target(
        &mut self,
        browser: &mut dyn BrowserSession,
        target: &SourceTarget,
        ctx: &AdapterContext,
    ) -> TargetReport {
        let mut report = TargetReport {
            url: target.url.to_string(),
            family: target.family,
            outcome: TargetOutcome::Failed(String::new()),
            tally: SinkTally::default(),
        };

        let mut page = match browser.new_page().await {
            Ok(page) => page,
            Err(e) => {
                report.outcome = TargetOutcome::Failed(format!("could not open a tab: {}", e));
                return report;
            }
        };

        self.ensure_session(page.as_mut(), target.family).await;

        let (outcome, tally) = self.discover(page.as_mut(), target, ctx).await;
        report.outcome = outcome;
        report.tally = tally;

        if let Err(e) = page.close().await {
            tracing::debug!("Closing tab for {} failed: {}", target.url, e);
        }
        report
    }

    /// Runs discovery under the time budget with panics caught
    async fn discover(
        &mut self,
        page: &mut dyn PageDriver,
        target: &SourceTarget,
        ctx: &AdapterContext,
    ) -> (TargetOutcome, SinkTally) {
        let adapter = Adapter::for_family(target.family);
        let budget = Duration::from_secs(self.config.pacing.target_timeout_secs);
        let mut sink = RecordSink::new(
            adapter,
            ctx,
            target.url.as_str(),
            self.store.as_mut(),
            &mut self.ledger,
        );

        let guarded = AssertUnwindSafe(adapter.discover_items(page, target, ctx, &mut sink))
            .catch_unwind();
        let outcome = match tokio::time::timeout(budget, guarded).await {
            Ok(Ok(Ok(discovery))) => TargetOutcome::Completed(discovery),
            Ok(Ok(Err(e))) => TargetOutcome::Failed(e.to_string()),
            Ok(Err(panic)) => {
                TargetOutcome::Failed(format!("adapter panicked: {}", panic_message(&*panic)))
            }
            Err(_) => TargetOutcome::Failed(
                SweepError::TargetTimeout {
                    url: target.url.to_string(),
                    seconds: budget.as_secs(),
                }
                .to_string(),
            ),
        };
        (outcome, sink.tally())
    }

    /// Authenticates `family` unless it was already settled this run
    ///
    /// Any login error degrades the family to guest access.
    async fn ensure_session(&mut self, page: &mut dyn PageDriver, family: SiteFamily) {
        let Some(flow) = Adapter::for_family(family).login_flow() else {
            return;
        };
        if self.sessions.get(&family).is_some_and(|s| s.is_settled()) {
            return;
        }

        let credentials = self.config.credentials_for(family);
        let status = match authenticate(page, family, flow, credentials.as_ref(), &self.auth_policy)
            .await
        {
            Ok(outcome) => outcome
                .state
                .session_status()
                .unwrap_or(SessionStatus::GuestFallback),
            Err(e) => {
                tracing::warn!("{} login failed: {}; continuing as guest", family, e);
                SessionStatus::GuestFallback
            }
        };
        tracing::info!("{} session: {}", family, status);
        self.sessions.insert(family, status);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
