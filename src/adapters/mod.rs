//! Source adapters
//!
//! One `Adapter` variant per site family. Every variant implements the same
//! two-step contract:
//!
//! - `discover_items` drives the site's pagination on a live page and pushes
//!   batches of `ItemHandle`s (outer HTML of each item plus its thread or
//!   video context) into an `ItemSink` as they are revealed
//! - `extract` turns one handle into a `ContentRecord`, or a skip, without
//!   touching the browser
//!
//! Variants own their selectors and navigation; they share only the date
//! normalizer, the `Paginator`, the HTML helpers in `html` and the feed
//! scroller in `feed`.

mod bahamut;
mod discord;
mod feed;
mod forum;
pub mod html;
pub mod pagination;
mod qooapp;
mod taptap;
mod tieba;
mod youtube;

pub use pagination::{OrderingAssumption, Paginator, StopReason};

use crate::auth::LoginFlow;
use crate::browser::PageDriver;
use crate::config::PaginationConfig;
use crate::crawler::Pacer;
use crate::date::normalize_at;
use crate::record::{ContentRecord, ItemContext, RecordDraft, SiteFamily, SourceTarget};
use crate::Result;
use chrono::{DateTime, Utc};
use std::fmt;
use tracing::debug;

/// Lookback beyond which a crawl counts as a deep backfill
pub const DEEP_CRAWL_DAYS: u32 = 365;

/// Position of an item within a thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostRole {
    /// Feed entry or comment with no thread structure
    Standalone,

    /// Opening post of a thread
    Root,

    /// Any later post in a thread
    Reply,
}

impl PostRole {
    /// Content prefix marking root posts and replies
    pub fn prefix(&self) -> Option<&'static str> {
        match self {
            Self::Standalone => None,
            Self::Root => Some("【发帖】"),
            Self::Reply => Some("【跟帖】"),
        }
    }
}

/// One discovered item, detached from the live page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemHandle {
    /// Outer HTML of the item element
    pub fragment: String,

    /// Thread or video the item was found under
    pub context: Option<ItemContext>,

    pub role: PostRole,
}

impl ItemHandle {
    pub fn standalone(fragment: String) -> Self {
        Self {
            fragment,
            context: None,
            role: PostRole::Standalone,
        }
    }
}

/// Receiver of discovered item batches
pub trait ItemSink: Send {
    fn accept(&mut self, batch: Vec<ItemHandle>);
}

impl ItemSink for Vec<ItemHandle> {
    fn accept(&mut self, batch: Vec<ItemHandle>) {
        self.extend(batch);
    }
}

/// What to do with items whose date could not be read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndatedPolicy {
    Keep,
    Skip,
}

/// Why an item produced no record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingContent,
    BeforeCutoff,
    Undated,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::MissingContent => "missing content",
            Self::BeforeCutoff => "before cutoff",
            Self::Undated => "undated",
        };
        write!(f, "{}", s)
    }
}

/// Result of extracting one item
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Record(ContentRecord),
    Skipped(SkipReason),
}

/// Per-invocation inputs shared by every adapter
#[derive(Debug, Clone)]
pub struct AdapterContext {
    pub game_id: String,

    /// Run-wide cutoff; nothing dated before it is kept
    pub cutoff: DateTime<Utc>,

    /// Run start, used to resolve relative dates and stamp ingestion
    pub now: DateTime<Utc>,

    pub lookback_days: u32,
    pub limits: PaginationConfig,
    pub pacer: Pacer,
}

impl AdapterContext {
    pub fn paginator(&self, ordering: OrderingAssumption) -> Paginator {
        Paginator::new(self.cutoff, ordering, &self.limits)
    }

    /// Paginator with tighter attempt and stall limits than the configured ones
    pub fn bounded_paginator(
        &self,
        ordering: OrderingAssumption,
        max_attempts: u32,
        stall_limit: u32,
    ) -> Paginator {
        let limits = PaginationConfig {
            max_attempts: self.limits.max_attempts.min(max_attempts),
            stall_limit: self.limits.stall_limit.min(stall_limit),
            ..self.limits.clone()
        };
        Paginator::new(self.cutoff, ordering, &limits)
    }

    /// Paginator for forum indices: the item ceiling is the thread ceiling
    pub fn thread_paginator(&self, ordering: OrderingAssumption) -> Paginator {
        let limits = PaginationConfig {
            max_items: self.limits.max_threads,
            ..self.limits.clone()
        };
        Paginator::new(self.cutoff, ordering, &limits)
    }

    pub fn is_deep_crawl(&self) -> bool {
        self.lookback_days > DEEP_CRAWL_DAYS
    }
}

/// Summary of one discovery pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    /// Item handles pushed to the sink
    pub items: usize,

    /// Threads, videos or cards visited
    pub threads: usize,

    /// Why the outermost listing stopped paginating
    pub stop: Option<StopReason>,
}

impl Discovery {
    /// Adds the item and thread counts of a nested pass
    fn absorb(&mut self, other: Discovery) {
        self.items += other.items;
        self.threads += other.threads;
    }
}

/// Closed set of site adapters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Adapter {
    TapTapCn,
    TapTapIntl,
    QooApp,
    YouTube,
    Bahamut,
    Tieba,
    Discord,
}

impl Adapter {
    pub fn for_family(family: SiteFamily) -> Self {
        match family {
            SiteFamily::TapTapCn => Self::TapTapCn,
            SiteFamily::TapTapIntl => Self::TapTapIntl,
            SiteFamily::QooApp => Self::QooApp,
            SiteFamily::YouTube => Self::YouTube,
            SiteFamily::Bahamut => Self::Bahamut,
            SiteFamily::Tieba => Self::Tieba,
            SiteFamily::Discord => Self::Discord,
        }
    }

    pub fn family(&self) -> SiteFamily {
        match self {
            Self::TapTapCn => SiteFamily::TapTapCn,
            Self::TapTapIntl => SiteFamily::TapTapIntl,
            Self::QooApp => SiteFamily::QooApp,
            Self::YouTube => SiteFamily::YouTube,
            Self::Bahamut => SiteFamily::Bahamut,
            Self::Tieba => SiteFamily::Tieba,
            Self::Discord => SiteFamily::Discord,
        }
    }

    /// Login this adapter needs before discovery, if any
    pub fn login_flow(&self) -> Option<&'static LoginFlow> {
        LoginFlow::for_family(self.family())
    }

    /// Documented ordering of the adapter's outermost listing
    pub fn ordering(&self) -> OrderingAssumption {
        match self {
            Self::TapTapCn | Self::TapTapIntl | Self::QooApp | Self::YouTube => {
                OrderingAssumption::ReverseChronological
            }
            Self::Bahamut | Self::Tieba | Self::Discord => OrderingAssumption::Loose,
        }
    }

    pub fn undated_policy(&self, ctx: &AdapterContext) -> UndatedPolicy {
        match self {
            Self::Discord if !ctx.is_deep_crawl() => UndatedPolicy::Skip,
            _ => UndatedPolicy::Keep,
        }
    }

    /// Paginates the target and pushes item handles into `sink`
    ///
    /// # Arguments
    ///
    /// * `page` - Tab to drive; the adapter navigates it to the target itself
    /// * `target` - Target being crawled
    /// * `ctx` - Cutoff, limits and pacing for this run
    /// * `sink` - Receives item batches as they are revealed
    ///
    /// # Returns
    ///
    /// * `Ok(Discovery)` - Pagination ended on one of its stopping conditions
    /// * `Err(SweepError)` - The target could not be loaded or lacks its listing
    pub async fn discover_items(
        &self,
        page: &mut dyn PageDriver,
        target: &SourceTarget,
        ctx: &AdapterContext,
        sink: &mut dyn ItemSink,
    ) -> Result<Discovery> {
        match self {
            Self::TapTapCn => taptap::discover_cn(page, target, ctx, sink).await,
            Self::TapTapIntl => taptap::discover_intl(page, target, ctx, sink).await,
            Self::QooApp => qooapp::discover(page, target, ctx, sink).await,
            Self::YouTube => youtube::discover(page, target, ctx, sink).await,
            Self::Bahamut => bahamut::discover(page, target, ctx, sink).await,
            Self::Tieba => tieba::discover(page, target, ctx, sink).await,
            Self::Discord => discord::discover(page, target, ctx, sink).await,
        }
    }

    /// Raw fields of one item, before sentinels and cutoff rules
    pub fn draft(&self, fragment: &str) -> RecordDraft {
        match self {
            Self::TapTapCn => taptap::draft_cn(fragment),
            Self::TapTapIntl => taptap::draft_intl(fragment),
            Self::QooApp => qooapp::draft(fragment),
            Self::YouTube => youtube::draft(fragment),
            Self::Bahamut => bahamut::draft(fragment),
            Self::Tieba => tieba::draft(fragment),
            Self::Discord => discord::draft(fragment),
        }
    }

    /// Turns one handle into a record
    ///
    /// Missing author, rating and date fall back to their sentinels; missing
    /// content skips the item. Items dated before the cutoff are skipped, and
    /// undated items follow the adapter's `UndatedPolicy`.
    pub fn extract(&self, handle: &ItemHandle, ctx: &AdapterContext) -> Extraction {
        let mut draft = self.draft(&handle.fragment);

        let content = draft
            .content
            .take()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        let Some(content) = content else {
            debug!("{}: skipping item without content", self.family());
            return Extraction::Skipped(SkipReason::MissingContent);
        };
        draft.content = Some(match handle.role.prefix() {
            Some(prefix) => format!("{} {}", prefix, content),
            None => content,
        });

        if draft.context.is_none() {
            draft.context = handle.context.clone();
        }

        let date = normalize_at(draft.raw_date_text.as_deref().unwrap_or_default(), ctx.now);
        match date.timestamp {
            Some(ts) if ts < ctx.cutoff => {
                return Extraction::Skipped(SkipReason::BeforeCutoff);
            }
            None if self.undated_policy(ctx) == UndatedPolicy::Skip => {
                debug!("{}: skipping undated item", self.family());
                return Extraction::Skipped(SkipReason::Undated);
            }
            _ => {}
        }

        match ContentRecord::from_draft(draft, date, &ctx.game_id, self.family(), ctx.now) {
            Some(record) => Extraction::Record(record),
            None => Extraction::Skipped(SkipReason::MissingContent),
        }
    }
}

impl fmt::Display for Adapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.family())
    }
}
