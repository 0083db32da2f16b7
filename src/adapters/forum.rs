//! Board-index crawler shared by the forum adapters
//!
//! A forum target is a board index split into numbered pages. Index pages
//! are walked to collect thread links until the paginator stops; each
//! thread is then opened in turn and all of its posts are pushed to the
//! sink as one batch, the first post as the thread root.

use super::html::{fragments, with_document};
use super::{
    AdapterContext, Discovery, ItemHandle, ItemSink, OrderingAssumption, PostRole, StopReason,
};
use crate::browser::PageDriver;
use crate::record::{ItemContext, SourceTarget};
use crate::{Result, SweepError};
use chrono::{DateTime, Utc};
use scraper::ElementRef;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// How long an operator gets to clear an interstitial on an index page
const INTERSTITIAL_WAIT: Duration = Duration::from_secs(60);

/// A thread found on a board index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadLink {
    pub title: String,
    pub url: String,

    /// Last activity shown on the index row, when the board shows one
    pub last_activity: Option<DateTime<Utc>>,
}

/// Shape of one forum family
pub struct ForumSpec {
    /// Family name for log lines
    pub name: &'static str,

    /// Selectors that show the index rendered; the first one is waited for
    pub listing: &'static [&'static str],

    pub listing_wait: Duration,

    /// Page title of a bot-check interstitial worth waiting out
    pub interstitial: Option<&'static str>,

    /// URL of the zero-based `n`th index page
    pub index_page: fn(&Url, u32) -> Url,

    /// Thread links on one parsed index page
    pub threads: fn(ElementRef<'_>, &AdapterContext) -> Vec<ThreadLink>,

    /// Selector of one post inside a thread
    pub post: &'static str,

    pub post_wait: Duration,
}

/// Walks the board index, then every collected thread
///
/// # Returns
///
/// * `Ok(Discovery)` - Threads visited and posts pushed; `stop` is why the
///   index walk ended
/// * `Err(SweepError)` - The first index page failed to load or never
///   showed a listing
pub async fn crawl_forum(
    page: &mut dyn PageDriver,
    spec: &ForumSpec,
    target: &SourceTarget,
    ctx: &AdapterContext,
    sink: &mut dyn ItemSink,
) -> Result<Discovery> {
    let (threads, stop) = collect_threads(page, spec, target, ctx).await?;
    info!(
        "{}: {} threads collected from {} ({})",
        spec.name,
        threads.len(),
        target.url,
        stop
    );

    let mut discovery = Discovery {
        stop: Some(stop),
        ..Discovery::default()
    };

    let total = threads.len();
    for (i, thread) in threads.iter().enumerate() {
        if thread.last_activity.is_some_and(|ts| ts < ctx.cutoff) {
            debug!("{}: thread '{}' has no activity since the cutoff", spec.name, thread.title);
            continue;
        }

        info!("{}: ({}/{}) {}", spec.name, i + 1, total, thread.title);
        ctx.pacer.pause().await;
        match visit_thread(page, spec, thread, sink).await {
            Ok(posts) => {
                debug!("{}: {} posts in {}", spec.name, posts, thread.url);
                discovery.items += posts;
                discovery.threads += 1;
            }
            Err(e) => warn!("{}: skipping thread {}: {}", spec.name, thread.url, e),
        }
    }

    Ok(discovery)
}

/// Loads one index page; `Ok(false)` when no listing ever rendered
async fn load_index(page: &mut dyn PageDriver, spec: &ForumSpec, url: &Url) -> Result<bool> {
    page.goto(url.as_str()).await?;

    let Some(primary) = spec.listing.first() else {
        return Ok(true);
    };
    if page.wait_for(primary, spec.listing_wait).await? {
        return Ok(true);
    }

    if let Some(interstitial) = spec.interstitial {
        if page.title().await?.contains(interstitial) {
            warn!(
                "{}: bot check on {}; waiting up to {}s for it to clear",
                spec.name,
                url,
                INTERSTITIAL_WAIT.as_secs()
            );
            if page.wait_for(primary, INTERSTITIAL_WAIT).await? {
                return Ok(true);
            }
        }
    }

    for fallback in &spec.listing[1..] {
        if page.count(fallback).await? > 0 {
            debug!("{}: listing found via {}", spec.name, fallback);
            return Ok(true);
        }
    }
    Ok(false)
}

async fn collect_threads(
    page: &mut dyn PageDriver,
    spec: &ForumSpec,
    target: &SourceTarget,
    ctx: &AdapterContext,
) -> Result<(Vec<ThreadLink>, StopReason)> {
    let mut paginator = ctx.thread_paginator(OrderingAssumption::Loose);
    let mut threads: Vec<ThreadLink> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut index = 0;

    let stop = loop {
        let url = (spec.index_page)(&target.url, index);
        match load_index(page, spec, &url).await {
            Ok(true) => {}
            Ok(false) if index == 0 => {
                return Err(SweepError::MissingStructure {
                    url: url.to_string(),
                    what: format!("{} board listing", spec.name),
                });
            }
            Err(e) if index == 0 => return Err(e),
            Ok(false) => {
                info!("{}: no listing on index page {}; stopping", spec.name, index + 1);
                break StopReason::Stalled;
            }
            Err(e) => {
                warn!("{}: index page {} failed: {}", spec.name, index + 1, e);
                break StopReason::Stalled;
            }
        }

        let html = page.content().await?;
        let found = with_document(&html, |root| (spec.threads)(root, ctx));
        for thread in found {
            if threads.len() >= paginator.max_items() {
                break;
            }
            if seen.insert(thread.url.clone()) {
                threads.push(thread);
            }
        }

        let dates: Vec<_> = threads.iter().map(|t| t.last_activity).collect();
        if let Some(reason) = paginator.observe(threads.len(), &dates) {
            break reason;
        }

        index += 1;
        ctx.pacer.pause().await;
    };

    Ok((threads, stop))
}

/// Opens one thread and pushes all of its posts as one batch
async fn visit_thread(
    page: &mut dyn PageDriver,
    spec: &ForumSpec,
    thread: &ThreadLink,
    sink: &mut dyn ItemSink,
) -> Result<usize> {
    page.goto(&thread.url).await?;
    if !page.wait_for(spec.post, spec.post_wait).await? {
        return Err(SweepError::MissingStructure {
            url: thread.url.clone(),
            what: "posts".to_string(),
        });
    }

    let html = page.content().await?;
    let context = ItemContext {
        title: thread.title.clone(),
        url: thread.url.clone(),
    };
    let batch: Vec<ItemHandle> = fragments(&html, spec.post)
        .into_iter()
        .enumerate()
        .map(|(i, fragment)| ItemHandle {
            fragment,
            context: Some(context.clone()),
            role: if i == 0 { PostRole::Root } else { PostRole::Reply },
        })
        .collect();

    let posts = batch.len();
    sink.accept(batch);
    Ok(posts)
}
