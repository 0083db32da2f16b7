//! YouTube channel comments
//!
//! The channel's `/videos` grid is scrolled until a video older than the
//! cutoff shows up; every recent video is then opened on a second tab and
//! its comment section scrolled. Comments default to "Top" order, so the
//! comment feed uses loose ordering and a short stall limit.

use super::feed::{scroll_feed, FeedSpec};
use super::html::{first, first_attr, first_text, select_all, text_of, with_fragment};
use super::{AdapterContext, Discovery, ItemHandle, ItemSink, OrderingAssumption};
use crate::browser::PageDriver;
use crate::date::normalize_at;
use crate::record::{ItemContext, RecordDraft, SourceTarget};
use crate::url::resolve_href;
use crate::Result;
use scraper::ElementRef;
use tracing::{debug, info, warn};
use url::Url;

const VIDEO: &str = "ytd-rich-item-renderer";
const VIDEO_LINK: &str = "a#video-title-link";
const VIDEO_META: &str = "#metadata-line span";

const COMMENT: &str = "ytd-comment-thread-renderer";
const COMMENT_AUTHOR: &str = "#author-text span";
const COMMENT_AUTHOR_FALLBACK: &str = "#author-text";
const COMMENT_CONTENT: &str = "#content-text";
const COMMENT_TIME: &str = "#published-time-text a";

const GRID_MAX_SCROLLS: u32 = 20;
const COMMENT_MAX_SCROLLS: u32 = 10;
const COMMENT_STALL_LIMIT: u32 = 4;

/// Brings the comment section into view so it starts loading
const SCROLL_TO_COMMENTS: &str = "window.scrollTo(0, 600)";

const GRID: FeedSpec = FeedSpec {
    item: VIDEO,
    expanders: &[],
    date_text: video_date_text,
};

const COMMENTS: FeedSpec = FeedSpec {
    item: COMMENT,
    expanders: &[],
    date_text: comment_date_text,
};

/// The "N days ago" span of a video's metadata line
fn video_date_text(item: ElementRef<'_>) -> Option<String> {
    select_all(item, VIDEO_META)
        .into_iter()
        .map(|span| text_of(span).to_lowercase())
        .find(|text| text.contains("ago") || text.contains('前'))
}

fn comment_date_text(item: ElementRef<'_>) -> Option<String> {
    first_text(item, COMMENT_TIME)
}

/// `https://www.youtube.com/@channel` → `.../@channel/videos`
fn videos_tab(url: &Url) -> String {
    let raw = url.as_str();
    if raw.contains("/@") && !raw.contains("/videos") {
        format!("{}/videos", raw.trim_end_matches('/'))
    } else {
        raw.to_string()
    }
}

/// One video to drill into
#[derive(Debug, Clone, PartialEq, Eq)]
struct Video {
    title: String,
    url: String,
}

/// Videos in the grid that are not older than the cutoff
fn recent_videos(grid: &[ItemHandle], ctx: &AdapterContext) -> Vec<Video> {
    let base = Url::parse("https://www.youtube.com/").ok();
    grid.iter()
        .filter_map(|handle| {
            with_fragment(&handle.fragment, |root| {
                let date = video_date_text(root).and_then(|text| normalize_at(&text, ctx.now).timestamp);
                if date.is_some_and(|ts| ts < ctx.cutoff) {
                    return None;
                }
                let link = first(root, VIDEO_LINK)?;
                let href = link.value().attr("href")?;
                let url = resolve_href(base.as_ref()?, href)?;
                let title = first_attr(root, VIDEO_LINK, "title")
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| "Unknown".to_string());
                Some(Video { title, url })
            })
        })
        .collect()
}

pub(super) async fn discover(
    page: &mut dyn PageDriver,
    target: &SourceTarget,
    ctx: &AdapterContext,
    sink: &mut dyn ItemSink,
) -> Result<Discovery> {
    let grid_url = videos_tab(&target.url);
    info!("Scanning YouTube videos at {}", grid_url);
    page.goto(&grid_url).await?;
    ctx.pacer.pause().await;

    let mut grid: Vec<ItemHandle> = Vec::new();
    let paginator = ctx.bounded_paginator(
        OrderingAssumption::ReverseChronological,
        GRID_MAX_SCROLLS,
        ctx.limits.stall_limit,
    );
    let grid_scan = scroll_feed(page, &GRID, paginator, ctx, None, &mut grid).await?;

    let mut videos = recent_videos(&grid, ctx);
    videos.truncate(ctx.limits.max_threads);
    info!(
        "{} of {} videos on the channel are recent enough to visit",
        videos.len(),
        grid.len()
    );

    let mut discovery = Discovery {
        stop: grid_scan.stop,
        ..Discovery::default()
    };
    if videos.is_empty() {
        return Ok(discovery);
    }

    let mut tab = page.open_sibling().await?;
    for video in &videos {
        info!("Reading comments on '{}' ({})", video.title, video.url);
        match video_comments(tab.as_mut(), video, ctx, sink).await {
            Ok(found) => {
                debug!("{} comments from {}", found.items, video.url);
                discovery.absorb(found);
            }
            Err(e) => warn!("Skipping video {}: {}", video.url, e),
        }
        discovery.threads += 1;
        ctx.pacer.pause().await;
    }
    if let Err(e) = tab.close().await {
        debug!("Closing the video tab failed: {}", e);
    }

    Ok(discovery)
}

async fn video_comments(
    tab: &mut dyn PageDriver,
    video: &Video,
    ctx: &AdapterContext,
    sink: &mut dyn ItemSink,
) -> Result<Discovery> {
    tab.goto(&video.url).await?;
    ctx.pacer.pause().await;
    tab.evaluate(SCROLL_TO_COMMENTS).await?;
    ctx.pacer.pause().await;

    let context = ItemContext {
        title: video.title.clone(),
        url: video.url.clone(),
    };
    let paginator =
        ctx.bounded_paginator(OrderingAssumption::Loose, COMMENT_MAX_SCROLLS, COMMENT_STALL_LIMIT);
    scroll_feed(tab, &COMMENTS, paginator, ctx, Some(context), sink).await
}

pub(super) fn draft(fragment: &str) -> RecordDraft {
    with_fragment(fragment, |root| RecordDraft {
        author: first_text(root, COMMENT_AUTHOR).or_else(|| first_text(root, COMMENT_AUTHOR_FALLBACK)),
        rating: None,
        content: first_text(root, COMMENT_CONTENT),
        raw_date_text: comment_date_text(root),
        context: None,
    })
}
