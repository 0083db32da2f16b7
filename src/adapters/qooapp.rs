//! QooApp game reviews
//!
//! A game page only previews a few reviews behind a "view more" link; the
//! full comment list (`/app-comment/...`) is an infinite-scroll feed.

use super::feed::{scroll_feed, FeedSpec};
use super::html::{first_text, with_fragment};
use super::{AdapterContext, Discovery, ItemSink, OrderingAssumption};
use crate::browser::PageDriver;
use crate::record::{RecordDraft, SourceTarget};
use crate::Result;
use scraper::ElementRef;
use std::time::Duration;
use tracing::{debug, info};

const ITEM: &str = ".comment";
const AUTHOR: &str = ".username";
const CONTENT: &str = ".comment-content-box";
const SCORE: &str = ".score";
const TIME: &str = ".time";
const VIEW_MORE: &str = ".game-review__content__more";

const FEED: FeedSpec = FeedSpec {
    item: ITEM,
    expanders: &[],
    date_text,
};

fn date_text(item: ElementRef<'_>) -> Option<String> {
    first_text(item, TIME)
}

pub(super) async fn discover(
    page: &mut dyn PageDriver,
    target: &SourceTarget,
    ctx: &AdapterContext,
    sink: &mut dyn ItemSink,
) -> Result<Discovery> {
    info!("Scrolling QooApp reviews at {}", target.url);
    page.goto(target.url.as_str()).await?;
    ctx.pacer.pause().await;

    if !target.url.as_str().contains("app-comment") {
        if page.wait_for(VIEW_MORE, Duration::from_secs(5)).await? && page.click(VIEW_MORE).await? {
            debug!("Opened the full review list");
            ctx.pacer.pause().await;
        } else {
            debug!("No 'view more' link; reading the reviews on the game page");
        }
    }

    let paginator = ctx.paginator(OrderingAssumption::ReverseChronological);
    scroll_feed(page, &FEED, paginator, ctx, None, sink).await
}

pub(super) fn draft(fragment: &str) -> RecordDraft {
    with_fragment(fragment, |root| RecordDraft {
        author: first_text(root, AUTHOR),
        rating: first_text(root, SCORE).and_then(|s| s.parse::<f64>().ok()),
        content: first_text(root, CONTENT),
        raw_date_text: date_text(root),
        context: None,
    })
}
