//! Infinite-scroll feed driver shared by the feed-style adapters

use super::html::{select_all, with_document};
use super::{AdapterContext, Discovery, ItemHandle, ItemSink, Paginator, PostRole};
use crate::browser::PageDriver;
use crate::date::normalize_at;
use crate::record::ItemContext;
use crate::Result;
use chrono::{DateTime, Utc};
use scraper::ElementRef;
use std::time::Duration;
use tracing::{debug, info};

/// How long to wait for the first feed item to render
pub const FIRST_ITEM_WAIT: Duration = Duration::from_secs(15);

/// Something to click or run each round to reveal hidden items
#[derive(Debug, Clone, Copy)]
pub enum Expander {
    /// Click the first element matching a selector, when present
    Click(&'static str),

    /// Run a script (for buttons only findable by their text)
    Script(&'static str),
}

/// Shape of one scrollable feed
#[derive(Clone, Copy)]
pub struct FeedSpec {
    /// Selector of one feed item
    pub item: &'static str,

    pub expanders: &'static [Expander],

    /// Date text of one item, if it shows one
    pub date_text: fn(ElementRef<'_>) -> Option<String>,
}

/// Item fragments and normalized dates in one snapshot
fn snapshot(html: &str, spec: &FeedSpec, now: DateTime<Utc>) -> Vec<(String, Option<DateTime<Utc>>)> {
    with_document(html, |root| {
        select_all(root, spec.item)
            .into_iter()
            .map(|el| {
                let date = (spec.date_text)(el).and_then(|text| normalize_at(&text, now).timestamp);
                (el.html(), date)
            })
            .collect()
    })
}

/// Scrolls a feed until the paginator stops it, pushing new items as they appear
///
/// Items are pushed in page order, each at most once. The page must already
/// show the feed.
///
/// # Arguments
///
/// * `page` - Tab showing the feed
/// * `spec` - Item selector, expanders and date reader
/// * `paginator` - Stopping conditions for this feed
/// * `ctx` - Run context (pacing, `now`)
/// * `context` - Thread or video context attached to every handle
/// * `sink` - Receives each batch of newly revealed items
pub async fn scroll_feed(
    page: &mut dyn PageDriver,
    spec: &FeedSpec,
    mut paginator: Paginator,
    ctx: &AdapterContext,
    context: Option<ItemContext>,
    sink: &mut dyn ItemSink,
) -> Result<Discovery> {
    if !page.wait_for(spec.item, FIRST_ITEM_WAIT).await? {
        debug!("No {} items rendered yet", spec.item);
    }

    let mut emitted = 0;
    let stop = loop {
        for expander in spec.expanders {
            match expander {
                Expander::Click(selector) => {
                    if page.count(selector).await? > 0 && page.click(selector).await? {
                        debug!("Clicked expander {}", selector);
                        ctx.pacer.pause().await;
                    }
                }
                Expander::Script(script) => page.evaluate(script).await?,
            }
        }

        let html = page.content().await?;
        let items = snapshot(&html, spec, ctx.now);
        let total = items.len().min(paginator.max_items());

        if total > emitted {
            let batch = items[emitted..total]
                .iter()
                .map(|(fragment, _)| ItemHandle {
                    fragment: fragment.clone(),
                    context: context.clone(),
                    role: PostRole::Standalone,
                })
                .collect();
            sink.accept(batch);
            emitted = total;
        }

        let dates: Vec<_> = items[..total].iter().map(|(_, date)| *date).collect();
        if let Some(reason) = paginator.observe(total, &dates) {
            break reason;
        }

        page.scroll_to_bottom().await?;
        ctx.pacer.pause().await;
    };

    info!(
        "Feed {} stopped ({}) after {} rounds with {} items",
        spec.item,
        stop,
        paginator.attempts(),
        emitted
    );

    Ok(Discovery {
        items: emitted,
        threads: 0,
        stop: Some(stop),
    })
}
