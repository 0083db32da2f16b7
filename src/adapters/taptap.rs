//! TapTap review feeds (mainland and international sites)
//!
//! Both sites render reviews as an infinite-scroll list, newest first. The
//! mainland site folds low-quality reviews behind a "已收起" toggle that has
//! to be clicked for them to render; it shows the review date inline in the
//! card text rather than in a dedicated element.

use super::feed::{scroll_feed, Expander, FeedSpec};
use super::html::{first, first_text, select_all, text_of, with_fragment};
use super::{AdapterContext, Discovery, ItemSink, OrderingAssumption};
use crate::browser::PageDriver;
use crate::date::locate;
use crate::record::{RecordDraft, SourceTarget};
use crate::Result;
use scraper::ElementRef;
use tracing::info;

const CN_ITEM: &str = ".review-item__content";
const CN_AUTHOR: &str = ".user-name__text";
const CN_CONTENT: &str = "a[href*='/review/']";
const CN_STARS: &str = ".tap-stars";

/// Clicks the "collapsed reviews" toggle, which is only findable by its label
const CN_EXPAND_COLLAPSED: &str = r#"(() => {
    for (const btn of document.querySelectorAll('button')) {
        if (btn.innerText && btn.innerText.includes('已收起') && btn.offsetParent !== null) {
            btn.click();
            return true;
        }
    }
    return false;
})()"#;

const CN_FEED: FeedSpec = FeedSpec {
    item: CN_ITEM,
    expanders: &[
        Expander::Script(CN_EXPAND_COLLAPSED),
        Expander::Click("div[class*='switch-btn']"),
    ],
    date_text: cn_date_text,
};

const INTL_ITEM: &str = ".post-card";
const INTL_AUTHOR: &str = ".post-card__head-text span:first-child";
const INTL_CONTENT: &str = ".post-card__summary";
const INTL_DATE: &str = ".post-card__head-text .tap-time";
const INTL_STARS: &str = ".rating-star";
const INTL_ACTIVE_STAR: &str = ".rating-star__item--active";

const INTL_FEED: FeedSpec = FeedSpec {
    item: INTL_ITEM,
    expanders: &[],
    date_text: intl_date_text,
};

fn cn_date_text(item: ElementRef<'_>) -> Option<String> {
    locate(&text_of(item))
}

fn intl_date_text(item: ElementRef<'_>) -> Option<String> {
    first_text(item, INTL_DATE)
}

/// Star count inside `container`, or `None` when the card has no stars widget
fn star_rating(root: ElementRef<'_>, container: &str, star: &str) -> Option<f64> {
    let widget = first(root, container)?;
    Some(select_all(widget, star).len() as f64)
}

pub(super) async fn discover_cn(
    page: &mut dyn PageDriver,
    target: &SourceTarget,
    ctx: &AdapterContext,
    sink: &mut dyn ItemSink,
) -> Result<Discovery> {
    info!("Scrolling TapTap reviews at {}", target.url);
    page.goto(target.url.as_str()).await?;
    ctx.pacer.pause().await;

    let paginator = ctx.paginator(OrderingAssumption::ReverseChronological);
    scroll_feed(page, &CN_FEED, paginator, ctx, None, sink).await
}

pub(super) async fn discover_intl(
    page: &mut dyn PageDriver,
    target: &SourceTarget,
    ctx: &AdapterContext,
    sink: &mut dyn ItemSink,
) -> Result<Discovery> {
    info!("Scrolling TapTap international reviews at {}", target.url);
    page.goto(target.url.as_str()).await?;
    ctx.pacer.pause().await;

    let paginator = ctx.paginator(OrderingAssumption::ReverseChronological);
    scroll_feed(page, &INTL_FEED, paginator, ctx, None, sink).await
}

pub(super) fn draft_cn(fragment: &str) -> RecordDraft {
    with_fragment(fragment, |root| {
        let item = first(root, CN_ITEM).unwrap_or(root);
        let content = first_text(item, CN_CONTENT).or_else(|| Some(text_of(item)));
        RecordDraft {
            author: first_text(item, CN_AUTHOR),
            rating: star_rating(item, CN_STARS, "svg"),
            content,
            raw_date_text: cn_date_text(item),
            context: None,
        }
    })
}

pub(super) fn draft_intl(fragment: &str) -> RecordDraft {
    with_fragment(fragment, |root| RecordDraft {
        author: first_text(root, INTL_AUTHOR),
        rating: star_rating(root, INTL_STARS, INTL_ACTIVE_STAR),
        content: first_text(root, INTL_CONTENT),
        raw_date_text: intl_date_text(root),
        context: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::testing::{ctx, record, target};
    use crate::adapters::{Adapter, Extraction, ItemHandle, SkipReason, StopReason};
    use crate::browser::scripted::ScriptedBrowser;
    use crate::record::{SiteFamily, UNRATED};

    fn cn_card(author: &str, stars: usize, body: &str, date: &str) -> String {
        format!(
            r#"<div class="review-item__content">
                <div class="user-name"><span class="user-name__text">{}</span></div>
                <div class="tap-stars">{}</div>
                <a href="/review/123">{}</a>
                <span class="review-item__time">{}</span>
            </div>"#,
            author,
            "<svg></svg>".repeat(stars),
            body,
            date
        )
    }

    #[test]
    fn test_cn_extract() {
        let handle = ItemHandle::standalone(cn_card("小明", 4, "剧情很好", "2024/06/01"));
        let record = record(Adapter::TapTapCn.extract(&handle, &ctx(30)));
        assert_eq!(record.author, "小明");
        assert_eq!(record.rating, 4.0);
        assert_eq!(record.content, "剧情很好");
        assert_eq!(record.raw_date_text, "2024/06/01");
        assert_eq!(record.canonical_date, "2024-06-01");
        assert_eq!(record.source_name, "taptap");
    }

    #[test]
    fn test_cn_without_stars_is_unrated() {
        let fragment = r#"<div class="review-item__content">
            <span class="user-name__text">a</span><a href="/review/1">ok</a></div>"#;
        let record = record(Adapter::TapTapCn.extract(&ItemHandle::standalone(fragment.into()), &ctx(30)));
        assert_eq!(record.rating, UNRATED);
    }

    #[test]
    fn test_cn_falls_back_to_card_text() {
        let fragment = r#"<div class="review-item__content"><p>只有正文 3天前</p></div>"#;
        let record = record(Adapter::TapTapCn.extract(&ItemHandle::standalone(fragment.into()), &ctx(30)));
        assert_eq!(record.content, "只有正文 3天前");
        assert_eq!(record.canonical_date, "2024-06-12");
    }

    #[test]
    fn test_intl_extract() {
        let fragment = r#"<div class="post-card">
            <div class="post-card__head-text"><span>Rin</span><span class="tap-time">3 days ago</span></div>
            <div class="rating-star"><i class="rating-star__item--active"></i><i class="rating-star__item--active"></i><i></i></div>
            <div class="post-card__summary">Too many ads</div>
        </div>"#;
        let record = record(Adapter::TapTapIntl.extract(&ItemHandle::standalone(fragment.into()), &ctx(30)));
        assert_eq!(record.author, "Rin");
        assert_eq!(record.rating, 2.0);
        assert_eq!(record.content, "Too many ads");
        assert_eq!(record.raw_date_text, "3 days ago");
        assert_eq!(record.source_name, "taptap_intl");
    }

    #[test]
    fn test_intl_old_review_skipped() {
        let fragment = r#"<div class="post-card">
            <div class="post-card__head-text"><span>Rin</span><span class="tap-time">2 years ago</span></div>
            <div class="post-card__summary">old</div></div>"#;
        assert_eq!(
            Adapter::TapTapIntl.extract(&ItemHandle::standalone(fragment.into()), &ctx(30)),
            Extraction::Skipped(SkipReason::BeforeCutoff)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cn_discovery_scrolls_to_cutoff() {
        let url = "https://www.taptap.cn/app/1/review";
        let cards = [
            cn_card("a", 5, "one", "2024/06/14"),
            cn_card("b", 4, "two", "2024/06/01"),
            cn_card("c", 3, "three", "2024/01/01"),
            cn_card("d", 2, "four", "2023/12/01"),
        ];
        let page_of = move |n: usize| format!("<html><body>{}</body></html>", cards[..n].concat());

        let browser = ScriptedBrowser::new();
        browser.route(url, "TapTap", &page_of(1));
        browser.on_scroll(move |view, n| view.html = page_of((n + 1).min(4)));

        let mut page = browser.page();
        let mut sink: Vec<ItemHandle> = Vec::new();
        let discovery = Adapter::TapTapCn
            .discover_items(&mut page, &target(url, SiteFamily::TapTapCn), &ctx(30), &mut sink)
            .await
            .unwrap();

        assert_eq!(discovery.stop, Some(StopReason::CutoffReached));
        assert_eq!(sink.len(), 3);
        // The collapsed-review script runs every round
        assert!(browser
            .journal()
            .evaluated
            .iter()
            .all(|script| script.contains("已收起")));
    }
}
