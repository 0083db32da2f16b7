//! Bahamut (巴哈姆特) forum boards
//!
//! Board indices are paged with `page=N`. Index rows show the last edit
//! time, so threads without recent activity are not opened. The site sits
//! behind a Cloudflare check that sometimes needs an operator.

use super::forum::{crawl_forum, ForumSpec, ThreadLink};
use super::html::{first, first_text, select_all, text_of, with_fragment};
use super::{AdapterContext, Discovery, ItemSink};
use crate::browser::PageDriver;
use crate::date::{locate, normalize_at};
use crate::record::{RecordDraft, SourceTarget};
use crate::url::{resolve_href, with_query_param};
use crate::Result;
use scraper::ElementRef;
use std::time::Duration;
use url::Url;

const BASE: &str = "https://forum.gamer.com.tw/";

const ROW: &str = ".b-list__row";
const ROW_TITLE: &str = ".b-list__main__title";
const ROW_EDITED: &str = ".b-list__time__edittime";

const POST: &str = "section.c-section";
const AUTHOR: &str = ".c-user__name";
const CONTENT: &str = ".c-article__content";
const POST_TIME: &str = ".c-post__header a[data-href]";
const POST_HEADER: &str = ".c-post__header";

const SPEC: ForumSpec = ForumSpec {
    name: "bahamut",
    listing: &[".b-list__main"],
    listing_wait: Duration::from_secs(15),
    interstitial: Some("Just a moment"),
    index_page,
    threads,
    post: POST,
    post_wait: Duration::from_secs(10),
};

fn index_page(board: &Url, n: u32) -> Url {
    if n == 0 {
        board.clone()
    } else {
        with_query_param(board, "page", &(n + 1).to_string())
    }
}

fn threads(root: ElementRef<'_>, ctx: &AdapterContext) -> Vec<ThreadLink> {
    let Ok(base) = Url::parse(BASE) else {
        return Vec::new();
    };
    select_all(root, ROW)
        .into_iter()
        .filter_map(|row| {
            let title_el = first(row, ROW_TITLE)?;
            let url = resolve_href(&base, title_el.value().attr("href")?)?;
            let last_activity = first_text(row, ROW_EDITED)
                .and_then(|text| normalize_at(&text, ctx.now).timestamp);
            Some(ThreadLink {
                title: text_of(title_el),
                url,
                last_activity,
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
    crawl_forum(page, &SPEC, target, ctx, sink).await
}

fn post_date(post: ElementRef<'_>) -> Option<String> {
    first_text(post, POST_TIME).or_else(|| first(post, POST_HEADER).and_then(|h| locate(&text_of(h))))
}

pub(super) fn draft(fragment: &str) -> RecordDraft {
    with_fragment(fragment, |root| RecordDraft {
        author: first_text(root, AUTHOR),
        rating: None,
        content: first_text(root, CONTENT),
        raw_date_text: post_date(root),
        context: None,
    })
}
