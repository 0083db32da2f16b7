//! Baidu Tieba (百度贴吧) boards
//!
//! Board indices are paged with `pn`, fifty threads per page. Index rows
//! carry no usable date, so the index walk ends on the thread ceiling or a
//! stall and the cutoff is applied per post.

use super::forum::{crawl_forum, ForumSpec, ThreadLink};
use super::html::{first, first_text, select_all, text_of, with_fragment};
use super::{AdapterContext, Discovery, ItemSink};
use crate::browser::PageDriver;
use crate::record::{RecordDraft, SourceTarget};
use crate::url::{resolve_href, with_query_param};
use crate::Result;
use scraper::ElementRef;
use std::time::Duration;
use url::Url;

const BASE: &str = "https://tieba.baidu.com/";
const THREADS_PER_PAGE: u32 = 50;

const ROWS: &[&str] = &[".j_thread_list", "li[data-field]"];
const ROW_TITLE: &str = "a.j_th_tit";

const POST: &str = ".l_post";
const AUTHOR: &str = ".d_name a";
const CONTENT: &str = ".d_post_content";
const TAIL: &str = ".tail-info";

const SPEC: ForumSpec = ForumSpec {
    name: "tieba",
    listing: &["#thread_list", ".j_thread_list", "li[data-field]"],
    listing_wait: Duration::from_secs(30),
    interstitial: None,
    index_page,
    threads,
    post: POST,
    post_wait: Duration::from_secs(10),
};

fn index_page(board: &Url, n: u32) -> Url {
    if n == 0 {
        board.clone()
    } else {
        with_query_param(board, "pn", &(n * THREADS_PER_PAGE).to_string())
    }
}

fn threads(root: ElementRef<'_>, _ctx: &AdapterContext) -> Vec<ThreadLink> {
    let Ok(base) = Url::parse(BASE) else {
        return Vec::new();
    };
    let rows = ROWS
        .iter()
        .map(|css| select_all(root, css))
        .find(|rows| !rows.is_empty())
        .unwrap_or_default();

    rows.into_iter()
        .filter_map(|row| {
            let title_el = first(row, ROW_TITLE)?;
            let url = resolve_href(&base, title_el.value().attr("href")?)?;
            Some(ThreadLink {
                title: text_of(title_el),
                url,
                last_activity: None,
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

/// Post time from the tail line: the first entry with a date and a clock
/// time, else the last entry that looks like a date
fn tail_date(post: ElementRef<'_>) -> Option<String> {
    let tails: Vec<String> = select_all(post, TAIL).into_iter().map(text_of).collect();
    tails
        .iter()
        .find(|t| t.contains('-') && t.contains(':'))
        .or_else(|| tails.iter().rev().find(|t| t.contains("20") && t.contains('-')))
        .cloned()
}

pub(super) fn draft(fragment: &str) -> RecordDraft {
    with_fragment(fragment, |root| RecordDraft {
        author: first_text(root, AUTHOR),
        rating: None,
        content: first_text(root, CONTENT),
        raw_date_text: tail_date(root),
        context: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::testing::{ctx, record, target};
    use crate::adapters::{Adapter, Extraction, ItemHandle, PostRole, SkipReason, StopReason};
    use crate::browser::scripted::ScriptedBrowser;
    use crate::record::{ItemContext, SiteFamily};

    const BOARD: &str = "https://tieba.baidu.com/f?kw=game";

    fn post(author: &str, body: &str, tails: &[&str]) -> String {
        let tails: String = tails
            .iter()
            .map(|t| format!(r#"<span class="tail-info">{}</span>"#, t))
            .collect();
        format!(
            r#"<div class="l_post"><div class="d_name"><a>{author}</a></div>
                <div class="d_post_content">{body}</div><div class="post-tail-wrap">{tails}</div></div>"#
        )
    }

    fn board(ids: std::ops::Range<u32>) -> String {
        let rows: String = ids
            .map(|id| {
                format!(
                    r#"<li class="j_thread_list"><a class="j_th_tit" href="/p/{id}">Thread {id}</a></li>"#
                )
            })
            .collect();
        format!(r#"<html><body><ul id="thread_list">{}</ul></body></html>"#, rows)
    }

    #[test]
    fn test_index_page_offsets() {
        let url = Url::parse(BOARD).unwrap();
        assert_eq!(index_page(&url, 0).as_str(), BOARD);
        assert_eq!(index_page(&url, 3).as_str(), "https://tieba.baidu.com/f?kw=game&pn=150");
    }

    #[test]
    fn test_tail_date_prefers_date_with_time() {
        let fragment = post("a", "b", &["1楼", "2024-06-10 12:30", "来自Android客户端"]);
        assert_eq!(
            with_fragment(&fragment, tail_date).as_deref(),
            Some("2024-06-10 12:30")
        );
        let fragment = post("a", "b", &["1楼", "2024-06-10"]);
        assert_eq!(with_fragment(&fragment, tail_date).as_deref(), Some("2024-06-10"));
        let fragment = post("a", "b", &["1楼"]);
        assert_eq!(with_fragment(&fragment, tail_date), None);
    }

    #[test]
    fn test_reply_extract() {
        let handle = ItemHandle {
            fragment: post("吧友", "同意楼上", &["2楼", "2024-06-11 08:00"]),
            context: Some(ItemContext {
                title: "Thread 1".to_string(),
                url: "https://tieba.baidu.com/p/1".to_string(),
            }),
            role: PostRole::Reply,
        };
        let record = record(Adapter::Tieba.extract(&handle, &ctx(30)));
        assert_eq!(record.author, "吧友");
        assert_eq!(record.content, "【跟帖】 同意楼上");
        assert_eq!(record.source_name, "baidutieba");
        assert_eq!(record.context.unwrap().url, "https://tieba.baidu.com/p/1");
    }

    #[test]
    fn test_old_post_skipped() {
        let handle = ItemHandle {
            fragment: post("吧友", "老帖", &["2020-01-01 08:00"]),
            context: None,
            role: PostRole::Root,
        };
        assert_eq!(
            Adapter::Tieba.extract(&handle, &ctx(30)),
            Extraction::Skipped(SkipReason::BeforeCutoff)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_thread_ceiling_caps_the_index_walk() {
        let browser = ScriptedBrowser::new();
        browser.route(BOARD, "board", &board(0..50));
        browser.route(
            "https://tieba.baidu.com/p/0",
            "Thread 0",
            &format!(
                "<html><body>{}{}</body></html>",
                post("op", "first", &["2024-06-14 08:00"]),
                post("re", "second", &["2024-06-14 09:00"])
            ),
        );

        let mut page = browser.page();
        let mut sink: Vec<ItemHandle> = Vec::new();
        let discovery = Adapter::Tieba
            .discover_items(&mut page, &target(BOARD, SiteFamily::Tieba), &ctx(30), &mut sink)
            .await
            .unwrap();

        // ctx caps threads at 10; only thread 0 has posts
        assert_eq!(discovery.stop, Some(StopReason::SafetyCeiling));
        assert_eq!(discovery.threads, 1);
        assert_eq!(sink.len(), 2);
        let visited = browser.journal().visited;
        assert!(visited.contains(&"https://tieba.baidu.com/p/9".to_string()));
        assert!(!visited.contains(&"https://tieba.baidu.com/p/10".to_string()));
        assert!(!visited.iter().any(|url| url.contains("pn=")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_index_page_is_requested() {
        let browser = ScriptedBrowser::new();
        browser.route(BOARD, "board", &board(0..3));
        browser.route("https://tieba.baidu.com/f?kw=game&pn=50", "board", &board(3..5));

        let mut page = browser.page();
        let mut sink: Vec<ItemHandle> = Vec::new();
        Adapter::Tieba
            .discover_items(&mut page, &target(BOARD, SiteFamily::Tieba), &ctx(30), &mut sink)
            .await
            .unwrap();

        let visited = browser.journal().visited;
        assert!(visited.contains(&"https://tieba.baidu.com/p/4".to_string()));
    }
}
