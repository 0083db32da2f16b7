//! Discord forum channels
//!
//! Only forum-style channels are supported: the card list is scrolled to
//! load older posts, then each card is opened in the side panel, its
//! messages read, and the panel closed again with Escape. Discord class
//! names are hashed, so every selector matches on a stable class prefix or
//! an ARIA attribute.

use super::html::{
    first, first_attr, first_text, fragments, select_all, text_of, with_document, with_fragment,
};
use super::{
    AdapterContext, Discovery, ItemHandle, ItemSink, OrderingAssumption, PostRole, StopReason,
};
use crate::browser::PageDriver;
use crate::date::normalize_at;
use crate::record::{ItemContext, RecordDraft, SourceTarget};
use crate::{Result, SweepError};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, info, warn};

const MAIN: &str = "[role='main']";

/// Any of these inside the main area means the channel renders as a forum
const FORUM_MARKERS: &[&str] = &[
    "div[class*='mainCard']",
    "[aria-label*='New Post']",
    "[aria-label*='新贴子']",
    "[aria-label*='新貼文']",
    "[aria-label*='貼子']",
    "[aria-label*='帖子']",
    "[class*='container-'] [class*='card-']",
    "[class*='form-'] [class*='searchInput-']",
    "[role='list'][aria-label*='贴子']",
    "[role='list'][aria-label*='Post']",
    "[role='list'][aria-label*='貼子']",
];
const FORUM_CHECKS: u32 = 6;
const FORUM_CHECK_INTERVAL: Duration = Duration::from_secs(5);

const CARD: &str = "[role='main'] div[class*='mainCard']";
const CARD_TITLE: &str = "h3";
const CARD_WAIT: Duration = Duration::from_secs(15);
const CARD_SCROLLS: u32 = 10;

/// Category and system channels that show up as cards
const SKIPPED_TITLES: &[&str] = &["官方消息", "聊天空間", "建議空間", "組隊空間", "General", "Lobby"];

const MESSAGE: &str = "[class*='messageListItem']";
const MESSAGE_FALLBACK: &str = "[role='article']";
const MESSAGE_ANY: &str = "[class*='messageListItem'], [id^='message-content-'], [role='article']";
const MESSAGE_WAIT: Duration = Duration::from_secs(10);

const CONTENT: &str = "[id^='message-content-']";
const CONTENT_FALLBACK: &str = "[class*='messageContent']";
const AUTHOR: &str = "[class*='username']";
const AUTHOR_FALLBACK: &str = "[class*='author']";
const TIME: &str = "time";

const CLOSE_PANEL: &str = "[aria-label='Close'], [aria-label='关闭']";

/// Scrolls every scroll container in the forum view down by one screenful
const SCROLL_CARD_LIST: &str = r#"(() => {
    document.querySelectorAll('[class*="scroller"]').forEach((el) => { el.scrollTop += 5000; });
    return true;
})()"#;

async fn is_forum(page: &mut dyn PageDriver) -> Result<bool> {
    for attempt in 1..=FORUM_CHECKS {
        for marker in FORUM_MARKERS {
            if page.count(&format!("{} {}", MAIN, marker)).await? > 0 {
                debug!("Forum view matched {}", marker);
                return Ok(true);
            }
        }
        if page.current_url().await?.contains("threads") {
            return Ok(true);
        }
        debug!("No forum view yet ({}/{})", attempt, FORUM_CHECKS);
        if attempt < FORUM_CHECKS {
            tokio::time::sleep(FORUM_CHECK_INTERVAL).await;
        }
    }
    Ok(false)
}

/// A forum post card as listed in the channel
#[derive(Debug)]
struct Card {
    title: String,

    /// Last activity shown on the card; no message in the post is newer
    active_at: Option<DateTime<Utc>>,
}

fn list_cards(html: &str, now: DateTime<Utc>) -> Vec<Card> {
    with_document(html, |root| {
        select_all(root, CARD)
            .into_iter()
            .enumerate()
            .map(|(i, card)| Card {
                title: first_text(card, CARD_TITLE).unwrap_or_else(|| format!("贴子 {}", i)),
                active_at: first_attr(card, TIME, "datetime")
                    .and_then(|raw| normalize_at(&raw, now).timestamp),
            })
            .collect()
    })
}

/// Scrolls the card list until it stops growing or its tail is past the cutoff
async fn load_cards(
    page: &mut dyn PageDriver,
    ctx: &AdapterContext,
) -> Result<(Vec<Card>, StopReason)> {
    if !page.wait_for(CARD, CARD_WAIT).await? {
        debug!("No forum cards rendered");
    }

    let mut paginator =
        ctx.bounded_paginator(OrderingAssumption::Loose, CARD_SCROLLS, ctx.limits.stall_limit);
    loop {
        let mut cards = list_cards(&page.content().await?, ctx.now);
        cards.truncate(ctx.limits.max_threads);

        let dates: Vec<_> = cards.iter().map(|card| card.active_at).collect();
        if let Some(reason) = paginator.observe(cards.len(), &dates) {
            return Ok((cards, reason));
        }
        if cards.len() >= ctx.limits.max_threads {
            return Ok((cards, StopReason::SafetyCeiling));
        }
        page.evaluate(SCROLL_CARD_LIST).await?;
        ctx.pacer.pause().await;
    }
}

pub(super) async fn discover(
    page: &mut dyn PageDriver,
    target: &SourceTarget,
    ctx: &AdapterContext,
    sink: &mut dyn ItemSink,
) -> Result<Discovery> {
    info!("Opening Discord channel {}", target.url);
    page.goto(target.url.as_str()).await?;
    ctx.pacer.pause().await;

    if !is_forum(page).await? {
        return Err(SweepError::MissingStructure {
            url: target.url.to_string(),
            what: "Discord forum view".to_string(),
        });
    }

    let (cards, stop) = load_cards(page, ctx).await?;
    info!("{} forum posts listed ({})", cards.len(), stop);

    let mut discovery = Discovery {
        stop: Some(stop),
        ..Discovery::default()
    };
    for (i, card) in cards.iter().enumerate() {
        let title = &card.title;
        if SKIPPED_TITLES.contains(&title.as_str()) {
            debug!("Skipping channel card '{}'", title);
            continue;
        }
        if card.active_at.is_some_and(|at| at < ctx.cutoff) {
            debug!("Skipping post '{}': no activity since the cutoff", title);
            continue;
        }

        info!("({}/{}) Opening post '{}'", i + 1, cards.len(), title);
        let context = ItemContext {
            title: format!("Discord [{}]", title),
            url: target.url.to_string(),
        };
        match read_card(page, i, context, ctx, sink).await {
            Ok(messages) => {
                debug!("{} messages in '{}'", messages, title);
                discovery.items += messages;
                discovery.threads += 1;
            }
            Err(e) => warn!("Skipping post '{}': {}", title, e),
        }

        if let Err(e) = close_panel(page, ctx).await {
            warn!("Closing post '{}' failed: {}", title, e);
        }
    }

    Ok(discovery)
}

/// Opens the `index`th card and pushes its messages as one batch
async fn read_card(
    page: &mut dyn PageDriver,
    index: usize,
    context: ItemContext,
    ctx: &AdapterContext,
    sink: &mut dyn ItemSink,
) -> Result<usize> {
    if !page.click_nth(CARD, index).await? {
        return Err(SweepError::MissingStructure {
            url: context.url,
            what: format!("card {}", index),
        });
    }
    ctx.pacer.pause().await;

    if !page.wait_for(MESSAGE_ANY, MESSAGE_WAIT).await? {
        return Ok(0);
    }

    let html = page.content().await?;
    let mut messages = fragments(&html, MESSAGE);
    if messages.is_empty() {
        messages = fragments(&html, MESSAGE_FALLBACK);
    }

    let batch: Vec<ItemHandle> = messages
        .into_iter()
        .enumerate()
        .map(|(i, fragment)| ItemHandle {
            fragment,
            context: Some(context.clone()),
            role: if i == 0 { PostRole::Root } else { PostRole::Reply },
        })
        .collect();
    let count = batch.len();
    sink.accept(batch);
    Ok(count)
}

async fn close_panel(page: &mut dyn PageDriver, ctx: &AdapterContext) -> Result<()> {
    page.press_escape().await?;
    ctx.pacer.pause().await;
    if page.count(CLOSE_PANEL).await? > 0 && page.click(CLOSE_PANEL).await? {
        ctx.pacer.pause().await;
    }
    Ok(())
}

pub(super) fn draft(fragment: &str) -> RecordDraft {
    with_fragment(fragment, |root| {
        let content = first_text(root, CONTENT).or_else(|| first_text(root, CONTENT_FALLBACK));
        let author = first_text(root, AUTHOR).or_else(|| first_text(root, AUTHOR_FALLBACK));
        let raw_date_text = first_attr(root, TIME, "datetime")
            .or_else(|| first(root, TIME).map(text_of).filter(|t| !t.is_empty()));
        RecordDraft {
            author,
            rating: None,
            content,
            raw_date_text,
            context: None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::testing::{ctx, record, target};
    use crate::adapters::{Adapter, Extraction, SkipReason};
    use crate::browser::scripted::ScriptedBrowser;
    use crate::record::SiteFamily;

    const CHANNEL: &str = "https://discord.com/channels/111/222";

    fn message(id: u32, author: &str, body: &str, datetime: Option<&str>) -> String {
        let time = datetime
            .map(|dt| format!(r#"<time datetime="{}">today</time>"#, dt))
            .unwrap_or_default();
        format!(
            r#"<li class="messageListItem__5126c"><span class="username_f9f2ca">{author}</span>{time}
                <div id="message-content-{id}">{body}</div></li>"#
        )
    }

    fn channel(titles: &[&str], open: Option<&str>) -> String {
        let cards: String = titles
            .iter()
            .map(|t| format!(r#"<div class="mainCard_a6d69a"><h3>{}</h3></div>"#, t))
            .collect();
        format!(
            r#"<html><body><div role="main">{}</div><ol>{}</ol></body></html>"#,
            cards,
            open.unwrap_or_default()
        )
    }

    #[test]
    fn test_message_extract() {
        let handle = ItemHandle::standalone(message(
            1,
            "mod",
            "Please add a photo mode",
            Some("2024-06-14T10:00:00.000Z"),
        ));
        let record = record(Adapter::Discord.extract(&handle, &ctx(30)));
        assert_eq!(record.author, "mod");
        assert_eq!(record.content, "Please add a photo mode");
        assert_eq!(record.raw_date_text, "2024-06-14T10:00:00.000Z");
        assert_eq!(record.canonical_date, "2024-06-14");
    }

    #[test]
    fn test_undated_message_only_kept_on_deep_crawl() {
        let handle = ItemHandle::standalone(message(1, "mod", "no time", None));
        assert_eq!(
            Adapter::Discord.extract(&handle, &ctx(30)),
            Extraction::Skipped(SkipReason::Undated)
        );
        let record = record(Adapter::Discord.extract(&handle, &ctx(400)));
        assert_eq!(record.canonical_date, "Unknown");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cards_opened_and_closed() {
        let titles = ["Lobby", "Add co-op", "Balance Lancer"];
        let browser = ScriptedBrowser::new();
        browser.route(CHANNEL, "Discord", &channel(&titles, None));

        let threads = [
            String::new(),
            message(10, "ann", "co-op please", Some("2024-06-14T10:00:00Z"))
                + &message(11, "bob", "+1", Some("2024-06-14T11:00:00Z")),
            message(20, "cat", "lancer too strong", Some("2024-06-13T10:00:00Z")),
        ];
        browser.on_click(CARD, move |view, index| {
            view.html = channel(&titles, Some(&threads[index]));
        });
        browser.on_escape(move |view, _| view.html = channel(&titles, None));

        let mut page = browser.page();
        let mut sink: Vec<ItemHandle> = Vec::new();
        let discovery = Adapter::Discord
            .discover_items(&mut page, &target(CHANNEL, SiteFamily::Discord), &ctx(30), &mut sink)
            .await
            .unwrap();

        assert_eq!(discovery.threads, 2);
        assert_eq!(sink.len(), 3);
        assert_eq!(sink[0].role, PostRole::Root);
        assert_eq!(sink[1].role, PostRole::Reply);
        assert_eq!(sink[2].context.as_ref().unwrap().title, "Discord [Balance Lancer]");
        assert_eq!(sink[2].context.as_ref().unwrap().url, CHANNEL);
        assert_eq!(browser.journal().escapes, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_card_list_stops_at_cutoff() {
        // ctx(30) puts the cutoff at 2024-05-16
        let cards: String = std::iter::once(("Fresh", "2024-06-14T09:00:00Z"))
            .chain((1..=5).map(|_| ("Stale", "2024-03-01T09:00:00Z")))
            .map(|(title, at)| {
                format!(
                    r#"<div class="mainCard_a6d69a"><h3>{}</h3><time datetime="{}">then</time></div>"#,
                    title, at
                )
            })
            .collect();
        let page_html = move |open: &str| {
            format!(r#"<html><body><div role="main">{}</div><ol>{}</ol></body></html>"#, cards, open)
        };

        let browser = ScriptedBrowser::new();
        browser.route(CHANNEL, "Discord", &page_html(""));
        let opened = page_html(&message(1, "ann", "still playing", Some("2024-06-14T09:00:00Z")));
        browser.on_click(CARD, move |view, _| view.html = opened.clone());

        let mut page = browser.page();
        let mut sink: Vec<ItemHandle> = Vec::new();
        let discovery = Adapter::Discord
            .discover_items(&mut page, &target(CHANNEL, SiteFamily::Discord), &ctx(30), &mut sink)
            .await
            .unwrap();

        assert_eq!(discovery.stop, Some(StopReason::CutoffReached));
        assert_eq!(discovery.threads, 1);
        assert_eq!(sink.len(), 1);
        assert_eq!(browser.journal().escapes, 1);
        assert!(browser.journal().evaluated.is_empty());
    }

    #[test]
    fn test_list_cards_reads_activity_time() {
        let html = r#"<div role="main">
            <div class="mainCard_a6d69a"><h3>Dated</h3><time datetime="2024-06-14T09:00:00Z">1d</time></div>
            <div class="mainCard_a6d69a"><h3>Undated</h3></div></div>"#;
        let cards = list_cards(html, crate::adapters::testing::now());
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].title, "Dated");
        assert!(cards[0].active_at.is_some());
        assert_eq!(cards[1].active_at, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_text_channel_is_rejected() {
        let browser = ScriptedBrowser::new();
        browser.route(CHANNEL, "Discord", r#"<html><body><div role="main"><p>chat</p></div></body></html>"#);

        let mut page = browser.page();
        let mut sink: Vec<ItemHandle> = Vec::new();
        let result = Adapter::Discord
            .discover_items(&mut page, &target(CHANNEL, SiteFamily::Discord), &ctx(30), &mut sink)
            .await;
        assert!(matches!(result, Err(SweepError::MissingStructure { .. })));
    }
}
