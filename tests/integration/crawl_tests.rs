//! End-to-end crawl runs against scripted pages

use chrono::{DateTime, Duration, TimeZone, Utc};
use review_sweep::browser::scripted::ScriptedBrowser;
use review_sweep::config::{parse_config, Config};
use review_sweep::crawler::{CrawlRequest, Orchestrator, Pacer, RunSummary, TargetOutcome};
use review_sweep::storage::{BackupLedger, ContentStore, RunStatus, SqliteStore};
use review_sweep::{identify, SiteFamily};
use std::collections::HashSet;
use std::path::Path;

const QOO: &str = "https://apps.qoo-app.com/app-comment/1";
const TAPTAP: &str = "https://www.taptap.io/app/1/review";

fn config() -> Config {
    parse_config(&format!(
        r#"
[pacing]
min-delay-ms = 0
max-delay-ms = 0

[pagination]
stall-limit = 2

[output]
database-path = "reviews.db"
backup-dir = "backup"

[games.demo]
display-name = "Demo"
lookback-days = 31
targets = ["{QOO}", "{TAPTAP}"]
"#
    ))
    .expect("Failed to parse test config")
}

/// Run start that puts the cutoff at 2024-06-01
fn run_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 2, 0, 0, 0).unwrap()
}

fn qoo_comment(author: &str, body: &str, when: &str) -> String {
    format!(
        r#"<div class="comment"><span class="username">{author}</span><span class="score">4</span>
           <div class="comment-content-box">{body}</div><span class="time">{when}</span></div>"#
    )
}

fn taptap_card(author: &str, body: &str, when: &str) -> String {
    format!(
        r#"<div class="post-card">
            <div class="post-card__head-text"><span>{author}</span><span class="tap-time">{when}</span></div>
            <div class="post-card__summary">{body}</div></div>"#
    )
}

fn page(items: &[String]) -> String {
    format!("<html><body>{}</body></html>", items.concat())
}

/// QooApp reveals one comment per scroll; TapTap shows two cards at once
fn scripted_sites() -> ScriptedBrowser {
    let comments = vec![
        qoo_comment("early", "great launch", "2024-07-01"),
        qoo_comment("mid", "events are fine", "2024-05-15"),
        qoo_comment("late", "too grindy", "2024-04-01"),
    ];

    let browser = ScriptedBrowser::new();
    browser.route(QOO, "QooApp", &page(&comments[..1]));
    browser.on_scroll(move |view, n| {
        if view.url == QOO {
            view.html = page(&comments[..(n + 1).min(comments.len())]);
        }
    });
    browser.route(
        TAPTAP,
        "TapTap",
        &page(&[
            taptap_card("Rin", "Too many ads", "2 hours ago"),
            taptap_card("Kai", "Nice art", "3 days ago"),
        ]),
    );
    browser
}

fn orchestrator<'a>(config: &'a Config, dir: &Path, now: DateTime<Utc>) -> Orchestrator<'a> {
    let store = SqliteStore::new(&dir.join("reviews.db")).expect("Failed to open store");
    let ledger = BackupLedger::open(&dir.join("backup")).expect("Failed to open ledger");
    Orchestrator::new(config, Box::new(store), ledger)
        .with_now(now)
        .with_pacer(Pacer::none())
}

async fn crawl(config: &Config, dir: &Path, browser: &mut ScriptedBrowser, now: DateTime<Utc>) -> RunSummary {
    orchestrator(config, dir, now)
        .run(browser, &CrawlRequest::new("demo"))
        .await
        .expect("Run failed")
}

#[tokio::test(start_paused = true)]
async fn test_cutoff_stops_feed_and_next_target_runs() {
    let config = config();
    let dir = tempfile::tempdir().unwrap();
    let mut browser = scripted_sites();

    let summary = crawl(&config, dir.path(), &mut browser, run_start()).await;

    assert_eq!(summary.cutoff, Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
    assert_eq!(summary.targets.len(), 2);

    let qoo = &summary.targets[0];
    assert_eq!(qoo.family, SiteFamily::QooApp);
    match &qoo.outcome {
        TargetOutcome::Completed(discovery) => {
            assert_eq!(discovery.stop.map(|s| s.to_string()).as_deref(), Some("cutoff reached"));
            // The 2024-04-01 comment is never revealed
            assert_eq!(discovery.items, 2);
        }
        other => panic!("QooApp target failed: {:?}", other),
    }
    assert_eq!(qoo.tally.inserted, 1);
    assert_eq!(qoo.tally.skipped, 1);

    let taptap = &summary.targets[1];
    assert!(!taptap.failed());
    assert_eq!(taptap.tally.inserted, 2);

    let store = SqliteStore::new(&dir.path().join("reviews.db")).unwrap();
    let stored = store
        .get(&identify("early", "2024-07-01", "great launch"))
        .unwrap()
        .expect("Recent comment not stored");
    assert_eq!(stored.rating, 4.0);
    assert_eq!(stored.canonical_date, "2024-07-01");
    assert!(store
        .get(&identify("mid", "2024-05-15", "events are fine"))
        .unwrap()
        .is_none());
    assert_eq!(store.count_for_game("demo").unwrap(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_failing_target_does_not_stop_the_run() {
    let config = config();
    let dir = tempfile::tempdir().unwrap();
    let mut browser = scripted_sites();
    browser.break_route("qoo-app.com");

    let summary = crawl(&config, dir.path(), &mut browser, run_start()).await;

    assert!(summary.targets[0].failed());
    assert!(!summary.targets[1].failed());
    assert_eq!(summary.totals.targets_failed, 1);
    assert_eq!(summary.totals.records_inserted, 2);

    let store = SqliteStore::new(&dir.path().join("reviews.db")).unwrap();
    let run = store.latest_run(Some("demo")).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.totals.targets_failed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_adapter_is_isolated() {
    let config = config();
    let dir = tempfile::tempdir().unwrap();
    let mut browser = scripted_sites();
    browser.on_scroll(|view, _| {
        if view.url == QOO {
            panic!("layout changed under the adapter");
        }
    });

    let summary = crawl(&config, dir.path(), &mut browser, run_start()).await;

    match &summary.targets[0].outcome {
        TargetOutcome::Failed(reason) => assert!(reason.contains("layout changed")),
        other => panic!("expected a caught panic, got {:?}", other),
    }
    // Items pushed before the panic are kept
    assert_eq!(summary.targets[0].tally.inserted, 1);
    assert!(!summary.targets[1].failed());
}

#[tokio::test(start_paused = true)]
async fn test_second_run_is_idempotent() {
    let config = config();
    let dir = tempfile::tempdir().unwrap();
    let first_start = run_start();

    let mut browser = scripted_sites();
    let first = crawl(&config, dir.path(), &mut browser, first_start).await;
    assert_eq!(first.totals.records_inserted, 3);

    // Twelve hours later "2 hours ago" names a different instant, same id
    let mut browser = scripted_sites();
    let second = crawl(&config, dir.path(), &mut browser, first_start + Duration::hours(12)).await;
    assert_eq!(second.totals.records_inserted, 0);
    assert_eq!(second.totals.records_duplicate, 3);
    assert_ne!(first.run_id, second.run_id);

    let store = SqliteStore::new(&dir.path().join("reviews.db")).unwrap();
    assert_eq!(store.count_for_game("demo").unwrap(), 3);
    let rin = store
        .get(&identify("Rin", "2 hours ago", "Too many ads"))
        .unwrap()
        .expect("TapTap review not stored");
    assert_eq!(rin.ingested_at, first_start);
    assert_eq!(rin.occurred_at, Some(first_start - Duration::hours(2)));
}

#[tokio::test(start_paused = true)]
async fn test_every_stored_record_is_backed_up() {
    let config = config();
    let dir = tempfile::tempdir().unwrap();
    let mut browser = scripted_sites();
    crawl(&config, dir.path(), &mut browser, run_start()).await;

    let ledger = BackupLedger::open(&dir.path().join("backup")).unwrap();
    let mut backed_up: HashSet<String> = HashSet::new();
    for source in ["qoo", "taptap_intl"] {
        for entry in ledger.read(source).unwrap() {
            assert_eq!(entry.game_id, "demo");
            backed_up.insert(entry.id);
        }
    }

    let store = SqliteStore::new(&dir.path().join("reviews.db")).unwrap();
    let counts = store.counts_by_source("demo").unwrap();
    let stored: u64 = counts.iter().map(|c| c.total).sum();
    assert_eq!(stored, backed_up.len() as u64);
    for id in &backed_up {
        assert!(store.get(id).unwrap().is_some());
    }
}

#[tokio::test(start_paused = true)]
async fn test_source_filter_limits_targets() {
    let config = config();
    let dir = tempfile::tempdir().unwrap();
    let mut browser = scripted_sites();

    let request = CrawlRequest {
        source_filter: Some("taptap".to_string()),
        ..CrawlRequest::new("demo")
    };
    let summary = orchestrator(&config, dir.path(), run_start())
        .run(&mut browser, &request)
        .await
        .unwrap();

    assert_eq!(summary.targets.len(), 1);
    assert_eq!(summary.targets[0].family, SiteFamily::TapTapIntl);
    assert!(!browser.journal().visited.contains(&QOO.to_string()));
}
