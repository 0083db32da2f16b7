//! Date/time normalization for scraped date text
//!
//! Sites show dates in many shapes: `2024-03-05`, `2024/3/5 12:30`,
//! `2024年3月5日`, `11-20 12:30`, `3 months ago`, `3个月前`, `昨天`.
//! `normalize` turns any of them into a comparable UTC timestamp plus a
//! canonical `YYYY-MM-DD` string, trying an ordered list of strategies:
//!
//! 1. ISO timestamps
//! 2. Absolute dates (several separators, optional time of day)
//! 3. CJK absolute dates
//! 4. Month-day without a year
//! 5. Relative keywords (today, yesterday, just now)
//! 6. Relative phrases (`N <unit> ago` / `N<unit>前`)
//!
//! Text no strategy recognizes yields a null timestamp and `"Unknown"`; it
//! never blocks ingestion. Relative forms resolve against `now`, so two runs
//! hours apart may disagree on the canonical date of the same item.

use crate::record::UNKNOWN_DATE;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use std::sync::LazyLock;

static ISO_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:\d{2})?").unwrap()
});

static ABSOLUTE_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4})[-/.](\d{1,2})[-/.](\d{1,2})(?:\s+(\d{1,2}):(\d{2})(?::(\d{2}))?)?")
        .unwrap()
});

static CJK_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})\s*年\s*(\d{1,2})\s*月\s*(\d{1,2})\s*日").unwrap());

static MONTH_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\d])(\d{1,2})-(\d{1,2})\s+(\d{1,2}):(\d{2})").unwrap()
});

static RELATIVE_LATIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(\d+|an?)\s*(seconds?|secs?|minutes?|mins?|hours?|hrs?|days?|weeks?|months?|years?)\s+ago",
    )
    .unwrap()
});

static RELATIVE_CJK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(\d+)\s*(秒钟|秒鐘|秒|分钟|分鐘|分|小时|小時|時間|个小时|個小時|个月|個月|ヶ月|か月|月|个星期|個星期|星期|周|週間|週|天|日|年)\s*前",
    )
    .unwrap()
});

/// Result of normalizing a piece of date text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedDate {
    /// Comparable timestamp, `None` when the text was not understood
    pub timestamp: Option<DateTime<Utc>>,

    /// `YYYY-MM-DD`, or `"Unknown"` when `timestamp` is `None`
    pub canonical: String,
}

impl NormalizedDate {
    fn unknown() -> Self {
        Self {
            timestamp: None,
            canonical: UNKNOWN_DATE.to_string(),
        }
    }

    fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp: Some(timestamp),
            canonical: timestamp.format("%Y-%m-%d").to_string(),
        }
    }
}

/// One way of reading date text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    IsoTimestamp,
    AbsoluteDate,
    CjkDate,
    MonthDay,
    RelativeKeyword,
    RelativePhrase,
}

/// Strategies in the order they are tried
pub const STRATEGIES: [Strategy; 6] = [
    Strategy::IsoTimestamp,
    Strategy::AbsoluteDate,
    Strategy::CjkDate,
    Strategy::MonthDay,
    Strategy::RelativeKeyword,
    Strategy::RelativePhrase,
];

impl Strategy {
    /// Applies this strategy alone to `text`
    pub fn apply(&self, text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::IsoTimestamp => parse_iso_timestamp(text),
            Self::AbsoluteDate => parse_absolute_date(text),
            Self::CjkDate => parse_cjk_date(text),
            Self::MonthDay => parse_month_day(text, now),
            Self::RelativeKeyword => parse_relative_keyword(text, now),
            Self::RelativePhrase => parse_relative_phrase(text, now),
        }
    }

    /// Span of `text` this strategy matches, without interpreting it
    pub fn locate<'t>(&self, text: &'t str) -> Option<&'t str> {
        match self {
            Self::IsoTimestamp => ISO_TIMESTAMP.find(text).map(|m| m.as_str()),
            Self::AbsoluteDate => ABSOLUTE_DATE.find(text).map(|m| m.as_str()),
            Self::CjkDate => CJK_DATE.find(text).map(|m| m.as_str()),
            Self::MonthDay => {
                let caps = MONTH_DAY.captures(text)?;
                let start = caps.get(1)?.start();
                let end = caps.get(4)?.end();
                text.get(start..end)
            }
            Self::RelativeKeyword => RELATIVE_KEYWORDS
                .iter()
                .flat_map(|group| group.iter())
                .filter_map(|word| text.find(word).map(|at| (at, *word)))
                .min_by_key(|(at, _)| *at)
                .and_then(|(at, word)| text.get(at..at + word.len())),
            Self::RelativePhrase => RELATIVE_LATIN
                .find(text)
                .or_else(|| RELATIVE_CJK.find(text))
                .map(|m| m.as_str()),
        }
    }
}

/// Finds the first date-like span in free text
///
/// Used when a site renders the date inline with other text (for example a
/// review card whose only date is somewhere in its body). Returns the span
/// the winning strategy would read, lowercased, so it can serve as the
/// item's raw date text.
///
/// # Example
///
/// ```
/// use review_sweep::date::locate;
///
/// assert_eq!(locate("Great game! 2024/05/01 Played 3h").as_deref(), Some("2024/05/01"));
/// assert_eq!(locate("no date here"), None);
/// ```
pub fn locate(text: &str) -> Option<String> {
    let text = text.to_lowercase();
    STRATEGIES
        .iter()
        .find_map(|strategy| strategy.locate(&text))
        .map(|span| span.trim().to_string())
}

/// Normalizes date text against the current time
pub fn normalize(raw: &str) -> NormalizedDate {
    normalize_at(raw, Utc::now())
}

/// Normalizes date text against an explicit `now`
///
/// # Example
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use review_sweep::normalize_at;
///
/// let now = Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap();
/// assert_eq!(normalize_at("2024/03/05", now).canonical, "2024-03-05");
/// assert_eq!(normalize_at("3 days ago", now).canonical, "2024-06-12");
/// assert_eq!(normalize_at("n/a", now).timestamp, None);
/// ```
pub fn normalize_at(raw: &str, now: DateTime<Utc>) -> NormalizedDate {
    let text = raw.trim().to_lowercase();
    if text.is_empty() {
        return NormalizedDate::unknown();
    }

    STRATEGIES
        .iter()
        .find_map(|strategy| strategy.apply(&text, now))
        .map(NormalizedDate::at)
        .unwrap_or_else(NormalizedDate::unknown)
}

fn midnight(year: i32, month: u32, day: u32) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(0, 0, 0)
}

fn parse_iso_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let matched = ISO_TIMESTAMP.find(text)?.as_str();
    let upper = matched.to_uppercase();

    if let Ok(dt) = DateTime::parse_from_rfc3339(&upper) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(upper.get(..19)?, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn parse_absolute_date(text: &str) -> Option<DateTime<Utc>> {
    let caps = ABSOLUTE_DATE.captures(text)?;
    let year: i32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let day: u32 = caps[3].parse().ok()?;

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let naive = match (caps.get(4), caps.get(5)) {
        (Some(h), Some(m)) => {
            let second = caps
                .get(6)
                .and_then(|s| s.as_str().parse().ok())
                .unwrap_or(0);
            date.and_hms_opt(h.as_str().parse().ok()?, m.as_str().parse().ok()?, second)?
        }
        _ => date.and_hms_opt(0, 0, 0)?,
    };

    Some(Utc.from_utc_datetime(&naive))
}

fn parse_cjk_date(text: &str) -> Option<DateTime<Utc>> {
    let caps = CJK_DATE.captures(text)?;
    let naive = midnight(
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
    )?;
    Some(Utc.from_utc_datetime(&naive))
}

fn parse_month_day(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let caps = MONTH_DAY.captures(text)?;
    let month: u32 = caps[1].parse().ok()?;
    let day: u32 = caps[2].parse().ok()?;
    let hour: u32 = caps[3].parse().ok()?;
    let minute: u32 = caps[4].parse().ok()?;

    let build = |year: i32| {
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(hour, minute, 0))
            .map(|naive| Utc.from_utc_datetime(&naive))
    };

    // A short date in the future belongs to last year
    match build(now.year()) {
        Some(dt) if dt <= now + Duration::days(1) => Some(dt),
        _ => build(now.year() - 1),
    }
}

const NOW: &[&str] = &["just now", "moments ago", "刚刚", "剛剛", "剛才", "刚才", "たった今"];
const TODAY: &[&str] = &["today", "今天", "今日"];
const YESTERDAY: &[&str] = &["yesterday", "昨天", "昨日"];
const DAY_BEFORE: &[&str] = &["前天", "一昨日"];
const RELATIVE_KEYWORDS: [&[&str]; 4] = [NOW, TODAY, DAY_BEFORE, YESTERDAY];

fn parse_relative_keyword(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let contains_any = |words: &[&str]| words.iter().any(|w| text.contains(w));

    if contains_any(NOW) || contains_any(TODAY) {
        Some(now)
    } else if contains_any(DAY_BEFORE) {
        Some(now - Duration::days(2))
    } else if contains_any(YESTERDAY) {
        Some(now - Duration::days(1))
    } else {
        None
    }
}

/// Unit of a relative phrase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelativeUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl RelativeUnit {
    fn from_token(token: &str) -> Option<Self> {
        let unit = match token {
            t if t.starts_with("sec") || t.starts_with('秒') => Self::Second,
            t if t.starts_with("min") || t.starts_with('分') => Self::Minute,
            t if t.starts_with("hour") || t.starts_with("hr") => Self::Hour,
            "小时" | "小時" | "時間" | "个小时" | "個小時" => Self::Hour,
            t if t.starts_with("day") => Self::Day,
            "天" | "日" => Self::Day,
            t if t.starts_with("week") => Self::Week,
            "周" | "週" | "週間" | "星期" | "个星期" | "個星期" => Self::Week,
            t if t.starts_with("month") => Self::Month,
            "月" | "个月" | "個月" | "ヶ月" | "か月" => Self::Month,
            t if t.starts_with("year") => Self::Year,
            "年" => Self::Year,
            _ => return None,
        };
        Some(unit)
    }

    /// `None` when `count` of this unit does not fit in a `Duration`
    fn span(&self, count: i64) -> Option<Duration> {
        match self {
            Self::Second => Duration::try_seconds(count),
            Self::Minute => Duration::try_minutes(count),
            Self::Hour => Duration::try_hours(count),
            Self::Day => Duration::try_days(count),
            Self::Week => Duration::try_weeks(count),
            Self::Month => count.checked_mul(30).and_then(Duration::try_days),
            Self::Year => count.checked_mul(365).and_then(Duration::try_days),
        }
    }
}

fn parse_relative_phrase(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let caps = RELATIVE_LATIN
        .captures(text)
        .or_else(|| RELATIVE_CJK.captures(text))?;

    let count: i64 = match &caps[1] {
        "a" | "an" => 1,
        digits => digits.parse().ok()?,
    };
    let unit = RelativeUnit::from_token(&caps[2])?;

    now.checked_sub_signed(unit.span(count)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn canonical(text: &str) -> String {
        normalize_at(text, now()).canonical
    }

    #[test]
    fn test_absolute_separators() {
        assert_eq!(canonical("2024-03-05"), "2024-03-05");
        assert_eq!(canonical("2024/3/5"), "2024-03-05");
        assert_eq!(canonical("2024.03.05"), "2024-03-05");
        assert_eq!(canonical("posted 2023-11-20 12:30"), "2023-11-20");
    }

    #[test]
    fn test_absolute_keeps_time_of_day() {
        let parsed = normalize_at("2023-11-20 12:30:15", now());
        assert_eq!(
            parsed.timestamp,
            Some(Utc.with_ymd_and_hms(2023, 11, 20, 12, 30, 15).unwrap())
        );
    }

    #[test]
    fn test_invalid_absolute_date_is_unknown() {
        let parsed = normalize_at("2024-13-45", now());
        assert_eq!(parsed.timestamp, None);
        assert_eq!(parsed.canonical, "Unknown");
    }

    #[test]
    fn test_iso_timestamp() {
        let parsed = normalize_at("2024-02-29T23:10:00.000Z", now());
        assert_eq!(
            parsed.timestamp,
            Some(Utc.with_ymd_and_hms(2024, 2, 29, 23, 10, 0).unwrap())
        );

        let offset = normalize_at("2024-03-01T01:00:00+08:00", now());
        assert_eq!(offset.canonical, "2024-02-29");
    }

    #[test]
    fn test_cjk_absolute() {
        assert_eq!(canonical("2024年3月5日"), "2024-03-05");
        assert_eq!(canonical("發表於 2023 年 12 月 1 日"), "2023-12-01");
    }

    #[test]
    fn test_month_day_assumes_current_year() {
        assert_eq!(canonical("05-20 08:15"), "2024-05-20");
    }

    #[test]
    fn test_month_day_in_future_is_last_year() {
        assert_eq!(canonical("12-24 20:00"), "2023-12-24");
    }

    #[test]
    fn test_relative_english() {
        assert_eq!(canonical("3 months ago"), "2024-03-17");
        assert_eq!(canonical("1 year ago"), "2023-06-16");
        assert_eq!(canonical("2 weeks ago"), "2024-06-01");
        assert_eq!(canonical("an hour ago"), "2024-06-15");
        assert_eq!(canonical("5 days ago"), "2024-06-10");
        assert_eq!(canonical("2.5K views • 1 month ago"), "2024-05-16");
    }

    #[test]
    fn test_relative_hours_are_precise() {
        let parsed = normalize_at("13 hours ago", now());
        assert_eq!(
            parsed.timestamp,
            Some(Utc.with_ymd_and_hms(2024, 6, 14, 23, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_relative_chinese() {
        assert_eq!(canonical("3个月前"), "2024-03-17");
        assert_eq!(canonical("3 個月前"), "2024-03-17");
        assert_eq!(canonical("2週前"), "2024-06-01");
        assert_eq!(canonical("10天前"), "2024-06-05");
        assert_eq!(canonical("1年前"), "2023-06-16");
        assert_eq!(canonical("30分钟前"), "2024-06-15");
        assert_eq!(canonical("3日前"), "2024-06-12");
    }

    #[test]
    fn test_relative_keywords() {
        assert_eq!(canonical("Yesterday"), "2024-06-14");
        assert_eq!(canonical("昨天 18:20"), "2024-06-14");
        assert_eq!(canonical("刚刚"), "2024-06-15");
        assert_eq!(canonical("前天"), "2024-06-13");
    }

    #[test]
    fn test_unparseable_is_null() {
        for text in ["", "   ", "Unknown", "1.2K views", "编辑于某天"] {
            let parsed = normalize_at(text, now());
            assert_eq!(parsed.timestamp, None, "{:?} should not parse", text);
            assert_eq!(parsed.canonical, "Unknown");
        }
    }

    #[test]
    fn test_absolute_wins_over_relative() {
        assert_eq!(canonical("2020-01-02 (3 days ago)"), "2020-01-02");
    }

    #[test]
    fn test_each_strategy_alone() {
        let n = now();
        assert!(Strategy::IsoTimestamp.apply("2024-01-01T00:00:00Z", n).is_some());
        assert!(Strategy::AbsoluteDate.apply("3 days ago", n).is_none());
        assert!(Strategy::CjkDate.apply("2024年1月1日", n).is_some());
        assert!(Strategy::MonthDay.apply("2024-01-01", n).is_none());
        assert!(Strategy::RelativeKeyword.apply("yesterday", n).is_some());
        assert!(Strategy::RelativePhrase.apply("3 views", n).is_none());
    }

    #[test]
    fn test_locate_picks_the_date_span() {
        assert_eq!(
            locate("玩了 12 小时 2024/05/01 好玩").as_deref(),
            Some("2024/05/01")
        );
        assert_eq!(locate("Posted 3 Days Ago by bob").as_deref(), Some("3 days ago"));
        assert_eq!(locate("回复 05-20 08:15").as_deref(), Some("05-20 08:15"));
        assert_eq!(locate("昨天 好评").as_deref(), Some("昨天"));
        assert_eq!(locate("nothing"), None);
    }

    #[test]
    fn test_located_span_normalizes_like_the_whole_text() {
        let text = "超好玩 3个月前";
        let span = locate(text).unwrap();
        assert_eq!(canonical(&span), canonical(text));
    }

    #[test]
    fn test_oversized_relative_count_is_unknown() {
        for text in [
            "999999999999 days ago",
            "99999999999999999 months ago",
            "9999999999999999999999 years ago",
            "999999999999天前",
            "99999999999999999个月前",
        ] {
            let parsed = normalize_at(text, now());
            assert_eq!(parsed.timestamp, None, "{:?} should not parse", text);
            assert_eq!(parsed.canonical, "Unknown");
        }
    }

    #[test]
    fn test_oversized_count_inside_review_text() {
        let text = "等了 999999999999天前 的版本";
        let span = locate(text).unwrap();
        assert_eq!(normalize_at(&span, now()).canonical, "Unknown");
        assert_eq!(canonical(text), "Unknown");
    }

    #[test]
    fn test_zero_count_is_now() {
        assert_eq!(normalize_at("0 seconds ago", now()).timestamp, Some(now()));
        assert_eq!(normalize_at("0天前", now()).timestamp, Some(now()));
    }

    #[test]
    fn test_largest_representable_span_still_parses() {
        // 100k days back is still inside chrono's range
        assert!(normalize_at("100000 days ago", now()).timestamp.is_some());
        assert_eq!(canonical("400000000 years ago"), "Unknown");
    }

    #[test]
    fn test_relative_phrase_drifts_with_now() {
        let first = normalize_at("2 hours ago", now());
        let later = normalize_at("2 hours ago", now() + Duration::hours(12));
        assert_ne!(first.timestamp, later.timestamp);
    }
}
