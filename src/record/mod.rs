//! Content records and their identity
//!
//! This module defines the unit of ingestion:
//! - `SiteFamily`: the closed set of supported source families
//! - `SourceTarget`: one configured URL bound to a family and a game
//! - `ContentRecord`: one extracted piece of commentary
//! - `identify`: the content-hash id that makes re-ingestion idempotent

use crate::date::NormalizedDate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use url::Url;

/// Rating stored for items whose source has no rating or where it is missing
pub const UNRATED: f64 = -1.0;

/// Author stored when the author element is missing
pub const ANONYMOUS: &str = "Anonymous";

/// Raw date text stored when no date could be located
pub const UNKNOWN_DATE: &str = "Unknown";

/// Family of web UIs handled by one adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SiteFamily {
    TapTapCn,
    TapTapIntl,
    QooApp,
    YouTube,
    Bahamut,
    Tieba,
    Discord,
}

impl SiteFamily {
    /// Stable source name written on every record and used for ledger files
    pub fn source_name(&self) -> &'static str {
        match self {
            Self::TapTapCn => "taptap",
            Self::TapTapIntl => "taptap_intl",
            Self::QooApp => "qoo",
            Self::YouTube => "youtube",
            Self::Bahamut => "bahamut",
            Self::Tieba => "baidutieba",
            Self::Discord => "discord",
        }
    }

    /// Parses a family from its source name
    pub fn from_source_name(s: &str) -> Option<Self> {
        Self::all()
            .into_iter()
            .find(|family| family.source_name() == s)
    }

    /// Short names an operator may type instead of the source name
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::TapTapCn => &["taptap", "taptap_cn", "taptap.cn"],
            Self::TapTapIntl => &["taptap_intl", "taptap.io"],
            Self::QooApp => &["qoo", "qooapp", "qoo-app"],
            Self::YouTube => &["youtube", "yt"],
            Self::Bahamut => &["bahamut", "gamer.com.tw"],
            Self::Tieba => &["tieba", "baidutieba", "tieba.baidu.com"],
            Self::Discord => &["discord", "discord.com"],
        }
    }

    /// Prefix used for environment-provided credentials (`<PREFIX>_USER`)
    pub fn env_prefix(&self) -> &'static str {
        match self {
            Self::TapTapCn => "TAPTAP",
            Self::TapTapIntl => "TAPTAP_INTL",
            Self::QooApp => "QOO",
            Self::YouTube => "YOUTUBE",
            Self::Bahamut => "BAHAMUT",
            Self::Tieba => "BAIDU",
            Self::Discord => "DISCORD",
        }
    }

    /// Returns all families
    pub fn all() -> Vec<Self> {
        vec![
            Self::TapTapCn,
            Self::TapTapIntl,
            Self::QooApp,
            Self::YouTube,
            Self::Bahamut,
            Self::Tieba,
            Self::Discord,
        ]
    }
}

impl fmt::Display for SiteFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source_name())
    }
}

/// One configured crawl target, immutable for the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTarget {
    pub url: Url,
    pub family: SiteFamily,
    pub game_id: String,
}

/// Thread or video an item was found under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemContext {
    pub title: String,
    pub url: String,
}

/// Computes the content-hash id of an item
///
/// The id depends only on the author, the raw date text as shown by the site,
/// and the content, so the same real-world item gets the same id in every run
/// and in any discovery order. Fields are joined with a unit separator so
/// that shifting characters between fields changes the id.
///
/// # Example
///
/// ```
/// use review_sweep::identify;
///
/// let a = identify("alice", "2 hours ago", "great game");
/// let b = identify("alice", "2 hours ago", "great game");
/// assert_eq!(a, b);
/// assert_ne!(a, identify("alic", "e2 hours ago", "great game"));
/// ```
pub fn identify(author: &str, raw_date_text: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(author.as_bytes());
    hasher.update([0x1f]);
    hasher.update(raw_date_text.as_bytes());
    hasher.update([0x1f]);
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Fields pulled from one item before sentinels and normalization apply
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordDraft {
    pub author: Option<String>,
    pub rating: Option<f64>,
    pub content: Option<String>,
    pub raw_date_text: Option<String>,
    pub context: Option<ItemContext>,
}

/// One piece of extracted commentary
///
/// Records are created once and never mutated by the ingestion core.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentRecord {
    pub id: String,
    pub game_id: String,
    pub author: String,
    pub rating: f64,
    pub content: String,
    pub occurred_at: Option<DateTime<Utc>>,
    pub canonical_date: String,
    pub source_name: String,
    pub context: Option<ItemContext>,
    pub raw_date_text: String,
    pub ingested_at: DateTime<Utc>,
}

impl ContentRecord {
    /// Builds a record from a draft, applying field sentinels
    ///
    /// Returns `None` when the content is missing or blank; every other
    /// missing field falls back to its sentinel.
    ///
    /// # Arguments
    ///
    /// * `draft` - Raw fields extracted from the item
    /// * `date` - Normalized form of the draft's raw date text
    /// * `game_id` - Game the target belongs to
    /// * `family` - Family of the adapter that produced the draft
    /// * `ingested_at` - Ingestion timestamp
    pub fn from_draft(
        draft: RecordDraft,
        date: NormalizedDate,
        game_id: &str,
        family: SiteFamily,
        ingested_at: DateTime<Utc>,
    ) -> Option<Self> {
        let content = draft
            .content
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())?;

        let author = draft
            .author
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| ANONYMOUS.to_string());

        let raw_date_text = draft
            .raw_date_text
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| UNKNOWN_DATE.to_string());

        Some(Self {
            id: identify(&author, &raw_date_text, &content),
            game_id: game_id.to_string(),
            author,
            rating: draft.rating.unwrap_or(UNRATED),
            content,
            occurred_at: date.timestamp,
            canonical_date: date.canonical,
            source_name: family.source_name().to_string(),
            context: draft.context,
            raw_date_text,
            ingested_at,
        })
    }
}
