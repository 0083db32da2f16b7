//! Durable storage for content records
//!
//! - `SqliteStore`: the `reviews` and `runs` tables behind `ContentStore`
//! - `BackupLedger`: per-source JSON-lines files written before the store
//! - `RecordSink`: the `ItemSink` that extracts, backs up and upserts items

mod ledger;
mod schema;
mod sink;
mod sqlite;
mod traits;

pub use ledger::{BackupLedger, LedgerEntry};
pub use sink::{RecordSink, SinkTally};
pub use sqlite::SqliteStore;
pub use traits::{ContentStore, StorageError, StorageResult, UpsertOutcome};

use chrono::{DateTime, Utc};
use std::path::Path;

/// Opens or creates the store at `path`
pub fn open_store(path: &Path) -> StorageResult<SqliteStore> {
    SqliteStore::new(path)
}

/// Stored record count for one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCount {
    pub source_name: String,
    pub total: u64,
    pub analyzed: u64,
}

impl SourceCount {
    pub fn pending(&self) -> u64 {
        self.total.saturating_sub(self.analyzed)
    }
}

/// Sentiment fields written back by the analysis engine
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub score: f64,
    pub label: String,
    pub detailed: String,
}

/// Counters written on a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub targets_total: u32,
    pub targets_failed: u32,
    pub records_inserted: u64,
    pub records_duplicate: u64,
}

/// One crawl run
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub id: i64,
    pub game_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub cutoff: DateTime<Utc>,
    pub status: RunStatus,
    pub totals: RunTotals,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
