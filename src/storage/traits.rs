//! Store interface and error types

use crate::record::ContentRecord;
use crate::storage::{Analysis, RunRecord, RunStatus, RunTotals, SourceCount};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Run not found: {0}")]
    RunNotFound(i64),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Outcome of an insert-if-absent write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,

    /// A record with the same id exists; it was left untouched
    AlreadyPresent,
}

/// Durable store of content records and run bookkeeping
///
/// Records are insert-only from the ingestion side: an existing id is never
/// overwritten, so the first-seen snapshot (including `ingested_at`) wins.
pub trait ContentStore: Send {
    /// Inserts `record` unless its id is already stored
    fn upsert(&mut self, record: &ContentRecord) -> StorageResult<UpsertOutcome>;

    fn get(&self, id: &str) -> StorageResult<Option<ContentRecord>>;

    fn count_for_game(&self, game_id: &str) -> StorageResult<u64>;

    /// Record counts per source for one game, sorted by source name
    fn counts_by_source(&self, game_id: &str) -> StorageResult<Vec<SourceCount>>;

    /// Oldest-ingested records still waiting for sentiment analysis
    fn unanalyzed(&self, game_id: &str, limit: usize) -> StorageResult<Vec<ContentRecord>>;

    /// Writes analysis results for one record; `false` if the id is unknown
    fn record_analysis(&mut self, id: &str, analysis: &Analysis) -> StorageResult<bool>;

    // ===== Run bookkeeping =====

    fn create_run(
        &mut self,
        game_id: &str,
        started_at: DateTime<Utc>,
        cutoff: DateTime<Utc>,
    ) -> StorageResult<i64>;

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        totals: &RunTotals,
        finished_at: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Most recent run, optionally restricted to one game
    fn latest_run(&self, game_id: Option<&str>) -> StorageResult<Option<RunRecord>>;
}
