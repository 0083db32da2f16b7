//! SQLite implementation of `ContentStore`

use crate::record::{ContentRecord, ItemContext};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ContentStore, StorageError, StorageResult, UpsertOutcome};
use crate::storage::{Analysis, RunRecord, RunStatus, RunTotals, SourceCount};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const RECORD_COLUMNS: &str = "id, game_id, source, author, rating, content, occurred_at, \
     canonical_date, raw_date, context_title, context_url, ingested_at";

const RUN_COLUMNS: &str = "id, game_id, started_at, finished_at, cutoff, status, \
     targets_total, targets_failed, records_inserted, records_duplicate";

/// SQLite store backend
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens or creates the database, creating its parent directory if needed
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Database opened with the schema in place
    /// * `Err(StorageError)` - The file or schema could not be set up
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn to_text(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

/// Reads an RFC 3339 column back into a UTC timestamp
fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn optional_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(_) => timestamp(row, idx).map(Some),
        None => Ok(None),
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<ContentRecord> {
    let context_title: Option<String> = row.get(9)?;
    let context_url: Option<String> = row.get(10)?;
    let context = match (context_title, context_url) {
        (Some(title), Some(url)) => Some(ItemContext { title, url }),
        _ => None,
    };

    Ok(ContentRecord {
        id: row.get(0)?,
        game_id: row.get(1)?,
        source_name: row.get(2)?,
        author: row.get(3)?,
        rating: row.get(4)?,
        content: row.get(5)?,
        occurred_at: optional_timestamp(row, 6)?,
        canonical_date: row.get(7)?,
        raw_date_text: row.get(8)?,
        context,
        ingested_at: timestamp(row, 11)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    let status: String = row.get(5)?;
    Ok(RunRecord {
        id: row.get(0)?,
        game_id: row.get(1)?,
        started_at: timestamp(row, 2)?,
        finished_at: optional_timestamp(row, 3)?,
        cutoff: timestamp(row, 4)?,
        status: RunStatus::from_db_string(&status).unwrap_or(RunStatus::Failed),
        totals: RunTotals {
            targets_total: row.get(6)?,
            targets_failed: row.get(7)?,
            records_inserted: row.get::<_, i64>(8)? as u64,
            records_duplicate: row.get::<_, i64>(9)? as u64,
        },
    })
}

impl ContentStore for SqliteStore {
    fn upsert(&mut self, record: &ContentRecord) -> StorageResult<UpsertOutcome> {
        let (context_title, context_url) = match &record.context {
            Some(ctx) => (Some(ctx.title.as_str()), Some(ctx.url.as_str())),
            None => (None, None),
        };

        let changed = self.conn.execute(
            &format!(
                "INSERT OR IGNORE INTO reviews ({}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                RECORD_COLUMNS
            ),
            params![
                record.id,
                record.game_id,
                record.source_name,
                record.author,
                record.rating,
                record.content,
                record.occurred_at.as_ref().map(to_text),
                record.canonical_date,
                record.raw_date_text,
                context_title,
                context_url,
                to_text(&record.ingested_at),
            ],
        )?;

        Ok(if changed == 1 {
            UpsertOutcome::Inserted
        } else {
            UpsertOutcome::AlreadyPresent
        })
    }

    fn get(&self, id: &str) -> StorageResult<Option<ContentRecord>> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {} FROM reviews WHERE id = ?1", RECORD_COLUMNS),
                params![id],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn count_for_game(&self, game_id: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM reviews WHERE game_id = ?1",
            params![game_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn counts_by_source(&self, game_id: &str) -> StorageResult<Vec<SourceCount>> {
        let mut stmt = self.conn.prepare(
            "SELECT source, COUNT(*), SUM(analyzed) FROM reviews \
             WHERE game_id = ?1 GROUP BY source ORDER BY source",
        )?;

        let counts = stmt
            .query_map(params![game_id], |row| {
                Ok(SourceCount {
                    source_name: row.get(0)?,
                    total: row.get::<_, i64>(1)? as u64,
                    analyzed: row.get::<_, Option<i64>>(2)?.unwrap_or(0) as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(counts)
    }

    fn unanalyzed(&self, game_id: &str, limit: usize) -> StorageResult<Vec<ContentRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM reviews WHERE game_id = ?1 AND analyzed = 0 \
             ORDER BY ingested_at, id LIMIT ?2",
            RECORD_COLUMNS
        ))?;

        let records = stmt
            .query_map(params![game_id, limit as i64], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn record_analysis(&mut self, id: &str, analysis: &Analysis) -> StorageResult<bool> {
        let changed = self.conn.execute(
            "UPDATE reviews SET sentiment_score = ?1, sentiment_label = ?2, \
             detailed_analysis = ?3, analyzed = 1 WHERE id = ?4",
            params![analysis.score, analysis.label, analysis.detailed, id],
        )?;
        Ok(changed == 1)
    }

    fn create_run(
        &mut self,
        game_id: &str,
        started_at: DateTime<Utc>,
        cutoff: DateTime<Utc>,
    ) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO runs (game_id, started_at, cutoff, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                game_id,
                to_text(&started_at),
                to_text(&cutoff),
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        totals: &RunTotals,
        finished_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, targets_total = ?3, \
             targets_failed = ?4, records_inserted = ?5, records_duplicate = ?6 WHERE id = ?7",
            params![
                status.to_db_string(),
                to_text(&finished_at),
                totals.targets_total,
                totals.targets_failed,
                totals.records_inserted as i64,
                totals.records_duplicate as i64,
                run_id
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn latest_run(&self, game_id: Option<&str>) -> StorageResult<Option<RunRecord>> {
        let run = match game_id {
            Some(game_id) => self
                .conn
                .query_row(
                    &format!(
                        "SELECT {} FROM runs WHERE game_id = ?1 ORDER BY id DESC LIMIT 1",
                        RUN_COLUMNS
                    ),
                    params![game_id],
                    run_from_row,
                )
                .optional()?,
            None => self
                .conn
                .query_row(
                    &format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
                    [],
                    run_from_row,
                )
                .optional()?,
        };
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, hour, 0, 0).unwrap()
    }

    fn record(id: &str, source: &str, ingested_at: DateTime<Utc>) -> ContentRecord {
        ContentRecord {
            id: id.to_string(),
            game_id: "game".to_string(),
            author: "alice".to_string(),
            rating: 4.0,
            content: format!("content {}", id),
            occurred_at: Some(at(1)),
            canonical_date: "2024-06-15".to_string(),
            source_name: source.to_string(),
            context: Some(ItemContext {
                title: "Thread".to_string(),
                url: "https://example.com/t".to_string(),
            }),
            raw_date_text: "2024-06-15 01:00".to_string(),
            ingested_at,
        }
    }

    #[test]
    fn test_insert_then_get() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        let rec = record("a", "qoo", at(2));
        assert_eq!(store.upsert(&rec).unwrap(), UpsertOutcome::Inserted);
        assert_eq!(store.get("a").unwrap(), Some(rec));
        assert_eq!(store.get("missing").unwrap(), None);
    }

    #[test]
    fn test_existing_id_is_never_overwritten() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        let first = record("a", "qoo", at(2));
        store.upsert(&first).unwrap();

        let mut later = record("a", "qoo", at(14));
        later.content = "changed".to_string();
        assert_eq!(store.upsert(&later).unwrap(), UpsertOutcome::AlreadyPresent);

        let stored = store.get("a").unwrap().unwrap();
        assert_eq!(stored.ingested_at, at(2));
        assert_eq!(stored.content, "content a");
        assert_eq!(store.count_for_game("game").unwrap(), 1);
    }

    #[test]
    fn test_sentinel_fields_roundtrip() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        let mut rec = record("u", "youtube", at(3));
        rec.occurred_at = None;
        rec.context = None;
        rec.rating = -1.0;
        rec.canonical_date = "Unknown".to_string();
        store.upsert(&rec).unwrap();
        assert_eq!(store.get("u").unwrap(), Some(rec));
    }

    #[test]
    fn test_counts_and_analysis() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        store.upsert(&record("a", "qoo", at(1))).unwrap();
        store.upsert(&record("b", "qoo", at(2))).unwrap();
        store.upsert(&record("c", "bahamut", at(3))).unwrap();

        let analysis = Analysis {
            score: 0.8,
            label: "positive".to_string(),
            detailed: "{}".to_string(),
        };
        assert!(store.record_analysis("a", &analysis).unwrap());
        assert!(!store.record_analysis("nope", &analysis).unwrap());

        let counts = store.counts_by_source("game").unwrap();
        assert_eq!(
            counts,
            vec![
                SourceCount {
                    source_name: "bahamut".to_string(),
                    total: 1,
                    analyzed: 0
                },
                SourceCount {
                    source_name: "qoo".to_string(),
                    total: 2,
                    analyzed: 1
                },
            ]
        );

        let pending: Vec<String> = store
            .unanalyzed("game", 10)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(pending, vec!["b".to_string(), "c".to_string()]);
        assert_eq!(store.unanalyzed("game", 1).unwrap().len(), 1);
        assert!(store.counts_by_source("other").unwrap().is_empty());
    }

    #[test]
    fn test_run_lifecycle() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        assert_eq!(store.latest_run(None).unwrap(), None);

        let cutoff = at(0) - Duration::days(30);
        let id = store.create_run("game", at(0), cutoff).unwrap();
        let running = store.latest_run(Some("game")).unwrap().unwrap();
        assert_eq!(running.status, RunStatus::Running);
        assert_eq!(running.cutoff, cutoff);
        assert_eq!(running.finished_at, None);

        let totals = RunTotals {
            targets_total: 3,
            targets_failed: 1,
            records_inserted: 40,
            records_duplicate: 2,
        };
        store.finish_run(id, RunStatus::Completed, &totals, at(1)).unwrap();

        let done = store.latest_run(None).unwrap().unwrap();
        assert_eq!(done.status, RunStatus::Completed);
        assert_eq!(done.totals, totals);
        assert_eq!(done.finished_at, Some(at(1)));
        assert_eq!(store.latest_run(Some("other")).unwrap(), None);
    }

    #[test]
    fn test_finish_unknown_run() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        let result = store.finish_run(42, RunStatus::Failed, &RunTotals::default(), at(1));
        assert!(matches!(result, Err(StorageError::RunNotFound(42))));
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("reviews.db");
        let mut store = SqliteStore::new(&path).unwrap();
        store.upsert(&record("a", "qoo", at(1))).unwrap();
        drop(store);

        let reopened = SqliteStore::new(&path).unwrap();
        assert_eq!(reopened.count_for_game("game").unwrap(), 1);
    }
}
