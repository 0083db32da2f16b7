//! Database schema definitions
//!
//! `reviews` holds one row per content record. The sentiment columns belong
//! to the downstream analysis engine: the ingestion core creates them empty
//! and never reads them back.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per extracted piece of commentary, keyed by content hash
CREATE TABLE IF NOT EXISTS reviews (
    id TEXT PRIMARY KEY,
    game_id TEXT NOT NULL,
    source TEXT NOT NULL,
    author TEXT NOT NULL,
    rating REAL NOT NULL DEFAULT -1,
    content TEXT NOT NULL,
    occurred_at TEXT,
    canonical_date TEXT NOT NULL,
    raw_date TEXT NOT NULL,
    context_title TEXT,
    context_url TEXT,
    ingested_at TEXT NOT NULL,
    sentiment_score REAL,
    sentiment_label TEXT,
    detailed_analysis TEXT,
    analyzed INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_reviews_game ON reviews(game_id);
CREATE INDEX IF NOT EXISTS idx_reviews_analyzed ON reviews(analyzed);
CREATE INDEX IF NOT EXISTS idx_reviews_source ON reviews(game_id, source);

-- One row per crawl run
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    game_id TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    cutoff TEXT NOT NULL,
    status TEXT NOT NULL,
    targets_total INTEGER NOT NULL DEFAULT 0,
    targets_failed INTEGER NOT NULL DEFAULT 0,
    records_inserted INTEGER NOT NULL DEFAULT 0,
    records_duplicate INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_runs_game ON runs(game_id);
"#;

/// Creates any missing tables and indexes
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)
}
