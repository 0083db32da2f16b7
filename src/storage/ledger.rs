//! Per-source JSON-lines backup of every extracted record
//!
//! Each record is appended to `<backup_dir>/<source_name>_backup.jsonl` and
//! flushed before it is written to the store, so the ledger always holds at
//! least what the store holds.

use crate::record::ContentRecord;
use crate::storage::StorageResult;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One ledger line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub game_id: String,
    pub source: String,
    pub author: String,
    pub content: String,
    pub rating: f64,
    pub raw_date: String,
    pub parsed_date: String,
    pub context_title: Option<String>,
    pub context_url: Option<String>,
    pub target_url: String,
    pub crawled_at: String,
}

impl LedgerEntry {
    pub fn new(record: &ContentRecord, target_url: &str) -> Self {
        Self {
            id: record.id.clone(),
            game_id: record.game_id.clone(),
            source: record.source_name.clone(),
            author: record.author.clone(),
            content: record.content.clone(),
            rating: record.rating,
            raw_date: record.raw_date_text.clone(),
            parsed_date: record.canonical_date.clone(),
            context_title: record.context.as_ref().map(|c| c.title.clone()),
            context_url: record.context.as_ref().map(|c| c.url.clone()),
            target_url: target_url.to_string(),
            crawled_at: record.ingested_at.to_rfc3339(),
        }
    }
}

/// Append-only backup files, one per source
#[derive(Debug)]
pub struct BackupLedger {
    dir: PathBuf,
    files: HashMap<String, File>,
}

impl BackupLedger {
    /// Creates the backup directory if it does not exist yet
    pub fn open(dir: &Path) -> StorageResult<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            files: HashMap::new(),
        })
    }

    /// Path of the ledger file for one source
    pub fn path_for(&self, source_name: &str) -> PathBuf {
        self.dir.join(format!("{}_backup.jsonl", source_name))
    }

    /// Appends one record and flushes it to disk
    pub fn append(&mut self, record: &ContentRecord, target_url: &str) -> StorageResult<()> {
        let mut line = serde_json::to_string(&LedgerEntry::new(record, target_url))?;
        line.push('\n');

        let path = self.path_for(&record.source_name);
        let file = match self.files.entry(record.source_name.clone()) {
            Entry::Occupied(open) => open.into_mut(),
            Entry::Vacant(slot) => {
                debug!("Opening backup ledger {}", path.display());
                slot.insert(OpenOptions::new().create(true).append(true).open(&path)?)
            }
        };
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Reads every entry of one source's ledger (missing file → empty)
    pub fn read(&self, source_name: &str) -> StorageResult<Vec<LedgerEntry>> {
        let path = self.path_for(source_name);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(path)?;
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(Into::into))
            .collect()
    }
}
