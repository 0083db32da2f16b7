//! `ItemSink` that turns discovered items into stored records

use crate::adapters::{Adapter, AdapterContext, Extraction, ItemHandle, ItemSink};
use crate::storage::{BackupLedger, ContentStore, UpsertOutcome};
use tracing::{debug, error};

/// Per-target counters kept by a `RecordSink`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkTally {
    /// Handles received from discovery
    pub seen: u64,
    pub inserted: u64,
    pub duplicate: u64,
    pub skipped: u64,

    /// Records the store refused
    pub failed: u64,

    pub ledger_failures: u64,
}

/// Extracts each handle, backs the record up, then upserts it
///
/// The ledger line is written before the store write. A ledger failure is
/// logged and the upsert still happens; a store failure is logged and
/// counted. Neither stops the target.
pub struct RecordSink<'a> {
    adapter: Adapter,
    ctx: &'a AdapterContext,
    target_url: String,
    store: &'a mut dyn ContentStore,
    ledger: &'a mut BackupLedger,
    tally: SinkTally,
}

impl<'a> RecordSink<'a> {
    pub fn new(
        adapter: Adapter,
        ctx: &'a AdapterContext,
        target_url: &str,
        store: &'a mut dyn ContentStore,
        ledger: &'a mut BackupLedger,
    ) -> Self {
        Self {
            adapter,
            ctx,
            target_url: target_url.to_string(),
            store,
            ledger,
            tally: SinkTally::default(),
        }
    }

    pub fn tally(&self) -> SinkTally {
        self.tally
    }

    fn store_one(&mut self, handle: &ItemHandle) {
        self.tally.seen += 1;
        let record = match self.adapter.extract(handle, self.ctx) {
            Extraction::Record(record) => record,
            Extraction::Skipped(reason) => {
                debug!("{}: item skipped ({})", self.adapter, reason);
                self.tally.skipped += 1;
                return;
            }
        };

        if let Err(e) = self.ledger.append(&record, &self.target_url) {
            error!("{}: backup ledger write failed for {}: {}", self.adapter, record.id, e);
            self.tally.ledger_failures += 1;
        }

        match self.store.upsert(&record) {
            Ok(UpsertOutcome::Inserted) => self.tally.inserted += 1,
            Ok(UpsertOutcome::AlreadyPresent) => {
                debug!("{}: {} already stored", self.adapter, record.id);
                self.tally.duplicate += 1;
            }
            Err(e) => {
                error!("{}: storing {} failed: {}", self.adapter, record.id, e);
                self.tally.failed += 1;
            }
        }
    }
}

impl ItemSink for RecordSink<'_> {
    fn accept(&mut self, batch: Vec<ItemHandle>) {
        for handle in &batch {
            self.store_one(handle);
        }
    }
}
