//! In-memory repository with copy-on-write snapshots

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::error::{LibraryError, Result};
use crate::models::{ordering_key, MetadataRecord};
use crate::repositories::{validate_batch, MetadataRepository};

#[derive(Debug, Clone)]
struct Entry<R> {
    seq: u64,
    record: R,
}

/// Immutable view of the store. Writers build a new one and swap it in.
#[derive(Debug)]
struct Snapshot<R> {
    entries: Vec<Entry<R>>,
    positions: HashMap<String, usize>,
    next_seq: u64,
}

impl<R: MetadataRecord> Snapshot<R> {
    fn empty() -> Self {
        Self {
            entries: Vec::new(),
            positions: HashMap::new(),
            next_seq: 0,
        }
    }

    fn rebuild(mut entries: Vec<Entry<R>>, next_seq: u64) -> Result<Self> {
        entries.sort_by_key(|entry| ordering_key(&entry.record, entry.seq));

        let mut positions = HashMap::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            if positions
                .insert(entry.record.id().to_string(), position)
                .is_some()
            {
                return Err(LibraryError::Corruption(format!(
                    "duplicate {} id {} in snapshot",
                    R::KIND,
                    entry.record.id()
                )));
            }
        }

        Ok(Self {
            entries,
            positions,
            next_seq,
        })
    }

    fn lookup(&self, id: &str) -> Result<Option<&R>> {
        let Some(&position) = self.positions.get(id) else {
            return Ok(None);
        };
        match self.entries.get(position) {
            Some(entry) if entry.record.id() == id => Ok(Some(&entry.record)),
            _ => Err(LibraryError::Corruption(format!(
                "{} index points {} at position {} which holds another record",
                R::KIND,
                id,
                position
            ))),
        }
    }
}

/// Repository kept entirely in memory.
///
/// Reads clone an `Arc` to the current snapshot and never wait for writers
/// beyond that pointer copy. Writes take the writer gate, build a new
/// snapshot from the current one and publish it in a single swap.
pub struct InMemoryRepository<R> {
    writer: Mutex<()>,
    snapshot: RwLock<Arc<Snapshot<R>>>,
}

impl<R: MetadataRecord> InMemoryRepository<R> {
    pub fn new() -> Self {
        Self {
            writer: Mutex::new(()),
            snapshot: RwLock::new(Arc::new(Snapshot::empty())),
        }
    }

    async fn current(&self) -> Arc<Snapshot<R>> {
        self.snapshot.read().await.clone()
    }
}

impl<R: MetadataRecord> Default for InMemoryRepository<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: MetadataRecord> MetadataRepository<R> for InMemoryRepository<R> {
    async fn add_or_update(&self, records: Vec<R>) -> Result<()> {
        validate_batch(&records)?;
        if records.is_empty() {
            return Ok(());
        }

        let _gate = self.writer.lock().await;
        let current = self.current().await;

        let mut entries = current.entries.clone();
        let mut positions = current.positions.clone();
        let mut next_seq = current.next_seq;
        let (mut inserted, mut updated) = (0usize, 0usize);

        for record in records {
            match positions.get(record.id()) {
                Some(&position) => {
                    let entry = entries.get_mut(position).ok_or_else(|| {
                        LibraryError::Corruption(format!(
                            "{} index references missing position {}",
                            R::KIND,
                            position
                        ))
                    })?;
                    entry.record = record;
                    updated += 1;
                }
                None => {
                    positions.insert(record.id().to_string(), entries.len());
                    entries.push(Entry {
                        seq: next_seq,
                        record,
                    });
                    next_seq += 1;
                    inserted += 1;
                }
            }
        }

        let next = Snapshot::rebuild(entries, next_seq)?;
        *self.snapshot.write().await = Arc::new(next);

        debug!(kind = %R::KIND, inserted, updated, "Applied metadata upsert");
        Ok(())
    }

    async fn get_items(&self, offset: usize, limit: usize) -> Result<Vec<R>> {
        let snapshot = self.current().await;
        Ok(snapshot
            .entries
            .iter()
            .skip(offset)
            .take(limit)
            .map(|entry| entry.record.clone())
            .collect())
    }

    async fn get_item(&self, id: &str) -> Result<Option<R>> {
        let snapshot = self.current().await;
        Ok(snapshot.lookup(id)?.cloned())
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let _gate = self.writer.lock().await;
        let current = self.current().await;
        if current.lookup(id)?.is_none() {
            return Ok(false);
        }

        let entries = current
            .entries
            .iter()
            .filter(|entry| entry.record.id() != id)
            .cloned()
            .collect();
        let next = Snapshot::rebuild(entries, current.next_seq)?;
        *self.snapshot.write().await = Arc::new(next);
        Ok(true)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.current().await.entries.len())
    }
}
