// In memory implementation of the EntryStore port.
//
// Purpose
// - Support executor tests and local development without a data file.
//
// Responsibilities
// - Keep records in an EntryIndex behind a lock.
// - Simulate an unreadable medium with toggle_offline.

use crate::modules::time_log::core::entry::{Entry, SyncData};
use crate::shared::core::primitives::Timestamp;
use crate::shared::infrastructure::entry_store::index::EntryIndex;
use crate::shared::infrastructure::entry_store::{BatchOutcome, EntryStore, StoreError};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryEntryStore {
    index: RwLock<EntryIndex>,
    offline: AtomicBool,
}

impl InMemoryEntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<SyncData>) -> Result<Self, StoreError> {
        Ok(Self {
            index: RwLock::new(EntryIndex::from_records(records)?),
            offline: AtomicBool::new(false),
        })
    }

    pub fn toggle_offline(&self) {
        self.offline.fetch_xor(true, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("Entry store offline".into()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl EntryStore for InMemoryEntryStore {
    async fn load_all(&self) -> Result<Vec<Entry>, StoreError> {
        self.ensure_online()?;
        Ok(self.index.read().await.live())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Entry>, StoreError> {
        self.ensure_online()?;
        Ok(self.index.read().await.get(id))
    }

    async fn record(&self, id: Uuid) -> Result<Option<SyncData>, StoreError> {
        self.ensure_online()?;
        Ok(self.index.read().await.record(id))
    }

    async fn entry_at(&self, start_time: Timestamp) -> Result<Option<Entry>, StoreError> {
        self.ensure_online()?;
        Ok(self.index.read().await.entry_at(start_time))
    }

    async fn next_after(&self, start_time: Timestamp) -> Result<Option<Entry>, StoreError> {
        self.ensure_online()?;
        Ok(self.index.read().await.next_after(start_time))
    }

    async fn range_by_time(
        &self,
        begin: Timestamp,
        end: Timestamp,
        category: &str,
    ) -> Result<Vec<Entry>, StoreError> {
        self.ensure_online()?;
        Ok(self.index.read().await.range_by_time(begin, end, category))
    }

    async fn range_after(&self, from: Timestamp, limit: usize) -> Result<Vec<Entry>, StoreError> {
        self.ensure_online()?;
        Ok(self.index.read().await.range_after(from, limit))
    }

    async fn range_before(
        &self,
        until: Timestamp,
        limit: usize,
    ) -> Result<Vec<Entry>, StoreError> {
        self.ensure_online()?;
        Ok(self.index.read().await.range_before(until, limit))
    }

    async fn in_category(&self, category: &str) -> Result<Vec<Entry>, StoreError> {
        self.ensure_online()?;
        Ok(self.index.read().await.in_category(category))
    }

    async fn modified_between(
        &self,
        begin: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<SyncData>, StoreError> {
        self.ensure_online()?;
        Ok(self.index.read().await.modified_between(begin, end))
    }

    async fn put(&self, record: SyncData) -> Result<(), StoreError> {
        self.ensure_online()?;
        self.index.write().await.put(record)?;
        Ok(())
    }

    async fn delete(&self, id: Uuid, mtime: Timestamp) -> Result<Option<Entry>, StoreError> {
        self.ensure_online()?;
        let mut index = self.index.write().await;
        let Some(entry) = index.get(id) else {
            return Ok(None);
        };
        index.put(SyncData::removed(entry.clone(), mtime))?;
        Ok(Some(entry))
    }

    async fn put_all(&self, records: Vec<SyncData>) -> Result<Vec<BatchOutcome>, StoreError> {
        self.ensure_online()?;
        Ok(self.index.write().await.put_all(records))
    }

    async fn restore(
        &self,
        id: Uuid,
        previous: Option<SyncData>,
    ) -> Result<Option<SyncData>, StoreError> {
        self.ensure_online()?;
        self.index.write().await.reinstate(id, previous)
    }
}
