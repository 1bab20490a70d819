// Entry store port: the durable keyed collection behind the history.
//
// Purpose
// - Describe what the command executor needs from storage, without implementing it.
//
// Responsibilities
// - Lookups by identity and by start time, ordered range queries, category scans.
// - Revision-stamped records (tombstones included) for sync.
// - Writes are atomic per record: all fields land together or nothing changes.
// - put_all lands a batch as one write. restore rewinds an identity to an earlier record.
//
// Boundaries
// - Only live entries are visible to get and the range queries. Tombstones surface through record and modified_between.
// - Live start times are unique. put rejects a collision with DuplicateStartTime.
//
// Testing guidance
// - InMemoryEntryStore for tests and local development. JsonFileEntryStore for durable use.

use crate::modules::time_log::core::entry::{Entry, SyncData};
use crate::shared::core::primitives::Timestamp;
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("backend error: {0}")]
    Backend(String),

    #[error("corrupt store: {0}")]
    Corrupt(String),

    #[error("start time {start_time} is already taken")]
    DuplicateStartTime { start_time: Timestamp },
}

impl StoreError {
    /// The medium itself failed, as opposed to a rejected write.
    pub fn is_io_failure(&self) -> bool {
        matches!(self, StoreError::Backend(_) | StoreError::Corrupt(_))
    }
}

/// Per-record result of a batch write: the record it replaced, or why it was skipped.
pub type BatchOutcome = Result<Option<SyncData>, StoreError>;

#[async_trait]
pub trait EntryStore: Send + Sync {
    /// All live entries in ascending start time.
    async fn load_all(&self) -> Result<Vec<Entry>, StoreError>;
    async fn get(&self, id: Uuid) -> Result<Option<Entry>, StoreError>;
    /// Live record or tombstone for an identity.
    async fn record(&self, id: Uuid) -> Result<Option<SyncData>, StoreError>;
    async fn entry_at(&self, start_time: Timestamp) -> Result<Option<Entry>, StoreError>;
    /// First live entry starting strictly after `start_time`.
    async fn next_after(&self, start_time: Timestamp) -> Result<Option<Entry>, StoreError>;
    /// Entries with `begin <= start_time < end`. An empty category matches all.
    async fn range_by_time(
        &self,
        begin: Timestamp,
        end: Timestamp,
        category: &str,
    ) -> Result<Vec<Entry>, StoreError>;
    /// The first `limit` entries starting strictly after `from`.
    async fn range_after(&self, from: Timestamp, limit: usize) -> Result<Vec<Entry>, StoreError>;
    /// The last `limit` entries starting strictly before `until`, in ascending order.
    async fn range_before(&self, until: Timestamp, limit: usize)
    -> Result<Vec<Entry>, StoreError>;
    async fn in_category(&self, category: &str) -> Result<Vec<Entry>, StoreError>;
    /// Records (tombstones included) with `begin <= mtime < end`, sorted by id.
    async fn modified_between(
        &self,
        begin: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<SyncData>, StoreError>;
    /// Inserts or replaces a record. A deleted record turns the entry into a tombstone.
    async fn put(&self, record: SyncData) -> Result<(), StoreError>;
    /// Tombstones a live entry and returns it. Unknown or already removed ids yield None.
    async fn delete(&self, id: Uuid, mtime: Timestamp) -> Result<Option<Entry>, StoreError>;
    /// Writes records in order as a single write. A record whose start time is taken is skipped
    /// and reported at its position. A medium failure rejects the whole batch.
    async fn put_all(&self, records: Vec<SyncData>) -> Result<Vec<BatchOutcome>, StoreError>;
    /// Puts an identity back to an earlier record, or forgets it when `previous` is None.
    /// Returns the record it replaced.
    async fn restore(
        &self,
        id: Uuid,
        previous: Option<SyncData>,
    ) -> Result<Option<SyncData>, StoreError>;
}

pub mod in_memory;
pub mod index;
pub mod json_file;
