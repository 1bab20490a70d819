// Synchronous record index shared by the entry store adapters.
//
// Responsibilities
// - Hold every record by identity and the live ones by start time.
// - Enforce unique live start times.
// - Answer the ordered queries of the EntryStore port.
//
// Notes
// - put returns the record it replaced so adapters can roll back a failed persist with restore.
// - restore trusts its caller. reinstate is the checked variant for rewinding on request.

use crate::modules::time_log::core::entry::{Entry, SyncData};
use crate::shared::core::primitives::Timestamp;
use crate::shared::infrastructure::entry_store::{BatchOutcome, StoreError};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct EntryIndex {
    records: HashMap<Uuid, SyncData>,
    by_start: BTreeMap<Timestamp, Uuid>,
}

impl EntryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds an index from persisted records. Two live records sharing a start time mean a corrupt medium.
    pub fn from_records(records: Vec<SyncData>) -> Result<Self, StoreError> {
        let mut index = Self::new();
        for record in records {
            let id = record.id();
            if index.records.contains_key(&id) {
                return Err(StoreError::Corrupt(format!("duplicate record {id}")));
            }
            index.put(record).map_err(|err| match err {
                StoreError::DuplicateStartTime { start_time } => {
                    StoreError::Corrupt(format!("duplicate start time {start_time}"))
                }
                other => other,
            })?;
        }
        Ok(index)
    }

    /// Every record, tombstones included, ordered by id for stable serialization.
    pub fn records(&self) -> Vec<SyncData> {
        let mut records: Vec<SyncData> = self.records.values().cloned().collect();
        records.sort_by_key(SyncData::id);
        records
    }

    pub fn len(&self) -> usize {
        self.by_start.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_start.is_empty()
    }

    pub fn live(&self) -> Vec<Entry> {
        self.collect(self.by_start.values())
    }

    pub fn get(&self, id: Uuid) -> Option<Entry> {
        self.records
            .get(&id)
            .filter(|record| !record.deleted)
            .map(|record| record.entry.clone())
    }

    pub fn record(&self, id: Uuid) -> Option<SyncData> {
        self.records.get(&id).cloned()
    }

    pub fn entry_at(&self, start_time: Timestamp) -> Option<Entry> {
        self.by_start
            .get(&start_time)
            .and_then(|id| self.get(*id))
    }

    pub fn next_after(&self, start_time: Timestamp) -> Option<Entry> {
        self.by_start
            .range((Bound::Excluded(start_time), Bound::Unbounded))
            .next()
            .and_then(|(_, id)| self.get(*id))
    }

    pub fn range_by_time(&self, begin: Timestamp, end: Timestamp, category: &str) -> Vec<Entry> {
        if begin >= end {
            return Vec::new();
        }
        self.collect(self.by_start.range(begin..end).map(|(_, id)| id))
            .into_iter()
            .filter(|entry| category.is_empty() || entry.category == category)
            .collect()
    }

    pub fn range_after(&self, from: Timestamp, limit: usize) -> Vec<Entry> {
        self.collect(
            self.by_start
                .range((Bound::Excluded(from), Bound::Unbounded))
                .take(limit)
                .map(|(_, id)| id),
        )
    }

    pub fn range_before(&self, until: Timestamp, limit: usize) -> Vec<Entry> {
        let mut entries = self.collect(
            self.by_start
                .range(..until)
                .rev()
                .take(limit)
                .map(|(_, id)| id),
        );
        entries.reverse();
        entries
    }

    pub fn in_category(&self, category: &str) -> Vec<Entry> {
        self.live()
            .into_iter()
            .filter(|entry| entry.category == category)
            .collect()
    }

    pub fn modified_between(&self, begin: Timestamp, end: Timestamp) -> Vec<SyncData> {
        let mut records: Vec<SyncData> = self
            .records
            .values()
            .filter(|record| record.mtime >= begin && record.mtime < end)
            .cloned()
            .collect();
        records.sort_by_key(SyncData::id);
        records
    }

    /// Inserts or replaces a record and returns the one it replaced.
    pub fn put(&mut self, record: SyncData) -> Result<Option<SyncData>, StoreError> {
        let id = record.id();
        if !record.deleted
            && let Some(holder) = self.by_start.get(&record.entry.start_time)
            && *holder != id
        {
            return Err(StoreError::DuplicateStartTime {
                start_time: record.entry.start_time,
            });
        }

        let previous = self.records.insert(id, record.clone());
        if let Some(old) = previous.as_ref().filter(|old| !old.deleted) {
            self.by_start.remove(&old.entry.start_time);
        }
        if !record.deleted {
            self.by_start.insert(record.entry.start_time, id);
        }
        Ok(previous)
    }

    /// Applies records in order. A rejected record leaves the index as it was and the rest go on.
    pub fn put_all(&mut self, records: Vec<SyncData>) -> Vec<BatchOutcome> {
        records.into_iter().map(|record| self.put(record)).collect()
    }

    /// Undoes a put: reinstates `previous`, or forgets the id when there was none.
    /// Returns the record it dropped.
    pub fn restore(&mut self, id: Uuid, previous: Option<SyncData>) -> Option<SyncData> {
        let current = self.records.remove(&id);
        if let Some(old) = current.as_ref().filter(|old| !old.deleted) {
            self.by_start.remove(&old.entry.start_time);
        }
        if let Some(record) = previous {
            if !record.deleted {
                self.by_start.insert(record.entry.start_time, id);
            }
            self.records.insert(id, record);
        }
        current
    }

    /// Like restore, but a live record may not take a start time held by another entry.
    pub fn reinstate(
        &mut self,
        id: Uuid,
        previous: Option<SyncData>,
    ) -> Result<Option<SyncData>, StoreError> {
        if let Some(record) = previous.as_ref().filter(|record| !record.deleted)
            && let Some(holder) = self.by_start.get(&record.entry.start_time)
            && *holder != id
        {
            return Err(StoreError::DuplicateStartTime {
                start_time: record.entry.start_time,
            });
        }
        Ok(self.restore(id, previous))
    }

    fn collect<'a>(&self, ids: impl Iterator<Item = &'a Uuid>) -> Vec<Entry> {
        ids.filter_map(|id| self.get(*id)).collect()
    }
}
