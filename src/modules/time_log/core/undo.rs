// Undo log: a bounded stack of reversible operation records.
//
// Responsibilities
// - Remember the store records a mutation replaced, revision markers and tombstones included.
// - Translate a record into the inverse action the executor has to perform.
//
// Notes
// - Pushing past the limit evicts the oldest record.
// - depth() is the undo count reported to observers.
// - An inverse writes the remembered records back verbatim, so the store ends up exactly as before.

use crate::modules::time_log::core::entry::{Entry, Fields, SyncData};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoRecord {
    /// `previous` is whatever the store held for the identity before, usually nothing.
    Inserted {
        entry: Entry,
        previous: Option<SyncData>,
    },
    Removed(SyncData),
    Edited {
        before: Vec<SyncData>,
        fields: Vec<Fields>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inverse {
    /// Drop an entry that was inserted and reinstate what its identity held before.
    Remove {
        entry: Entry,
        previous: Option<SyncData>,
    },
    /// Put back the live record of an entry that was removed.
    Restore(SyncData),
    /// Put back the records of edited entries.
    Revert {
        records: Vec<SyncData>,
        fields: Vec<Fields>,
    },
}

impl UndoRecord {
    pub fn inverse(self) -> Inverse {
        match self {
            UndoRecord::Inserted { entry, previous } => Inverse::Remove { entry, previous },
            UndoRecord::Removed(record) => Inverse::Restore(record),
            UndoRecord::Edited { before, fields } => Inverse::Revert {
                records: before,
                fields,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct UndoLog {
    records: VecDeque<UndoRecord>,
    limit: usize,
}

impl UndoLog {
    pub fn new(limit: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(limit.min(64)),
            limit,
        }
    }

    pub fn push(&mut self, record: UndoRecord) {
        if self.limit == 0 {
            return;
        }
        if self.records.len() == self.limit {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn pop(&mut self) -> Option<UndoRecord> {
        self.records.pop_back()
    }

    pub fn depth(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
