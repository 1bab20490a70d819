// Time log entry and the shapes derived from it.
//
// Purpose
// - Entry is the stored record: identity, start time, category and comment.
// - HistoryEntry is what range queries hand out: the entry plus its derived duration.
// - SyncData is the reconciliation unit: an entry stamped with a revision marker and a deleted flag.
//
// Duration
// - Never stored. It is the delta to the start of the next entry in chronological order.
// - None marks an open duration: the most recent entry has no successor yet.

use crate::shared::core::primitives::Timestamp;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

bitflags! {
    /// Fields of an entry that an edit is allowed to change.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Fields: u8 {
        const START_TIME = 0b001;
        const CATEGORY = 0b010;
        const COMMENT = 0b100;
    }
}

impl Default for Fields {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entry {
    pub id: Uuid,
    pub start_time: Timestamp,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub comment: String,
}

impl Entry {
    /// Builds an entry without identity; the executor assigns one on insert.
    pub fn new(
        start_time: Timestamp,
        category: impl Into<String>,
        comment: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::nil(),
            start_time,
            category: category.into(),
            comment: comment.into(),
        }
    }

    pub fn is_assigned(&self) -> bool {
        !self.id.is_nil()
    }

    /// Copies the fields selected by `fields` from `source`. Identity never changes.
    pub fn apply(&mut self, source: &Entry, fields: Fields) {
        if fields.contains(Fields::START_TIME) {
            self.start_time = source.start_time;
        }
        if fields.contains(Fields::CATEGORY) {
            self.category = source.category.clone();
        }
        if fields.contains(Fields::COMMENT) {
            self.comment = source.comment.clone();
        }
    }

    pub fn diff(&self, other: &Entry) -> Fields {
        let mut fields = Fields::empty();
        if self.start_time != other.start_time {
            fields |= Fields::START_TIME;
        }
        if self.category != other.category {
            fields |= Fields::CATEGORY;
        }
        if self.comment != other.comment {
            fields |= Fields::COMMENT;
        }
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub entry: Entry,
    pub duration: Option<i64>,
}

impl HistoryEntry {
    pub fn new(entry: Entry, next_start: Option<Timestamp>) -> Self {
        let duration = next_start.map(|next| next.saturating_sub(entry.start_time));
        Self { entry, duration }
    }

    pub fn is_open(&self) -> bool {
        self.duration.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncData {
    #[serde(flatten)]
    pub entry: Entry,
    pub mtime: Timestamp,
    #[serde(default)]
    pub deleted: bool,
}

impl SyncData {
    pub fn live(entry: Entry, mtime: Timestamp) -> Self {
        Self {
            entry,
            mtime,
            deleted: false,
        }
    }

    /// Tombstone keeping the last known content of a removed entry.
    pub fn removed(entry: Entry, mtime: Timestamp) -> Self {
        Self {
            entry,
            mtime,
            deleted: true,
        }
    }

    pub fn id(&self) -> Uuid {
        self.entry.id
    }

    /// Same visible state, revision marker aside. Tombstones compare equal regardless of content.
    pub fn same_content(&self, other: &SyncData) -> bool {
        match (self.deleted, other.deleted) {
            (true, true) => true,
            (false, false) => self.entry == other.entry,
            _ => false,
        }
    }
}
