// Notifications emitted by the history executor.
//
// Purpose
// - One-way events fanned out to any number of subscribers.
// - Payloads are owned copies, never views into executor state.
//
// Request ids
// - Queries carry a caller chosen request id that comes back on the matching completion.
// - Fire-and-forget commands have no request id.

use crate::modules::time_log::application::errors::HistoryError;
use crate::modules::time_log::core::entry::{Entry, Fields, HistoryEntry, SyncData};
use crate::modules::time_log::core::stats::StatsEntry;
use crate::modules::time_log::core::sync::SyncStats;
use crate::shared::core::primitives::Timestamp;
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Insert,
    Import,
    Remove,
    Edit,
    EditCategory,
    Undo,
    Sync,
    HistoryBetween,
    HistoryAfter,
    HistoryBefore,
    Stats,
    SyncData,
    SyncStats,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Insert => "insert",
            Operation::Import => "import",
            Operation::Remove => "remove",
            Operation::Edit => "edit",
            Operation::EditCategory => "edit_category",
            Operation::Undo => "undo",
            Operation::Sync => "sync",
            Operation::HistoryBetween => "history_between",
            Operation::HistoryAfter => "history_after",
            Operation::HistoryBefore => "history_before",
            Operation::Stats => "stats",
            Operation::SyncData => "sync_data",
            Operation::SyncStats => "sync_stats",
        }
    }

    /// Whether the operation writes to the store.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Operation::Insert
                | Operation::Import
                | Operation::Remove
                | Operation::Edit
                | Operation::EditCategory
                | Operation::Undo
                | Operation::Sync
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context of a failed command, enough to retry it or report it.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandFailure {
    pub operation: Operation,
    pub request_id: Option<u64>,
    pub entry_id: Option<Uuid>,
    pub error: HistoryError,
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.operation, self.error)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HistoryEvent {
    /// Stored data changed in a way that invalidates cached views.
    StoreOutdated,
    Error(CommandFailure),
    HistoryRequestCompleted {
        request_id: u64,
        entries: Vec<HistoryEntry>,
    },
    DataUpdated {
        entries: Vec<Entry>,
        fields: Vec<Fields>,
    },
    DataInserted(Entry),
    DataImported(Vec<Entry>),
    DataRemoved(Entry),
    SizeChanged(u64),
    UndoCountChanged(usize),
    CategoriesChanged(BTreeSet<String>),
    StatsAvailable {
        request_id: u64,
        stats: Vec<StatsEntry>,
        as_of: Timestamp,
    },
    SyncDataAvailable {
        request_id: u64,
        data: Vec<SyncData>,
        as_of: Timestamp,
    },
    SyncStatsAvailable {
        request_id: u64,
        stats: SyncStats,
    },
    DataSynced {
        updated: Vec<SyncData>,
        removed: Vec<SyncData>,
    },
    NothingToUndo,
    RequestCancelled {
        operation: Operation,
        request_id: Option<u64>,
    },
}

impl HistoryEvent {
    /// Request id of a query completion or a failure, if any.
    pub fn request_id(&self) -> Option<u64> {
        match self {
            HistoryEvent::HistoryRequestCompleted { request_id, .. }
            | HistoryEvent::StatsAvailable { request_id, .. }
            | HistoryEvent::SyncDataAvailable { request_id, .. }
            | HistoryEvent::SyncStatsAvailable { request_id, .. } => Some(*request_id),
            HistoryEvent::Error(failure) => failure.request_id,
            HistoryEvent::RequestCancelled { request_id, .. } => *request_id,
            _ => None,
        }
    }
}
