use crate::modules::time_log::core::entry::{Entry, Fields, SyncData};
use crate::modules::time_log::core::events::Operation;
use crate::shared::core::primitives::Timestamp;
use uuid::Uuid;

/// A unit of work queued for the history worker.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Insert(Entry),
    Import(Vec<Entry>),
    Remove(Entry),
    Edit {
        entry: Entry,
        fields: Fields,
    },
    EditCategory {
        from: String,
        to: String,
    },
    Undo,
    Sync {
        updated: Vec<SyncData>,
        removed: Vec<SyncData>,
    },
    HistoryBetween {
        request_id: u64,
        begin: Timestamp,
        end: Timestamp,
        category: String,
    },
    HistoryAfter {
        request_id: u64,
        limit: usize,
        from: Timestamp,
    },
    HistoryBefore {
        request_id: u64,
        limit: usize,
        until: Timestamp,
    },
    Stats {
        request_id: u64,
        begin: Timestamp,
        end: Timestamp,
        category: String,
        separator: String,
    },
    SyncData {
        request_id: u64,
        begin: Timestamp,
        end: Timestamp,
    },
    SyncStats {
        request_id: u64,
        remote: Vec<SyncData>,
        begin: Timestamp,
        end: Timestamp,
    },
    /// Stop accepting commands once everything queued so far has run.
    Shutdown,
}

impl Command {
    pub fn operation(&self) -> Option<Operation> {
        let operation = match self {
            Command::Insert(_) => Operation::Insert,
            Command::Import(_) => Operation::Import,
            Command::Remove(_) => Operation::Remove,
            Command::Edit { .. } => Operation::Edit,
            Command::EditCategory { .. } => Operation::EditCategory,
            Command::Undo => Operation::Undo,
            Command::Sync { .. } => Operation::Sync,
            Command::HistoryBetween { .. } => Operation::HistoryBetween,
            Command::HistoryAfter { .. } => Operation::HistoryAfter,
            Command::HistoryBefore { .. } => Operation::HistoryBefore,
            Command::Stats { .. } => Operation::Stats,
            Command::SyncData { .. } => Operation::SyncData,
            Command::SyncStats { .. } => Operation::SyncStats,
            Command::Shutdown => return None,
        };
        Some(operation)
    }

    pub fn request_id(&self) -> Option<u64> {
        match self {
            Command::HistoryBetween { request_id, .. }
            | Command::HistoryAfter { request_id, .. }
            | Command::HistoryBefore { request_id, .. }
            | Command::Stats { request_id, .. }
            | Command::SyncData { request_id, .. }
            | Command::SyncStats { request_id, .. } => Some(*request_id),
            _ => None,
        }
    }

    /// Identity of the single entry a command targets.
    pub fn entry_id(&self) -> Option<Uuid> {
        match self {
            Command::Insert(entry) | Command::Remove(entry) | Command::Edit { entry, .. }
                if entry.is_assigned() =>
            {
                Some(entry.id)
            }
            _ => None,
        }
    }
}
