use crate::shared::core::primitives::Timestamp;
use crate::shared::infrastructure::entry_store::StoreError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("entry {0} not found")]
    NotFound(Uuid),

    #[error("start time {start_time} is already taken")]
    StartTimeTaken { start_time: Timestamp },

    #[error("entry {0} already exists")]
    IdTaken(Uuid),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("history is read-only after a storage failure")]
    ReadOnly,

    #[error("history is closed")]
    Closed,
}

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    IoFailure,
    InvalidArgument,
    Closed,
}

impl HistoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HistoryError::NotFound(_) => ErrorKind::NotFound,
            HistoryError::StartTimeTaken { .. }
            | HistoryError::IdTaken(_)
            | HistoryError::Store(StoreError::DuplicateStartTime { .. }) => ErrorKind::Conflict,
            HistoryError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            HistoryError::Store(_) | HistoryError::ReadOnly => ErrorKind::IoFailure,
            HistoryError::Closed => ErrorKind::Closed,
        }
    }
}
