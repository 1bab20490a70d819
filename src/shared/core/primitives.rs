// Shared primitive helpers for time values and identities.
//
// Timestamps
// - All i64 time values are epoch milliseconds, start times and revision markers alike.
// - Start times must fall inside the range chrono can represent, so durations between them never overflow.
//
// Identities
// - Entry identities are UUID v7 values, so freshly assigned ids sort in creation order.
// - The nil UUID marks an entry that has not been assigned an identity yet.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub type Timestamp = i64;

pub fn now_millis() -> Timestamp {
    Utc::now().timestamp_millis()
}

pub fn is_representable(timestamp: Timestamp) -> bool {
    DateTime::<Utc>::from_timestamp_millis(timestamp).is_some()
}

pub fn new_entry_id() -> Uuid {
    Uuid::now_v7()
}
