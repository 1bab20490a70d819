// Tunables of a history instance.

pub const DEFAULT_UNDO_LIMIT: usize = 10;
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Maximum undo depth. Older records are evicted.
    pub undo_limit: usize,
    /// Broadcast buffer per subscriber. Slow subscribers lag past this.
    pub event_capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            undo_limit: DEFAULT_UNDO_LIMIT,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl HistoryConfig {
    pub fn undo_limit(mut self, v: usize) -> Self {
        self.undo_limit = v;
        self
    }

    pub fn event_capacity(mut self, v: usize) -> Self {
        self.event_capacity = v.max(1);
        self
    }
}
