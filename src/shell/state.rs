use crate::modules::time_log::application::history::TimeLogHistory;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub history: TimeLogHistory,
    pub request_ids: Arc<AtomicU64>,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(history: TimeLogHistory, request_timeout: Duration) -> Self {
        Self {
            history,
            request_ids: Arc::new(AtomicU64::new(1)),
            request_timeout,
        }
    }

    pub fn next_request_id(&self) -> u64 {
        self.request_ids.fetch_add(1, Ordering::Relaxed)
    }
}
