pub mod entries;

use crate::modules::time_log::core::events::HistoryEvent;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};

/// Waits for the next event matching `accept`, skipping the rest.
pub async fn next_event(
    rx: &mut broadcast::Receiver<HistoryEvent>,
    accept: impl Fn(&HistoryEvent) -> bool,
) -> HistoryEvent {
    let wait = async {
        loop {
            match rx.recv().await {
                Ok(event) if accept(&event) => return event,
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => panic!("history event stream closed"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("timed out waiting for a history event")
}
