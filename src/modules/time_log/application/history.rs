// TimeLogHistory: the thread-safe handle collaborators talk to.
//
// Purpose
// - Marshal every call into a command for the history worker.
// - Republish the worker's events to any number of subscribers.
//
// Responsibilities
// - Spawn the worker and the event relay on open.
// - Keep the latest aggregate snapshot, refreshed only from emitted events.
// - Stop the worker: shutdown drains the queue, abort cancels what is still queued.
//
// Boundaries
// - Holds no entry, aggregate or undo state of its own. Every call returns as soon as the command is queued.

use crate::modules::time_log::application::config::HistoryConfig;
use crate::modules::time_log::application::errors::HistoryError;
use crate::modules::time_log::application::executor::command::Command;
use crate::modules::time_log::application::executor::worker::HistoryWorker;
use crate::modules::time_log::core::aggregates::AggregateSnapshot;
use crate::modules::time_log::core::entry::{Entry, Fields, SyncData};
use crate::modules::time_log::core::events::HistoryEvent;
use crate::shared::core::primitives::Timestamp;
use crate::shared::infrastructure::entry_store::EntryStore;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct TimeLogHistory {
    inner: Arc<Inner>,
}

struct Inner {
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<HistoryEvent>,
    snapshot: watch::Receiver<AggregateSnapshot>,
    abort: Mutex<Option<oneshot::Sender<()>>>,
    tasks: Mutex<Option<(JoinHandle<()>, JoinHandle<()>)>>,
}

impl TimeLogHistory {
    /// Loads the store and starts processing. Fails without spawning anything if the store is unreadable.
    pub async fn open(
        store: Arc<dyn EntryStore>,
        config: HistoryConfig,
    ) -> Result<Self, HistoryError> {
        let (worker_events, relay_events) = mpsc::unbounded_channel();
        let worker = HistoryWorker::start(store, &config, worker_events).await?;

        let (snapshot_tx, snapshot_rx) = watch::channel(worker.snapshot());
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let (commands, queue) = mpsc::unbounded_channel();
        let (abort, abort_rx) = oneshot::channel();

        let worker_task = tokio::spawn(worker.run(queue, abort_rx));
        let relay_task = tokio::spawn(relay(relay_events, snapshot_tx, events.clone()));

        Ok(Self {
            inner: Arc::new(Inner {
                commands,
                events,
                snapshot: snapshot_rx,
                abort: Mutex::new(Some(abort)),
                tasks: Mutex::new(Some((worker_task, relay_task))),
            }),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HistoryEvent> {
        self.inner.events.subscribe()
    }

    pub fn snapshot(&self) -> AggregateSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    /// Receiver notified whenever the aggregate snapshot changes.
    pub fn watch(&self) -> watch::Receiver<AggregateSnapshot> {
        self.inner.snapshot.clone()
    }

    pub fn size(&self) -> u64 {
        self.inner.snapshot.borrow().size
    }

    pub fn categories(&self) -> BTreeSet<String> {
        self.inner.snapshot.borrow().categories.clone()
    }

    pub fn undo_count(&self) -> usize {
        self.inner.snapshot.borrow().undo_count
    }

    pub fn insert(&self, entry: Entry) -> Result<(), HistoryError> {
        self.enqueue(Command::Insert(entry))
    }

    pub fn import(&self, entries: Vec<Entry>) -> Result<(), HistoryError> {
        self.enqueue(Command::Import(entries))
    }

    pub fn remove(&self, entry: Entry) -> Result<(), HistoryError> {
        self.enqueue(Command::Remove(entry))
    }

    pub fn edit(&self, entry: Entry, fields: Fields) -> Result<(), HistoryError> {
        self.enqueue(Command::Edit { entry, fields })
    }

    pub fn edit_category(
        &self,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Result<(), HistoryError> {
        self.enqueue(Command::EditCategory {
            from: from.into(),
            to: to.into(),
        })
    }

    pub fn undo(&self) -> Result<(), HistoryError> {
        self.enqueue(Command::Undo)
    }

    pub fn sync(&self, updated: Vec<SyncData>, removed: Vec<SyncData>) -> Result<(), HistoryError> {
        self.enqueue(Command::Sync { updated, removed })
    }

    pub fn history_between(
        &self,
        request_id: u64,
        begin: Timestamp,
        end: Timestamp,
        category: impl Into<String>,
    ) -> Result<(), HistoryError> {
        self.enqueue(Command::HistoryBetween {
            request_id,
            begin,
            end,
            category: category.into(),
        })
    }

    pub fn history_after(
        &self,
        request_id: u64,
        limit: usize,
        from: Timestamp,
    ) -> Result<(), HistoryError> {
        self.enqueue(Command::HistoryAfter {
            request_id,
            limit,
            from,
        })
    }

    pub fn history_before(
        &self,
        request_id: u64,
        limit: usize,
        until: Timestamp,
    ) -> Result<(), HistoryError> {
        self.enqueue(Command::HistoryBefore {
            request_id,
            limit,
            until,
        })
    }

    pub fn stats(
        &self,
        request_id: u64,
        begin: Timestamp,
        end: Timestamp,
        category: impl Into<String>,
        separator: impl Into<String>,
    ) -> Result<(), HistoryError> {
        self.enqueue(Command::Stats {
            request_id,
            begin,
            end,
            category: category.into(),
            separator: separator.into(),
        })
    }

    pub fn sync_data(
        &self,
        request_id: u64,
        begin: Timestamp,
        end: Timestamp,
    ) -> Result<(), HistoryError> {
        self.enqueue(Command::SyncData {
            request_id,
            begin,
            end,
        })
    }

    /// Classifies `remote` against local records modified in `[begin, end)`.
    pub fn sync_stats(
        &self,
        request_id: u64,
        remote: Vec<SyncData>,
        begin: Timestamp,
        end: Timestamp,
    ) -> Result<(), HistoryError> {
        self.enqueue(Command::SyncStats {
            request_id,
            remote,
            begin,
            end,
        })
    }

    /// Runs everything queued so far, then stops. Later calls fail with Closed.
    pub async fn shutdown(&self) {
        if self.enqueue(Command::Shutdown).is_ok() {
            tracing::info!("history shutdown requested");
        }
        self.join().await;
    }

    /// Stops after the running command. Queued commands are dropped with a RequestCancelled event each.
    pub async fn abort(&self) {
        if let Some(abort) = self.inner.abort.lock().await.take()
            && abort.send(()).is_ok()
        {
            tracing::info!("history abort requested");
        }
        self.join().await;
    }

    fn enqueue(&self, command: Command) -> Result<(), HistoryError> {
        self.inner
            .commands
            .send(command)
            .map_err(|_| HistoryError::Closed)
    }

    async fn join(&self) {
        let Some((worker, relay)) = self.inner.tasks.lock().await.take() else {
            return;
        };
        if let Err(err) = worker.await {
            tracing::error!(error = %err, "history worker task failed");
        }
        if let Err(err) = relay.await {
            tracing::error!(error = %err, "history relay task failed");
        }
    }
}

async fn relay(
    mut events: mpsc::UnboundedReceiver<HistoryEvent>,
    snapshot: watch::Sender<AggregateSnapshot>,
    out: broadcast::Sender<HistoryEvent>,
) {
    while let Some(event) = events.recv().await {
        match &event {
            HistoryEvent::SizeChanged(size) => snapshot.send_modify(|s| s.size = *size),
            HistoryEvent::CategoriesChanged(categories) => {
                snapshot.send_modify(|s| s.categories = categories.clone())
            }
            HistoryEvent::UndoCountChanged(count) => {
                snapshot.send_modify(|s| s.undo_count = *count)
            }
            _ => {}
        }
        // No subscribers is not an error.
        let _ = out.send(event);
    }
}
