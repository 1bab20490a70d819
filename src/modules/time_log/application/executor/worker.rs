// History worker: the single writer behind a TimeLogHistory.
//
// Purpose
// - Drain the command queue one command at a time, in enqueue order.
// - Own the entry store handle, the aggregate cache and the undo log. Nothing else touches them.
//
// Responsibilities
// - Apply mutations, record their inverse, keep aggregates in step.
// - Answer queries from the same queue so reads observe every earlier write.
// - Report failures as events and move on to the next command.
//
// Lifecycle
// - Idle while the queue is empty, Processing while draining it.
// - Shutdown closes the queue and runs what is already queued. Abort drops it, reporting each dropped command.
// - A storage failure switches the worker to read-only: writes are refused, queries keep running.

use crate::modules::time_log::application::config::HistoryConfig;
use crate::modules::time_log::application::errors::{ErrorKind, HistoryError};
use crate::modules::time_log::application::executor::command::Command;
use crate::modules::time_log::core::aggregates::{AggregateCache, AggregateSnapshot};
use crate::modules::time_log::core::entry::{Entry, Fields, HistoryEntry, SyncData};
use crate::modules::time_log::core::events::{CommandFailure, HistoryEvent, Operation};
use crate::modules::time_log::core::stats::summarize;
use crate::modules::time_log::core::sync::merge;
use crate::modules::time_log::core::undo::{Inverse, UndoLog, UndoRecord};
use crate::shared::core::primitives::{Timestamp, is_representable, new_entry_id, now_millis};
use crate::shared::infrastructure::entry_store::{EntryStore, StoreError};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Idle,
    Processing,
}

/// A remote change waiting in a sync batch.
enum RemoteChange {
    Update(SyncData),
    Removal(SyncData),
}

impl RemoteChange {
    fn id(&self) -> Uuid {
        match self {
            RemoteChange::Update(record) | RemoteChange::Removal(record) => record.id(),
        }
    }
}

pub struct HistoryWorker {
    store: Arc<dyn EntryStore>,
    aggregates: AggregateCache,
    undo: UndoLog,
    events: mpsc::UnboundedSender<HistoryEvent>,
    state: ExecutorState,
    read_only: bool,
}

impl HistoryWorker {
    /// Loads the store and rebuilds the aggregates. An unreadable store keeps the worker from starting.
    pub async fn start(
        store: Arc<dyn EntryStore>,
        config: &HistoryConfig,
        events: mpsc::UnboundedSender<HistoryEvent>,
    ) -> Result<Self, HistoryError> {
        let entries = store.load_all().await?;
        let aggregates = AggregateCache::rebuild(&entries);
        info!(
            size = aggregates.size(),
            undo_limit = config.undo_limit,
            "history worker started"
        );
        Ok(Self {
            store,
            aggregates,
            undo: UndoLog::new(config.undo_limit),
            events,
            state: ExecutorState::Idle,
            read_only: false,
        })
    }

    pub fn snapshot(&self) -> AggregateSnapshot {
        self.aggregates.snapshot(self.undo.depth())
    }

    pub fn state(&self) -> ExecutorState {
        self.state
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut abort: oneshot::Receiver<()>,
    ) {
        let mut abort_armed = true;
        loop {
            let command = tokio::select! {
                biased;
                signal = &mut abort, if abort_armed => {
                    abort_armed = false;
                    if signal.is_ok() {
                        self.cancel_pending(&mut commands);
                        break;
                    }
                    continue;
                }
                command = commands.recv() => command,
            };
            let Some(command) = command else {
                break;
            };
            if matches!(command, Command::Shutdown) {
                info!(pending = commands.len(), "history worker draining");
                commands.close();
                continue;
            }

            self.transition(ExecutorState::Processing);
            self.handle(command).await;
            if commands.is_empty() {
                self.transition(ExecutorState::Idle);
            }
        }
        self.transition(ExecutorState::Idle);
        info!(size = self.aggregates.size(), "history worker stopped");
    }

    fn transition(&mut self, next: ExecutorState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "history worker state changed");
            self.state = next;
        }
    }

    fn cancel_pending(&mut self, commands: &mut mpsc::UnboundedReceiver<Command>) {
        commands.close();
        let mut cancelled = 0usize;
        while let Ok(command) = commands.try_recv() {
            let Some(operation) = command.operation() else {
                continue;
            };
            cancelled += 1;
            self.emit(HistoryEvent::RequestCancelled {
                operation,
                request_id: command.request_id(),
            });
        }
        warn!(cancelled, "history worker aborted");
    }

    async fn handle(&mut self, command: Command) {
        let Some(operation) = command.operation() else {
            return;
        };
        let request_id = command.request_id();
        let entry_id = command.entry_id();
        debug!(%operation, ?request_id, ?entry_id, "command started");

        if operation.is_mutating() && self.read_only {
            self.report(operation, request_id, entry_id, HistoryError::ReadOnly);
            return;
        }

        let before = self.snapshot();
        if let Err(err) = self.execute(command).await {
            self.report(operation, request_id, entry_id, err);
        }
        if operation.is_mutating() {
            self.publish_aggregate_changes(&before);
        }
    }

    async fn execute(&mut self, command: Command) -> Result<(), HistoryError> {
        match command {
            Command::Insert(entry) => self.insert(entry).await,
            Command::Import(entries) => self.import(entries).await,
            Command::Remove(entry) => self.remove(entry).await,
            Command::Edit { entry, fields } => self.edit(entry, fields).await,
            Command::EditCategory { from, to } => self.edit_category(from, to).await,
            Command::Undo => self.undo().await,
            Command::Sync { updated, removed } => self.sync(updated, removed).await,
            Command::HistoryBetween {
                request_id,
                begin,
                end,
                category,
            } => {
                ensure_range(begin, end)?;
                let entries = self.store.range_by_time(begin, end, &category).await?;
                let entries = self.with_durations(entries).await?;
                self.emit(HistoryEvent::HistoryRequestCompleted {
                    request_id,
                    entries,
                });
                Ok(())
            }
            Command::HistoryAfter {
                request_id,
                limit,
                from,
            } => {
                ensure_limit(limit)?;
                let entries = self.store.range_after(from, limit).await?;
                let entries = self.with_durations(entries).await?;
                self.emit(HistoryEvent::HistoryRequestCompleted {
                    request_id,
                    entries,
                });
                Ok(())
            }
            Command::HistoryBefore {
                request_id,
                limit,
                until,
            } => {
                ensure_limit(limit)?;
                let entries = self.store.range_before(until, limit).await?;
                let entries = self.with_durations(entries).await?;
                self.emit(HistoryEvent::HistoryRequestCompleted {
                    request_id,
                    entries,
                });
                Ok(())
            }
            Command::Stats {
                request_id,
                begin,
                end,
                category,
                separator,
            } => {
                ensure_range(begin, end)?;
                let entries = self.store.range_by_time(begin, end, "").await?;
                let entries = self.with_durations(entries).await?;
                self.emit(HistoryEvent::StatsAvailable {
                    request_id,
                    stats: summarize(&entries, &category, &separator),
                    as_of: end,
                });
                Ok(())
            }
            Command::SyncData {
                request_id,
                begin,
                end,
            } => {
                ensure_range(begin, end)?;
                let data = self.store.modified_between(begin, end).await?;
                self.emit(HistoryEvent::SyncDataAvailable {
                    request_id,
                    data,
                    as_of: end,
                });
                Ok(())
            }
            Command::SyncStats {
                request_id,
                remote,
                begin,
                end,
            } => {
                ensure_range(begin, end)?;
                let mut local = self.store.modified_between(begin, end).await?;
                let known: HashSet<Uuid> = local.iter().map(SyncData::id).collect();
                for record in &remote {
                    if known.contains(&record.id()) {
                        continue;
                    }
                    if let Some(found) = self.store.record(record.id()).await?
                        && !local.iter().any(|r| r.id() == found.id())
                    {
                        local.push(found);
                    }
                }
                self.emit(HistoryEvent::SyncStatsAvailable {
                    request_id,
                    stats: merge(&local, &remote),
                });
                Ok(())
            }
            Command::Shutdown => Ok(()),
        }
    }

    async fn insert(&mut self, mut entry: Entry) -> Result<(), HistoryError> {
        ensure_start_time(entry.start_time)?;
        if !entry.is_assigned() {
            entry.id = new_entry_id();
        }
        self.write_new(&entry).await?;
        self.aggregates.entry_added(&entry);
        self.undo.push(UndoRecord::Inserted {
            entry: entry.clone(),
            previous: None,
        });
        self.emit(HistoryEvent::DataInserted(entry));
        Ok(())
    }

    async fn import(&mut self, entries: Vec<Entry>) -> Result<(), HistoryError> {
        let mut ids = HashSet::with_capacity(entries.len());
        let mut candidates = Vec::with_capacity(entries.len());
        for mut entry in entries {
            if !entry.is_assigned() {
                entry.id = new_entry_id();
            }
            let rejected = if let Err(err) = ensure_start_time(entry.start_time) {
                Some(err)
            } else if !ids.insert(entry.id) || self.store.record(entry.id).await?.is_some() {
                Some(HistoryError::IdTaken(entry.id))
            } else {
                None
            };
            match rejected {
                Some(err) => self.report(Operation::Import, None, Some(entry.id), err),
                None => candidates.push(entry),
            }
        }

        let mtime = now_millis();
        let records = candidates
            .iter()
            .map(|entry| SyncData::live(entry.clone(), mtime))
            .collect();
        let outcomes = self.store.put_all(records).await?;

        let mut accepted = Vec::with_capacity(candidates.len());
        for (entry, outcome) in candidates.into_iter().zip(outcomes) {
            match outcome {
                Ok(_) => {
                    self.aggregates.entry_added(&entry);
                    accepted.push(entry);
                }
                Err(err) => self.report(Operation::Import, None, Some(entry.id), write_error(err)),
            }
        }
        debug!(accepted = accepted.len(), "entries imported");
        self.emit(HistoryEvent::DataImported(accepted));
        self.emit(HistoryEvent::StoreOutdated);
        Ok(())
    }

    async fn remove(&mut self, entry: Entry) -> Result<(), HistoryError> {
        let Some(previous) = self.live_record(entry.id).await? else {
            return Err(HistoryError::NotFound(entry.id));
        };
        let Some(removed) = self.store.delete(entry.id, now_millis()).await? else {
            return Err(HistoryError::NotFound(entry.id));
        };
        self.aggregates.entry_removed(&removed);
        self.undo.push(UndoRecord::Removed(previous));
        self.emit(HistoryEvent::DataRemoved(removed));
        Ok(())
    }

    async fn edit(&mut self, entry: Entry, fields: Fields) -> Result<(), HistoryError> {
        if fields.is_empty() {
            return Err(HistoryError::InvalidArgument("empty field mask".into()));
        }
        let Some(previous) = self.live_record(entry.id).await? else {
            return Err(HistoryError::NotFound(entry.id));
        };
        let before = previous.entry.clone();
        let mut after = before.clone();
        after.apply(&entry, fields);
        let changed = before.diff(&after);
        if changed.is_empty() {
            return Ok(());
        }
        if changed.contains(Fields::START_TIME) {
            ensure_start_time(after.start_time)?;
        }

        self.write_existing(&after, now_millis()).await?;
        if changed.contains(Fields::CATEGORY) {
            self.aggregates
                .category_changed(&before.category, &after.category);
        }
        self.undo.push(UndoRecord::Edited {
            before: vec![previous],
            fields: vec![changed],
        });
        self.emit(HistoryEvent::DataUpdated {
            entries: vec![after],
            fields: vec![changed],
        });
        Ok(())
    }

    async fn edit_category(&mut self, from: String, to: String) -> Result<(), HistoryError> {
        if from == to {
            return Ok(());
        }
        let affected = self.store.in_category(&from).await?;
        if affected.is_empty() {
            return Ok(());
        }

        let mtime = now_millis();
        let renamed: Vec<Entry> = affected
            .into_iter()
            .map(|entry| Entry {
                category: to.clone(),
                ..entry
            })
            .collect();
        let records = renamed
            .iter()
            .map(|entry| SyncData::live(entry.clone(), mtime))
            .collect();
        let outcomes = self.store.put_all(records).await?;

        let mut before = Vec::with_capacity(renamed.len());
        let mut after = Vec::with_capacity(renamed.len());
        for (entry, outcome) in renamed.into_iter().zip(outcomes) {
            match outcome {
                Ok(Some(previous)) => {
                    self.aggregates.category_changed(&from, &to);
                    before.push(previous);
                    after.push(entry);
                }
                Ok(None) => {}
                Err(err) => {
                    self.report(Operation::EditCategory, None, Some(entry.id), write_error(err))
                }
            }
        }

        if !before.is_empty() {
            let fields = vec![Fields::CATEGORY; before.len()];
            debug!(%from, %to, renamed = before.len(), "category renamed");
            self.undo.push(UndoRecord::Edited {
                before,
                fields: fields.clone(),
            });
            self.emit(HistoryEvent::DataUpdated {
                entries: after,
                fields,
            });
        }
        Ok(())
    }

    async fn undo(&mut self) -> Result<(), HistoryError> {
        let Some(record) = self.undo.pop() else {
            self.emit(HistoryEvent::NothingToUndo);
            return Ok(());
        };
        let result = self.apply_inverse(record.clone().inverse()).await;
        if result.is_err() {
            self.undo.push(record);
        }
        result
    }

    /// Writes the remembered records back as they were, revision markers included.
    async fn apply_inverse(&mut self, inverse: Inverse) -> Result<(), HistoryError> {
        match inverse {
            Inverse::Remove { entry, previous } => {
                let Some(current) = self.store.get(entry.id).await? else {
                    return Err(HistoryError::NotFound(entry.id));
                };
                self.store
                    .restore(entry.id, previous)
                    .await
                    .map_err(write_error)?;
                self.aggregates.entry_removed(&current);
                self.emit(HistoryEvent::DataRemoved(current));
            }
            Inverse::Restore(record) => {
                let entry = record.entry.clone();
                let replaced = self
                    .store
                    .restore(entry.id, Some(record))
                    .await
                    .map_err(write_error)?;
                if let Some(old) = replaced.filter(|old| !old.deleted) {
                    self.aggregates.entry_removed(&old.entry);
                }
                self.aggregates.entry_added(&entry);
                self.emit(HistoryEvent::DataInserted(entry));
            }
            Inverse::Revert { records, fields } => {
                let mut reverted = Vec::with_capacity(records.len());
                let mut masks = Vec::with_capacity(records.len());
                for (record, mask) in records.into_iter().zip(fields) {
                    let restored = record.entry.clone();
                    let Some(current) = self.store.get(restored.id).await? else {
                        return Err(HistoryError::NotFound(restored.id));
                    };
                    self.store
                        .restore(restored.id, Some(record))
                        .await
                        .map_err(write_error)?;
                    if mask.contains(Fields::CATEGORY) {
                        self.aggregates
                            .category_changed(&current.category, &restored.category);
                    }
                    reverted.push(restored);
                    masks.push(mask);
                }
                self.emit(HistoryEvent::DataUpdated {
                    entries: reverted,
                    fields: masks,
                });
            }
        }
        Ok(())
    }

    async fn sync(
        &mut self,
        updated: Vec<SyncData>,
        removed: Vec<SyncData>,
    ) -> Result<(), HistoryError> {
        let (applied_updates, applied_removals) = match self.apply_remote(updated, removed).await {
            Ok(applied) => applied,
            Err(err) => {
                self.emit(HistoryEvent::DataSynced {
                    updated: vec![],
                    removed: vec![],
                });
                return Err(err);
            }
        };

        if !applied_updates.is_empty() || !applied_removals.is_empty() {
            self.emit(HistoryEvent::StoreOutdated);
        }
        debug!(
            updated = applied_updates.len(),
            removed = applied_removals.len(),
            "remote changes applied"
        );
        self.emit(HistoryEvent::DataSynced {
            updated: applied_updates,
            removed: applied_removals,
        });
        Ok(())
    }

    /// Lands every accepted remote change in one batch, then books aggregates and undo
    /// from the records each write replaced.
    async fn apply_remote(
        &mut self,
        updated: Vec<SyncData>,
        removed: Vec<SyncData>,
    ) -> Result<(Vec<SyncData>, Vec<SyncData>), HistoryError> {
        let mut writes = Vec::with_capacity(updated.len() + removed.len());
        let mut plans = Vec::with_capacity(updated.len() + removed.len());
        let mut pending: HashMap<Uuid, Entry> = HashMap::new();

        for record in updated {
            if let Err(err) = ensure_start_time(record.entry.start_time) {
                self.report(Operation::Sync, None, Some(record.id()), err);
                continue;
            }
            pending.insert(record.id(), record.entry.clone());
            writes.push(SyncData::live(record.entry.clone(), record.mtime));
            plans.push(RemoteChange::Update(record));
        }
        for record in removed {
            let id = record.id();
            let current = match pending.get(&id) {
                Some(entry) => Some(entry.clone()),
                None => self.store.get(id).await?,
            };
            let tombstone = match current {
                Some(entry) => SyncData::removed(entry, record.mtime),
                None if self.store.record(id).await?.is_none() => {
                    SyncData::removed(record.entry.clone(), record.mtime)
                }
                None => continue,
            };
            writes.push(tombstone);
            plans.push(RemoteChange::Removal(record));
        }

        let outcomes = self.store.put_all(writes).await?;
        let mut applied_updates = Vec::new();
        let mut applied_removals = Vec::new();
        for (plan, outcome) in plans.into_iter().zip(outcomes) {
            let previous = match outcome {
                Ok(previous) => previous,
                Err(err) => {
                    self.report(Operation::Sync, None, Some(plan.id()), write_error(err));
                    continue;
                }
            };
            match plan {
                RemoteChange::Update(record) => {
                    match previous {
                        Some(before) if !before.deleted => {
                            let changed = before.entry.diff(&record.entry);
                            if changed.contains(Fields::CATEGORY) {
                                self.aggregates
                                    .category_changed(&before.entry.category, &record.entry.category);
                            }
                            if !changed.is_empty() {
                                self.undo.push(UndoRecord::Edited {
                                    before: vec![before],
                                    fields: vec![changed],
                                });
                            }
                        }
                        previous => {
                            self.aggregates.entry_added(&record.entry);
                            self.undo.push(UndoRecord::Inserted {
                                entry: record.entry.clone(),
                                previous,
                            });
                        }
                    }
                    applied_updates.push(SyncData::live(record.entry, record.mtime));
                }
                RemoteChange::Removal(record) => {
                    if let Some(before) = previous.filter(|before| !before.deleted) {
                        self.aggregates.entry_removed(&before.entry);
                        self.undo.push(UndoRecord::Removed(before));
                        applied_removals.push(SyncData::removed(record.entry, record.mtime));
                    }
                }
            }
        }
        Ok((applied_updates, applied_removals))
    }

    async fn live_record(&self, id: Uuid) -> Result<Option<SyncData>, HistoryError> {
        Ok(self.store.record(id).await?.filter(|record| !record.deleted))
    }

    /// Writes an entry that must not exist yet, by identity or by start time.
    async fn write_new(&self, entry: &Entry) -> Result<(), HistoryError> {
        if self.store.record(entry.id).await?.is_some() {
            return Err(HistoryError::IdTaken(entry.id));
        }
        if self.store.entry_at(entry.start_time).await?.is_some() {
            return Err(HistoryError::StartTimeTaken {
                start_time: entry.start_time,
            });
        }
        self.store
            .put(SyncData::live(entry.clone(), now_millis()))
            .await
            .map_err(write_error)
    }

    async fn write_existing(&self, entry: &Entry, mtime: Timestamp) -> Result<(), HistoryError> {
        self.store
            .put(SyncData::live(entry.clone(), mtime))
            .await
            .map_err(write_error)
    }

    async fn with_durations(&self, entries: Vec<Entry>) -> Result<Vec<HistoryEntry>, HistoryError> {
        let mut history = Vec::with_capacity(entries.len());
        for entry in entries {
            let next = self.store.next_after(entry.start_time).await?;
            history.push(HistoryEntry::new(entry, next.map(|e| e.start_time)));
        }
        Ok(history)
    }

    fn publish_aggregate_changes(&self, before: &AggregateSnapshot) {
        let after = self.snapshot();
        if after.size != before.size {
            self.emit(HistoryEvent::SizeChanged(after.size));
        }
        if after.categories != before.categories {
            self.emit(HistoryEvent::CategoriesChanged(after.categories));
        }
        if after.undo_count != before.undo_count {
            self.emit(HistoryEvent::UndoCountChanged(after.undo_count));
        }
    }

    fn report(
        &mut self,
        operation: Operation,
        request_id: Option<u64>,
        entry_id: Option<Uuid>,
        error: HistoryError,
    ) {
        if let HistoryError::Store(store_error) = &error
            && store_error.is_io_failure()
        {
            if !self.read_only {
                error!(%operation, error = %store_error, "storage failure, history is now read-only");
            }
            self.read_only = true;
        } else {
            warn!(%operation, ?request_id, ?entry_id, %error, "command failed");
        }
        self.emit(HistoryEvent::Error(CommandFailure {
            operation,
            request_id,
            entry_id,
            error,
        }));
    }

    fn emit(&self, event: HistoryEvent) {
        if self.events.send(event).is_err() {
            debug!("no event relay, dropping history event");
        }
    }
}

fn write_error(err: StoreError) -> HistoryError {
    match err {
        StoreError::DuplicateStartTime { start_time } => HistoryError::StartTimeTaken { start_time },
        other => HistoryError::Store(other),
    }
}

fn ensure_start_time(start_time: Timestamp) -> Result<(), HistoryError> {
    if !is_representable(start_time) {
        return Err(HistoryError::InvalidArgument(format!(
            "start time {start_time} is out of range"
        )));
    }
    Ok(())
}

fn ensure_range(begin: Timestamp, end: Timestamp) -> Result<(), HistoryError> {
    if end < begin {
        return Err(HistoryError::InvalidArgument(format!(
            "range end {end} is before begin {begin}"
        )));
    }
    Ok(())
}

fn ensure_limit(limit: usize) -> Result<(), HistoryError> {
    if limit == 0 {
        return Err(HistoryError::InvalidArgument("limit must be positive".into()));
    }
    Ok(())
}
