// Durable EntryStore backed by a single JSON data file.
//
// Responsibilities
// - Load every record into an EntryIndex on open.
// - Persist the full record set on each write: temp file first, synced, then renamed over the data file.
// - Sync the parent directory after the rename so the new name survives a crash.
// - Land a batch with one persist.
// - Roll the index back when persisting fails, so a failed write leaves no trace.
//
// Notes
// - Tombstones stay in the file. Sync windows need them to hand out deletions.
//
// Format
// - { "version": 1, "records": [SyncData...] }, records sorted by id.
// - A missing file is an empty store. Unparseable content or a different version is Corrupt.

use crate::modules::time_log::core::entry::{Entry, SyncData};
use crate::shared::core::primitives::Timestamp;
use crate::shared::infrastructure::entry_store::index::EntryIndex;
use crate::shared::infrastructure::entry_store::{BatchOutcome, EntryStore, StoreError};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    records: Vec<SyncData>,
}

pub struct JsonFileEntryStore {
    path: PathBuf,
    index: Mutex<EntryIndex>,
}

impl JsonFileEntryStore {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let index = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                let file: StoreFile = serde_json::from_str(&contents).map_err(|e| {
                    StoreError::Corrupt(format!("{}: {e}", path.display()))
                })?;
                if file.version != FORMAT_VERSION {
                    return Err(StoreError::Corrupt(format!(
                        "{}: unsupported format version {}",
                        path.display(),
                        file.version
                    )));
                }
                EntryIndex::from_records(file.records)?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => EntryIndex::new(),
            Err(e) => return Err(backend_error(&path, e)),
        };
        tracing::debug!(path = %path.display(), entries = index.len(), "entry store opened");
        Ok(Self {
            path,
            index: Mutex::new(index),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, index: &EntryIndex) -> Result<(), StoreError> {
        let file = StoreFile {
            version: FORMAT_VERSION,
            records: index.records(),
        };
        let json = serde_json::to_vec_pretty(&file)
            .map_err(|e| StoreError::Backend(format!("failed to serialize records: {e}")))?;

        let temp = self.path.with_extension("json.tmp");
        let mut handle = tokio::fs::File::create(&temp)
            .await
            .map_err(|e| backend_error(&temp, e))?;
        handle
            .write_all(&json)
            .await
            .map_err(|e| backend_error(&temp, e))?;
        handle.flush().await.map_err(|e| backend_error(&temp, e))?;
        handle.sync_all().await.map_err(|e| backend_error(&temp, e))?;
        drop(handle);

        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| backend_error(&self.path, e))?;
        self.sync_directory().await
    }

    #[cfg(unix)]
    async fn sync_directory(&self) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let handle = tokio::fs::File::open(dir)
            .await
            .map_err(|e| backend_error(dir, e))?;
        handle.sync_all().await.map_err(|e| backend_error(dir, e))
    }

    // Directory handles cannot be synced on Windows. NTFS journals the rename.
    #[cfg(not(unix))]
    async fn sync_directory(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn write(&self, record: SyncData) -> Result<(), StoreError> {
        let mut index = self.index.lock().await;
        let id = record.id();
        let previous = index.put(record)?;
        if let Err(err) = self.persist(&index).await {
            index.restore(id, previous);
            return Err(err);
        }
        Ok(())
    }
}

fn backend_error(path: &Path, err: std::io::Error) -> StoreError {
    StoreError::Backend(format!("{}: {err}", path.display()))
}

#[async_trait::async_trait]
impl EntryStore for JsonFileEntryStore {
    async fn load_all(&self) -> Result<Vec<Entry>, StoreError> {
        Ok(self.index.lock().await.live())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Entry>, StoreError> {
        Ok(self.index.lock().await.get(id))
    }

    async fn record(&self, id: Uuid) -> Result<Option<SyncData>, StoreError> {
        Ok(self.index.lock().await.record(id))
    }

    async fn entry_at(&self, start_time: Timestamp) -> Result<Option<Entry>, StoreError> {
        Ok(self.index.lock().await.entry_at(start_time))
    }

    async fn next_after(&self, start_time: Timestamp) -> Result<Option<Entry>, StoreError> {
        Ok(self.index.lock().await.next_after(start_time))
    }

    async fn range_by_time(
        &self,
        begin: Timestamp,
        end: Timestamp,
        category: &str,
    ) -> Result<Vec<Entry>, StoreError> {
        Ok(self.index.lock().await.range_by_time(begin, end, category))
    }

    async fn range_after(&self, from: Timestamp, limit: usize) -> Result<Vec<Entry>, StoreError> {
        Ok(self.index.lock().await.range_after(from, limit))
    }

    async fn range_before(
        &self,
        until: Timestamp,
        limit: usize,
    ) -> Result<Vec<Entry>, StoreError> {
        Ok(self.index.lock().await.range_before(until, limit))
    }

    async fn in_category(&self, category: &str) -> Result<Vec<Entry>, StoreError> {
        Ok(self.index.lock().await.in_category(category))
    }

    async fn modified_between(
        &self,
        begin: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<SyncData>, StoreError> {
        Ok(self.index.lock().await.modified_between(begin, end))
    }

    async fn put(&self, record: SyncData) -> Result<(), StoreError> {
        self.write(record).await
    }

    async fn delete(&self, id: Uuid, mtime: Timestamp) -> Result<Option<Entry>, StoreError> {
        let Some(entry) = self.index.lock().await.get(id) else {
            return Ok(None);
        };
        self.write(SyncData::removed(entry.clone(), mtime)).await?;
        Ok(Some(entry))
    }

    async fn put_all(&self, records: Vec<SyncData>) -> Result<Vec<BatchOutcome>, StoreError> {
        let mut index = self.index.lock().await;
        let before = index.clone();
        let outcomes = index.put_all(records);
        if outcomes.iter().any(Result::is_ok)
            && let Err(err) = self.persist(&index).await
        {
            *index = before;
            return Err(err);
        }
        Ok(outcomes)
    }

    async fn restore(
        &self,
        id: Uuid,
        previous: Option<SyncData>,
    ) -> Result<Option<SyncData>, StoreError> {
        let mut index = self.index.lock().await;
        let replaced = index.reinstate(id, previous)?;
        if let Err(err) = self.persist(&index).await {
            index.restore(id, replaced);
            return Err(err);
        }
        Ok(replaced)
    }
}
