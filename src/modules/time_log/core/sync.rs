// Sync engine: reconciles local and remote record sets keyed by identity.
//
// Rules
// - Present on one side only: live records travel to the other side. A local tombstone is sent,
//   a remote tombstone for an id never seen locally is ignored.
// - Present on both: the strictly newer revision wins.
// - Equal revisions with equal content are a no-op. Equal revisions with different content conflict.
// - A deletion wins only when strictly newer than the other side's modification. Otherwise it conflicts.
// - Conflicts are returned as data. Resolving them is up to the caller.
//
// Every bucket is sorted by id so the outcome is deterministic.

use crate::modules::time_log::core::entry::SyncData;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    /// Local changes the remote should receive.
    pub local_updates: Vec<SyncData>,
    pub local_deletes: Vec<SyncData>,
    /// Remote changes to apply locally.
    pub remote_updates: Vec<SyncData>,
    pub remote_deletes: Vec<SyncData>,
    /// Both sides of each conflict, paired by position.
    pub conflicts_local: Vec<SyncData>,
    pub conflicts_remote: Vec<SyncData>,
}

impl SyncStats {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts_local.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.local_updates.is_empty()
            && self.local_deletes.is_empty()
            && self.remote_updates.is_empty()
            && self.remote_deletes.is_empty()
            && self.conflicts_local.is_empty()
    }
}

pub fn merge(local: &[SyncData], remote: &[SyncData]) -> SyncStats {
    let local = latest_by_id(local);
    let remote = latest_by_id(remote);
    let ids: BTreeSet<Uuid> = local.keys().chain(remote.keys()).copied().collect();

    let mut stats = SyncStats::default();
    for id in ids {
        match (local.get(&id), remote.get(&id)) {
            (Some(l), None) if l.deleted => stats.local_deletes.push((*l).clone()),
            (Some(l), None) => stats.local_updates.push((*l).clone()),
            (None, Some(r)) if r.deleted => {}
            (None, Some(r)) => stats.remote_updates.push((*r).clone()),
            (Some(l), Some(r)) => reconcile(&mut stats, l, r),
            (None, None) => {}
        }
    }
    stats
}

fn reconcile(stats: &mut SyncStats, local: &SyncData, remote: &SyncData) {
    match (local.deleted, remote.deleted) {
        (true, true) => {}
        (false, false) => {
            if local.mtime > remote.mtime {
                stats.local_updates.push(local.clone());
            } else if remote.mtime > local.mtime {
                stats.remote_updates.push(remote.clone());
            } else if !local.same_content(remote) {
                conflict(stats, local, remote);
            }
        }
        (true, false) if local.mtime > remote.mtime => stats.local_deletes.push(local.clone()),
        (false, true) if remote.mtime > local.mtime => stats.remote_deletes.push(remote.clone()),
        _ => conflict(stats, local, remote),
    }
}

fn conflict(stats: &mut SyncStats, local: &SyncData, remote: &SyncData) {
    stats.conflicts_local.push(local.clone());
    stats.conflicts_remote.push(remote.clone());
}

fn latest_by_id(records: &[SyncData]) -> BTreeMap<Uuid, &SyncData> {
    let mut latest: BTreeMap<Uuid, &SyncData> = BTreeMap::new();
    for record in records {
        latest
            .entry(record.id())
            .and_modify(|kept| {
                if record.mtime > kept.mtime {
                    *kept = record;
                }
            })
            .or_insert(record);
    }
    latest
}
