use crate::modules::time_log::application::config::HistoryConfig;
use crate::modules::time_log::application::history::TimeLogHistory;
use crate::modules::time_log::core::entry::{Entry, SyncData};
use crate::modules::time_log::core::events::HistoryEvent;
use crate::modules::time_log::core::sync::SyncStats;
use crate::shared::infrastructure::entry_store::EntryStore;
use crate::shared::infrastructure::entry_store::in_memory::InMemoryEntryStore;
use crate::shared::infrastructure::entry_store::json_file::JsonFileEntryStore;
use crate::tests::fixtures::entries::EntryBuilder;
use crate::tests::fixtures::next_event;
use rstest::{fixture, rstest};
use std::sync::Arc;
use tokio::sync::broadcast;

const T0: i64 = 1_700_000_000_000;
const HOUR: i64 = 3_600_000;
const REVISION: i64 = 1_700_100_000_000;

type BeforeEachReturn = (
    TimeLogHistory,
    Arc<InMemoryEntryStore>,
    broadcast::Receiver<HistoryEvent>,
    Vec<Entry>,
);

#[fixture]
async fn before_each() -> BeforeEachReturn {
    let local: Vec<Entry> = (0..3)
        .map(|n| {
            EntryBuilder::new()
                .fresh_id()
                .start_time(T0 + n * HOUR)
                .comment(format!("local {n}"))
                .build()
        })
        .collect();
    let store = Arc::new(
        InMemoryEntryStore::with_records(
            local
                .iter()
                .map(|entry| SyncData::live(entry.clone(), REVISION))
                .collect(),
        )
        .expect("expected valid records"),
    );
    let history = TimeLogHistory::open(store.clone(), HistoryConfig::default())
        .await
        .expect("expected the history to open");
    let rx = history.subscribe();
    (history, store, rx, local)
}

async fn sync_stats(
    history: &TimeLogHistory,
    rx: &mut broadcast::Receiver<HistoryEvent>,
    request_id: u64,
    remote: Vec<SyncData>,
) -> SyncStats {
    history
        .sync_stats(request_id, remote, i64::MIN, i64::MAX)
        .unwrap();
    match next_event(rx, |e| e.request_id() == Some(request_id)).await {
        HistoryEvent::SyncStatsAvailable { stats, .. } => stats,
        other => panic!("expected SyncStatsAvailable, got {other:?}"),
    }
}

#[rstest]
#[tokio::test]
async fn it_should_send_every_local_entry_to_an_empty_remote(
    #[future] before_each: BeforeEachReturn,
) {
    let (history, _, mut rx, local) = before_each.await;
    let stats = sync_stats(&history, &mut rx, 1, vec![]).await;

    let mut expected: Vec<_> = local.iter().map(|e| e.id).collect();
    expected.sort();
    let sent: Vec<_> = stats.local_updates.iter().map(SyncData::id).collect();
    assert_eq!(sent, expected);
    assert!(!stats.has_conflicts());
    assert!(stats.remote_updates.is_empty());
}

#[rstest]
#[tokio::test]
async fn it_should_classify_a_same_revision_edit_as_one_conflict(
    #[future] before_each: BeforeEachReturn,
) {
    let (history, _, mut rx, local) = before_each.await;
    let mut theirs = local[1].clone();
    theirs.comment = "edited on another device".into();

    let stats = sync_stats(&history, &mut rx, 2, vec![SyncData::live(theirs.clone(), REVISION)]).await;
    assert_eq!(stats.conflicts_local, vec![SyncData::live(local[1].clone(), REVISION)]);
    assert_eq!(stats.conflicts_remote, vec![SyncData::live(theirs, REVISION)]);
    assert!(stats.remote_updates.is_empty());
    assert!(stats.local_updates.iter().all(|r| r.id() != local[1].id));
    assert_eq!(stats.local_updates.len(), 2);
}

#[rstest]
#[tokio::test]
async fn it_should_look_outside_the_window_for_remote_identities(
    #[future] before_each: BeforeEachReturn,
) {
    let (history, _, mut rx, local) = before_each.await;
    let mut theirs = local[0].clone();
    theirs.comment = "newer remote".into();

    history
        .sync_stats(3, vec![SyncData::live(theirs.clone(), REVISION + 1)], 0, 1)
        .unwrap();
    let HistoryEvent::SyncStatsAvailable { stats, .. } =
        next_event(&mut rx, |e| e.request_id() == Some(3)).await
    else {
        panic!("expected SyncStatsAvailable");
    };
    assert_eq!(stats.remote_updates, vec![SyncData::live(theirs, REVISION + 1)]);
    assert!(stats.local_updates.is_empty());
}

#[rstest]
#[tokio::test]
async fn it_should_apply_accepted_remote_changes_through_the_queue(
    #[future] before_each: BeforeEachReturn,
) {
    let (history, store, mut rx, local) = before_each.await;
    let added = EntryBuilder::new()
        .fresh_id()
        .start_time(T0 + 10 * HOUR)
        .category("Remote")
        .build();
    let mut edited = local[0].clone();
    edited.comment = "remote edit".into();

    history
        .sync(
            vec![
                SyncData::live(added.clone(), REVISION + 5),
                SyncData::live(edited.clone(), REVISION + 5),
            ],
            vec![SyncData::removed(local[2].clone(), REVISION + 6)],
        )
        .unwrap();

    let synced = next_event(&mut rx, |e| matches!(e, HistoryEvent::DataSynced { .. })).await;
    let HistoryEvent::DataSynced { updated, removed } = synced else {
        unreachable!()
    };
    assert_eq!(updated.len(), 2);
    assert_eq!(removed, vec![SyncData::removed(local[2].clone(), REVISION + 6)]);

    assert_eq!(store.get(edited.id).await.unwrap(), Some(edited.clone()));
    assert_eq!(store.record(added.id).await.unwrap().unwrap().mtime, REVISION + 5);
    assert_eq!(store.get(local[2].id).await.unwrap(), None);

    history.shutdown().await;
    assert_eq!(history.size(), 3);
    assert_eq!(history.undo_count(), 3);
    assert!(history.categories().contains("Remote"));
}

#[rstest]
#[tokio::test]
async fn it_should_skip_a_remote_update_that_collides_on_start_time(
    #[future] before_each: BeforeEachReturn,
) {
    let (history, store, mut rx, local) = before_each.await;
    let clash = EntryBuilder::new()
        .fresh_id()
        .start_time(local[0].start_time)
        .build();
    history
        .sync(vec![SyncData::live(clash.clone(), REVISION + 1)], vec![])
        .unwrap();

    let failure = next_event(&mut rx, |e| matches!(e, HistoryEvent::Error(_))).await;
    assert!(matches!(failure, HistoryEvent::Error(f) if f.entry_id == Some(clash.id)));
    let synced = next_event(&mut rx, |e| matches!(e, HistoryEvent::DataSynced { .. })).await;
    assert_eq!(
        synced,
        HistoryEvent::DataSynced {
            updated: vec![],
            removed: vec![]
        }
    );
    assert_eq!(store.get(clash.id).await.unwrap(), None);
}

#[rstest]
#[tokio::test]
async fn it_should_hand_out_records_modified_in_a_window(
    #[future] before_each: BeforeEachReturn,
) {
    let (history, _, mut rx, local) = before_each.await;
    history.remove(local[0].clone()).unwrap();
    history.sync_data(4, REVISION, REVISION + 1).unwrap();

    let HistoryEvent::SyncDataAvailable { data, as_of, .. } =
        next_event(&mut rx, |e| e.request_id() == Some(4)).await
    else {
        panic!("expected SyncDataAvailable");
    };
    assert_eq!(as_of, REVISION + 1);
    let mut expected: Vec<_> = local[1..].iter().map(|e| e.id).collect();
    expected.sort();
    assert_eq!(data.iter().map(SyncData::id).collect::<Vec<_>>(), expected);
}

#[rstest]
#[tokio::test]
async fn it_should_keep_synced_data_in_the_durable_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json");
    let entry = EntryBuilder::new().fresh_id().build();
    {
        let store = Arc::new(JsonFileEntryStore::open(&path).await.unwrap());
        let history = TimeLogHistory::open(store, HistoryConfig::default())
            .await
            .unwrap();
        history
            .sync(vec![SyncData::live(entry.clone(), REVISION)], vec![])
            .unwrap();
        history.shutdown().await;
    }

    let reopened = JsonFileEntryStore::open(&path).await.unwrap();
    assert_eq!(
        reopened.record(entry.id).await.unwrap(),
        Some(SyncData::live(entry, REVISION))
    );
}
