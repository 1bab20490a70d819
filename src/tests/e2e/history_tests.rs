use crate::modules::time_log::application::config::HistoryConfig;
use crate::modules::time_log::application::errors::ErrorKind;
use crate::modules::time_log::application::history::TimeLogHistory;
use crate::modules::time_log::core::entry::{Entry, Fields, HistoryEntry};
use crate::modules::time_log::core::events::HistoryEvent;
use crate::modules::time_log::core::stats::StatsEntry;
use crate::shared::infrastructure::entry_store::EntryStore;
use crate::shared::infrastructure::entry_store::in_memory::InMemoryEntryStore;
use crate::tests::fixtures::entries::EntryBuilder;
use crate::tests::fixtures::next_event;
use rstest::{fixture, rstest};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

const T0: i64 = 1_700_000_000_000;
const HOUR: i64 = 3_600_000;

static REQUEST_IDS: AtomicU64 = AtomicU64::new(1);

type BeforeEachReturn = (
    TimeLogHistory,
    Arc<InMemoryEntryStore>,
    broadcast::Receiver<HistoryEvent>,
);

#[fixture]
async fn before_each() -> BeforeEachReturn {
    let store = Arc::new(InMemoryEntryStore::new());
    let history = TimeLogHistory::open(store.clone(), HistoryConfig::default())
        .await
        .expect("expected the history to open");
    let rx = history.subscribe();
    (history, store, rx)
}

fn entry_at(start_time: i64, category: &str) -> Entry {
    EntryBuilder::new()
        .unassigned()
        .start_time(start_time)
        .category(category)
        .build()
}

/// Reads the whole history through the queue, so every earlier command has finished once it returns.
async fn settle(
    history: &TimeLogHistory,
    rx: &mut broadcast::Receiver<HistoryEvent>,
) -> Vec<HistoryEntry> {
    let request_id = REQUEST_IDS.fetch_add(1, Ordering::Relaxed);
    history
        .history_between(request_id, i64::MIN, i64::MAX, "")
        .unwrap();
    match next_event(rx, |e| e.request_id() == Some(request_id)).await {
        HistoryEvent::HistoryRequestCompleted { entries, .. } => entries,
        other => panic!("expected HistoryRequestCompleted, got {other:?}"),
    }
}

#[rstest]
#[tokio::test]
async fn it_should_list_every_inserted_entry_in_start_time_order(
    #[future] before_each: BeforeEachReturn,
) {
    let (history, _, mut rx) = before_each.await;
    let starts = [5, 1, 4, 2, 3].map(|n| T0 + n * HOUR);
    for start in starts {
        history.insert(entry_at(start, "Work")).unwrap();
    }

    let entries = settle(&history, &mut rx).await;
    let listed: Vec<i64> = entries.iter().map(|e| e.entry.start_time).collect();
    let mut expected = starts.to_vec();
    expected.sort();
    assert_eq!(listed, expected);
    assert_eq!(history.size(), starts.len() as u64);
    assert!(entries[..4].iter().all(|e| e.duration == Some(HOUR)));
    assert!(entries[4].is_open());
}

#[rstest]
#[tokio::test]
async fn it_should_report_a_conflict_and_leave_the_store_unchanged(
    #[future] before_each: BeforeEachReturn,
) {
    let (history, store, mut rx) = before_each.await;
    history.insert(entry_at(T0, "Work")).unwrap();
    let before = settle(&history, &mut rx).await;

    history.insert(entry_at(T0, "Home")).unwrap();
    let failure = next_event(&mut rx, |e| matches!(e, HistoryEvent::Error(_))).await;
    let HistoryEvent::Error(failure) = failure else {
        unreachable!()
    };
    assert_eq!(failure.error.kind(), ErrorKind::Conflict);

    assert_eq!(settle(&history, &mut rx).await, before);
    assert_eq!(store.load_all().await.unwrap().len(), 1);
    assert_eq!(history.size(), 1);
    assert_eq!(history.undo_count(), 1);
}

#[derive(Debug, Clone, Copy)]
enum Mutation {
    Insert,
    Remove,
    EditComment,
    EditStartTime,
    RenameCategory,
}

#[rstest]
#[case(Mutation::Insert)]
#[case(Mutation::Remove)]
#[case(Mutation::EditComment)]
#[case(Mutation::EditStartTime)]
#[case(Mutation::RenameCategory)]
#[tokio::test]
async fn it_should_restore_the_exact_previous_state_on_undo(
    #[future] before_each: BeforeEachReturn,
    #[case] mutation: Mutation,
) {
    let (history, store, mut rx) = before_each.await;
    history.insert(entry_at(T0, "Work")).unwrap();
    history.insert(entry_at(T0 + HOUR, "Home")).unwrap();
    let before_entries = settle(&history, &mut rx).await;
    let before_store = store.load_all().await.unwrap();
    let before_records = store.modified_between(i64::MIN, i64::MAX).await.unwrap();
    let before_snapshot = history.snapshot();
    let target = before_entries[0].entry.clone();

    match mutation {
        Mutation::Insert => history.insert(entry_at(T0 + 2 * HOUR, "Sport")).unwrap(),
        Mutation::Remove => history.remove(target).unwrap(),
        Mutation::EditComment => {
            let mut changed = target;
            changed.comment = "changed".into();
            history.edit(changed, Fields::COMMENT).unwrap()
        }
        Mutation::EditStartTime => {
            let mut changed = target;
            changed.start_time = T0 - HOUR;
            history.edit(changed, Fields::START_TIME).unwrap()
        }
        Mutation::RenameCategory => history.edit_category("Work", "Job").unwrap(),
    }
    let after_entries = settle(&history, &mut rx).await;
    assert_ne!(after_entries, before_entries);
    assert_eq!(history.undo_count(), before_snapshot.undo_count + 1);

    history.undo().unwrap();
    assert_eq!(settle(&history, &mut rx).await, before_entries);
    assert_eq!(store.load_all().await.unwrap(), before_store);
    assert_eq!(
        store.modified_between(i64::MIN, i64::MAX).await.unwrap(),
        before_records
    );
    for touched in &after_entries {
        let id = touched.entry.id;
        let expected = before_records.iter().find(|r| r.id() == id).cloned();
        assert_eq!(store.record(id).await.unwrap(), expected);
    }
    assert_eq!(history.snapshot(), before_snapshot);
    history.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn it_should_accept_the_same_identity_again_after_undoing_its_insert(
    #[future] before_each: BeforeEachReturn,
) {
    let (history, store, mut rx) = before_each.await;
    let entry = EntryBuilder::new().fresh_id().start_time(T0).build();
    history.insert(entry.clone()).unwrap();
    history.undo().unwrap();
    history.insert(entry.clone()).unwrap();

    assert_eq!(settle(&history, &mut rx).await.len(), 1);
    assert_eq!(store.get(entry.id).await.unwrap(), Some(entry));
    assert_eq!(history.undo_count(), 1);
}

#[rstest]
#[tokio::test]
async fn it_should_keep_serving_after_an_out_of_range_start_time(
    #[future] before_each: BeforeEachReturn,
) {
    let (history, _, mut rx) = before_each.await;
    history.insert(Entry::new(i64::MIN, "a", "")).unwrap();
    history.insert(Entry::new(1, "b", "")).unwrap();

    let failure = next_event(&mut rx, |e| matches!(e, HistoryEvent::Error(_))).await;
    let HistoryEvent::Error(failure) = failure else {
        unreachable!()
    };
    assert_eq!(failure.error.kind(), ErrorKind::InvalidArgument);

    let entries = settle(&history, &mut rx).await;
    assert_eq!(entries.len(), 1);
    assert!(entries[0].is_open());
    assert_eq!(history.size(), 1);
    assert!(history.undo().is_ok());
}

#[rstest]
#[tokio::test]
async fn it_should_round_trip_a_category_rename(#[future] before_each: BeforeEachReturn) {
    let (history, _, mut rx) = before_each.await;
    history.insert(entry_at(T0, "work")).unwrap();
    history.insert(entry_at(T0 + HOUR, "home")).unwrap();
    history.insert(entry_at(T0 + 2 * HOUR, "work")).unwrap();
    let before = settle(&history, &mut rx).await;

    history.edit_category("work", "job").unwrap();
    let renamed = settle(&history, &mut rx).await;
    assert_eq!(renamed.iter().filter(|e| e.entry.category == "job").count(), 2);
    assert!(history.categories().contains("job"));
    assert!(!history.categories().contains("work"));

    history.edit_category("job", "work").unwrap();
    assert_eq!(settle(&history, &mut rx).await, before);
    assert_eq!(history.undo_count(), 5);
}

#[rstest]
#[tokio::test]
async fn it_should_signal_nothing_to_undo_on_an_empty_stack(
    #[future] before_each: BeforeEachReturn,
) {
    let (history, _, mut rx) = before_each.await;
    history.undo().unwrap();
    let event = next_event(&mut rx, |e| matches!(e, HistoryEvent::NothingToUndo)).await;
    assert_eq!(event, HistoryEvent::NothingToUndo);
    assert_eq!(history.undo_count(), 0);
}

#[rstest]
#[tokio::test]
async fn it_should_keep_the_size_consistent_under_concurrent_issuers(
    #[future] before_each: BeforeEachReturn,
) {
    let (history, store, _) = before_each.await;
    const ISSUERS: i64 = 10;

    let mut tasks = Vec::new();
    for issuer in 0..ISSUERS {
        let history = history.clone();
        tasks.push(tokio::spawn(async move {
            let mut inserted = Vec::new();
            for n in 0..60 {
                let entry = EntryBuilder::new()
                    .fresh_id()
                    .start_time(T0 + issuer * 1_000 + n)
                    .build();
                history.insert(entry.clone()).unwrap();
                inserted.push(entry);
                if n % 2 == 1 {
                    history.remove(inserted.remove(0)).unwrap();
                }
                if n % 6 == 0 {
                    history
                        .history_after(REQUEST_IDS.fetch_add(1, Ordering::Relaxed), 10, T0)
                        .unwrap();
                }
                tokio::task::yield_now().await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    history.shutdown().await;

    // 10 issuers x (60 inserts + 30 removes + 10 reads) = 1000 commands.
    assert_eq!(history.size(), (ISSUERS * 30) as u64);
    assert_eq!(store.load_all().await.unwrap().len(), (ISSUERS * 30) as usize);
}

#[rstest]
#[tokio::test]
async fn it_should_report_an_open_duration_for_the_most_recent_entry(
    #[future] before_each: BeforeEachReturn,
) {
    let (history, _, mut rx) = before_each.await;
    let t1 = T0 + 90 * 60_000;
    history.insert(entry_at(T0, "x")).unwrap();
    history.insert(entry_at(t1, "y")).unwrap();

    history.stats(77, T0, t1 + 1, "", "/").unwrap();
    let event = next_event(&mut rx, |e| e.request_id() == Some(77)).await;
    let HistoryEvent::StatsAvailable { stats, as_of, .. } = event else {
        panic!("expected StatsAvailable, got {event:?}");
    };
    assert_eq!(as_of, t1 + 1);
    assert_eq!(
        stats,
        vec![
            StatsEntry {
                category: "x".into(),
                duration: t1 - T0,
                open: false,
            },
            StatsEntry {
                category: "y".into(),
                duration: 0,
                open: true,
            },
        ]
    );
}

#[rstest]
#[tokio::test]
async fn it_should_page_through_history_around_a_point(#[future] before_each: BeforeEachReturn) {
    let (history, _, mut rx) = before_each.await;
    for n in 0..5 {
        history.insert(entry_at(T0 + n * HOUR, "Work")).unwrap();
    }

    history.history_after(90, 2, T0).unwrap();
    history.history_before(91, 2, T0 + 4 * HOUR).unwrap();
    let after = next_event(&mut rx, |e| e.request_id() == Some(90)).await;
    let before = next_event(&mut rx, |e| e.request_id() == Some(91)).await;

    let starts = |event: HistoryEvent| match event {
        HistoryEvent::HistoryRequestCompleted { entries, .. } => entries
            .into_iter()
            .map(|e| e.entry.start_time)
            .collect::<Vec<_>>(),
        other => panic!("expected HistoryRequestCompleted, got {other:?}"),
    };
    assert_eq!(starts(after), vec![T0 + HOUR, T0 + 2 * HOUR]);
    assert_eq!(starts(before), vec![T0 + 2 * HOUR, T0 + 3 * HOUR]);
}
