mod common;

use common::{account, CountingSleeper, RecordingLog, UnavailableStore};
use entitydb_core::{
    AccountAttributes, AccountKind, InMemoryStore, KeyValueStore, PersistenceConfig,
    PersistenceCoordinator, PersistenceError, StoreError, Visibility,
};
use std::time::Duration;

fn coordinator<'a, S: KeyValueStore>(
    store: S,
    log: &'a RecordingLog,
    sleeper: &'a CountingSleeper,
) -> PersistenceCoordinator<AccountKind, S, &'a RecordingLog, &'a CountingSleeper> {
    let config =
        PersistenceConfig::with_wait(Duration::from_millis(50), Duration::from_millis(10));
    PersistenceCoordinator::new(AccountKind, store, &config)
        .with_log(log)
        .with_sleeper(&config, sleeper)
}

#[test]
fn delete_removes_entity_and_is_idempotent() {
    let store = InMemoryStore::new();
    let log = RecordingLog::default();
    let sleeper = CountingSleeper::default();
    let coordinator = coordinator(&store, &log, &sleeper);
    coordinator.create_entity(&account("A1")).unwrap();

    coordinator.delete_entity(&account("A1")).unwrap();
    assert!(!coordinator.has_entity(&account("A1")).unwrap());

    coordinator.delete_entity(&account("A1")).unwrap();
    assert_eq!(sleeper.calls(), 0);
    assert_eq!(log.count_containing("op=delete"), 2);
}

#[test]
fn deleting_an_entity_that_never_existed_is_silent() {
    let store = InMemoryStore::new();
    let log = RecordingLog::default();
    let sleeper = CountingSleeper::default();
    let coordinator = coordinator(&store, &log, &sleeper);

    coordinator.delete_entity(&account("ghost")).unwrap();

    assert_eq!(log.count_containing("status=timeout"), 0);
    assert_eq!(
        log.count_containing("backup_id=Recently modified account::ghost"),
        1
    );
}

#[test]
fn delete_polls_until_the_entity_is_gone() {
    let store = InMemoryStore::with_visibility(Visibility::AfterReads(2));
    let log = RecordingLog::default();
    let sleeper = CountingSleeper::default();
    let coordinator = coordinator(&store, &log, &sleeper);
    coordinator.create_entity(&account("A1")).unwrap();
    let sleeps_for_create = sleeper.calls();

    coordinator.delete_entity(&account("A1")).unwrap();

    assert_eq!(sleeper.calls() - sleeps_for_create, 2);
    assert_eq!(log.count_containing("status=timeout"), 0);
    assert!(!coordinator.has_entity(&account("A1")).unwrap());
}

#[test]
fn delete_with_stuck_tombstone_times_out_once() {
    let store = InMemoryStore::with_visibility(Visibility::AfterReads(100));
    let log = RecordingLog::default();
    let sleeper = CountingSleeper::default();
    let config = PersistenceConfig::without_wait();
    let seed = PersistenceCoordinator::new(AccountKind, &store, &config);
    seed.create_entity(&account("A1")).unwrap();
    let visible = (0..200).any(|_| seed.has_entity(&account("A1")).unwrap());
    assert!(visible);

    let coordinator = coordinator(&store, &log, &sleeper);
    coordinator.delete_entity(&account("A1")).unwrap();

    assert_eq!(sleeper.calls(), 5);
    assert_eq!(log.count_containing("status=timeout op=delete"), 1);
    assert_eq!(log.count_containing("event=entity_audit"), 1);
}

#[test]
fn batch_delete_removes_every_item_without_waiting() {
    let store = InMemoryStore::new();
    let log = RecordingLog::default();
    let sleeper = CountingSleeper::default();
    let coordinator = coordinator(&store, &log, &sleeper);
    let batch = ["E1", "E2", "E3"].map(account);
    coordinator.create_entities(&batch).unwrap();

    coordinator.delete_entities(&batch).unwrap();

    assert_eq!(store.visible_len(), 0);
    assert_eq!(sleeper.calls(), 0);
    assert_eq!(log.count_containing("op=delete"), 3);
}

#[test]
fn store_delete_failure_propagates() {
    let log = RecordingLog::default();
    let sleeper = CountingSleeper::default();
    let coordinator = coordinator(UnavailableStore, &log, &sleeper);

    let err = coordinator.delete_entity(&account("A1")).unwrap_err();
    assert!(matches!(err, PersistenceError::Store(StoreError::Unavailable(_))));

    let err = coordinator.delete_entities(&[account("A1")]).unwrap_err();
    assert!(matches!(err, PersistenceError::Store(StoreError::Unavailable(_))));
}

#[test]
fn get_entity_maps_back_to_attributes() {
    let store = InMemoryStore::new();
    let log = RecordingLog::default();
    let sleeper = CountingSleeper::default();
    let coordinator = coordinator(&store, &log, &sleeper);
    assert!(coordinator.get_entity(&account("A1")).unwrap().is_none());

    let mut instructor = account("A1");
    instructor.is_instructor = true;
    coordinator.create_entity(&instructor).unwrap();

    let record = coordinator.get_entity(&account("A1")).unwrap().unwrap();
    assert_eq!(AccountAttributes::from_record(&record).unwrap(), instructor);
}
