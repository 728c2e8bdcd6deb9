mod common;

use common::{account, FailingIndex, Level, RecordingLog};
use entitydb_core::db::open_db_in_memory;
use entitydb_core::model::account::ACCOUNT_SEARCH_INDEX;
use entitydb_core::{SearchDocument, SearchQuery, SearchSync, SqliteFtsIndex};

#[test]
fn put_document_swallows_index_failure_and_logs_it() {
    let index = FailingIndex::backend_down();
    let log = RecordingLog::default();
    let sync = SearchSync::new(&index).with_log(&log);

    sync.put_document(ACCOUNT_SEARCH_INDEX, &account("A1"));

    assert_eq!(index.calls(), 1);
    assert_eq!(log.count_at(Level::Error), 1);
    assert_eq!(log.count_containing("event=search_put"), 1);
    assert_eq!(log.count_containing("doc_id=A1"), 1);
}

#[test]
fn put_documents_swallows_batch_failure() {
    let index = FailingIndex::backend_down();
    let log = RecordingLog::default();
    let sync = SearchSync::new(&index).with_log(&log);

    sync.put_documents(ACCOUNT_SEARCH_INDEX, &[account("A1"), account("A2")]);

    assert_eq!(log.count_containing("count=2 doc_ids=A1,A2"), 1);
}

#[test]
fn delete_document_swallows_failure() {
    let index = FailingIndex::backend_down();
    let log = RecordingLog::default();
    let sync = SearchSync::new(&index).with_log(&log);

    sync.delete_document(ACCOUNT_SEARCH_INDEX, "missing");

    assert_eq!(log.count_containing("event=search_delete"), 1);
    assert_eq!(log.count_at(Level::Info), 1);
}

#[test]
fn filterless_query_never_reaches_the_index() {
    let index = FailingIndex::backend_down();
    let log = RecordingLog::default();
    let sync = SearchSync::new(&index).with_log(&log);

    assert!(sync
        .search_documents(ACCOUNT_SEARCH_INDEX, &SearchQuery::from_text("   "))
        .is_none());
    assert_eq!(index.calls(), 0);
    assert!(log.entries().is_empty());
}

#[test]
fn unsupported_query_yields_none_and_info_log() {
    let index = FailingIndex::rejecting_queries();
    let log = RecordingLog::default();
    let sync = SearchSync::new(&index).with_log(&log);

    let hits = sync.search_documents(ACCOUNT_SEARCH_INDEX, &SearchQuery::from_text("alice"));

    assert!(hits.is_none());
    assert_eq!(log.count_containing("status=unsupported"), 1);
    assert_eq!(log.count_at(Level::Info), 1);
}

#[test]
fn backend_failure_during_search_yields_none_and_error_log() {
    let index = FailingIndex::backend_down();
    let log = RecordingLog::default();
    let sync = SearchSync::new(&index).with_log(&log);

    assert!(sync
        .search_documents(ACCOUNT_SEARCH_INDEX, &SearchQuery::from_text("alice"))
        .is_none());
    assert_eq!(log.count_at(Level::Error), 1);
}

#[test]
fn fts_index_round_trip_through_sync() {
    let conn = open_db_in_memory().unwrap();
    let index = SqliteFtsIndex::try_new(&conn).unwrap();
    let log = RecordingLog::default();
    let sync = SearchSync::new(&index).with_log(&log);

    let mut ada = account("ada");
    ada.name = "Ada Lovelace".to_string();
    let mut alan = account("alan");
    alan.name = "Alan Turing".to_string();
    alan.institute = "Manchester".to_string();
    sync.put_documents(ACCOUNT_SEARCH_INDEX, &[ada.clone(), alan]);

    let hits = sync
        .search_documents(ACCOUNT_SEARCH_INDEX, &SearchQuery::from_text("lovelace"))
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].document_id, "ada");
    assert!(hits[0].snippet.contains("[Lovelace]"));

    let nus = sync
        .search_documents(ACCOUNT_SEARCH_INDEX, &SearchQuery::from_text("NUS"))
        .unwrap();
    assert_eq!(nus.len(), 1);

    ada.name = "Augusta King".to_string();
    sync.put_document(ACCOUNT_SEARCH_INDEX, &ada);
    assert!(sync
        .search_documents(ACCOUNT_SEARCH_INDEX, &SearchQuery::from_text("lovelace"))
        .unwrap()
        .is_empty());

    sync.delete_document(ACCOUNT_SEARCH_INDEX, "ada");
    sync.delete_document(ACCOUNT_SEARCH_INDEX, "ada");
    assert!(sync
        .search_documents(ACCOUNT_SEARCH_INDEX, &SearchQuery::from_text("augusta"))
        .unwrap()
        .is_empty());
    assert!(log.entries().is_empty());
}

#[test]
fn fts_index_scopes_results_by_index_name() {
    let conn = open_db_in_memory().unwrap();
    let index = SqliteFtsIndex::try_new(&conn).unwrap();
    let sync = SearchSync::new(&index);

    sync.put_document(
        "courses",
        &SearchDocument::new("CS101").with_field("title", "Rust basics"),
    );
    sync.put_document(
        "sessions",
        &SearchDocument::new("S1").with_field("title", "Rust quiz"),
    );

    let hits = sync
        .search_documents("courses", &SearchQuery::from_text("rust"))
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].document_id, "CS101");
}

#[test]
fn malformed_raw_query_is_absorbed_as_unsupported() {
    let conn = open_db_in_memory().unwrap();
    let index = SqliteFtsIndex::try_new(&conn).unwrap();
    let log = RecordingLog::default();
    let sync = SearchSync::new(&index).with_log(&log);
    sync.put_document(ACCOUNT_SEARCH_INDEX, &account("ada"));

    let query = SearchQuery::default().with_filter("\"unterminated").raw();
    assert!(sync.search_documents(ACCOUNT_SEARCH_INDEX, &query).is_none());
    assert_eq!(log.count_containing("status=unsupported"), 1);
}
