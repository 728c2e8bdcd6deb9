#![allow(dead_code)]

use entitydb_core::{
    AccountAttributes, EventLog, KeyOnlyQuery, KeyValueStore, RecordKey, SearchDocument,
    SearchError, SearchHit, SearchIndex, SearchQuery, SearchResult, Sleeper, StoreError,
    StoreResult, StoredRecord,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

/// Captures every entry written through [`EventLog`].
#[derive(Default)]
pub struct RecordingLog {
    entries: Mutex<Vec<(Level, String)>>,
}

impl RecordingLog {
    pub fn entries(&self) -> Vec<(Level, String)> {
        self.entries.lock().clone()
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.entries()
            .iter()
            .filter(|(_, message)| message.contains(needle))
            .count()
    }

    pub fn count_at(&self, level: Level) -> usize {
        self.entries()
            .iter()
            .filter(|(entry_level, _)| *entry_level == level)
            .count()
    }

    fn push(&self, level: Level, message: &str) {
        self.entries.lock().push((level, message.to_string()));
    }
}

impl EventLog for RecordingLog {
    fn info(&self, message: &str) {
        self.push(Level::Info, message);
    }

    fn warn(&self, message: &str) {
        self.push(Level::Warn, message);
    }

    fn error(&self, message: &str) {
        self.push(Level::Error, message);
    }
}

/// Records sleeps instead of blocking.
#[derive(Default)]
pub struct CountingSleeper {
    calls: AtomicU32,
}

impl CountingSleeper {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Sleeper for CountingSleeper {
    fn sleep(&self, _duration: Duration) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Store whose every call fails.
pub struct UnavailableStore;

impl KeyValueStore for UnavailableStore {
    fn save(&self, _record: &StoredRecord) -> StoreResult<()> {
        Err(StoreError::Unavailable("save rejected".to_string()))
    }

    fn save_all(&self, _records: &[StoredRecord]) -> StoreResult<()> {
        Err(StoreError::Unavailable("bulk save rejected".to_string()))
    }

    fn execute_key_only_query(&self, _query: &KeyOnlyQuery) -> StoreResult<Vec<RecordKey>> {
        Ok(Vec::new())
    }

    fn fetch_matching(&self, _query: &KeyOnlyQuery) -> StoreResult<Vec<StoredRecord>> {
        Ok(Vec::new())
    }

    fn delete_all_matching(&self, _query: &KeyOnlyQuery) -> StoreResult<()> {
        Err(StoreError::Unavailable("delete rejected".to_string()))
    }
}

/// Index whose every call fails with the configured error.
pub struct FailingIndex {
    pub unsupported: bool,
    calls: AtomicU32,
}

impl FailingIndex {
    pub fn backend_down() -> Self {
        Self {
            unsupported: false,
            calls: AtomicU32::new(0),
        }
    }

    pub fn rejecting_queries() -> Self {
        Self {
            unsupported: true,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> SearchResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unsupported {
            return Err(SearchError::UnsupportedQuery {
                query: "bad".to_string(),
                message: "syntax".to_string(),
            });
        }
        Err(SearchError::Backend("index offline".to_string()))
    }
}

impl SearchIndex for FailingIndex {
    fn put_document(&self, _index_name: &str, _document: &SearchDocument) -> SearchResult<()> {
        self.fail()
    }

    fn put_documents(&self, _index_name: &str, _documents: &[SearchDocument]) -> SearchResult<()> {
        self.fail()
    }

    fn delete_document(&self, _index_name: &str, _document_id: &str) -> SearchResult<()> {
        self.fail()
    }

    fn search(&self, _index_name: &str, _query: &SearchQuery) -> SearchResult<Vec<SearchHit>> {
        self.fail()
    }
}

pub fn account(google_id: &str) -> AccountAttributes {
    AccountAttributes::new(
        google_id,
        format!("User {google_id}"),
        format!("{google_id}@example.com"),
        "NUS",
    )
}
