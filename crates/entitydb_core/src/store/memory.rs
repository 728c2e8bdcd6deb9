//! In-process store that simulates eventual read-after-write consistency.
//!
//! # Invariants
//! - Mutations are accepted immediately and applied to the readable view in
//!   submission order.
//! - With `Visibility::AfterReads(n)`, a mutation is invisible to the next
//!   `n` reads and visible from read `n + 1` on.
//! - With `Visibility::Never`, accepted mutations are never applied.

use crate::store::{KeyOnlyQuery, KeyValueStore, RecordKey, StoreResult, StoredRecord};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};

/// How soon accepted mutations become readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Immediate,
    AfterReads(u32),
    Never,
}

#[derive(Debug)]
enum Mutation {
    Put(StoredRecord),
    Delete(KeyOnlyQuery),
}

#[derive(Debug)]
struct Pending {
    mutation: Mutation,
    reads_left: u32,
}

#[derive(Debug, Default)]
struct MemoryState {
    visible: BTreeMap<RecordKey, StoredRecord>,
    pending: VecDeque<Pending>,
    reads: u64,
}

impl MemoryState {
    fn submit(&mut self, mutation: Mutation, visibility: Visibility) {
        match visibility {
            Visibility::Immediate | Visibility::AfterReads(0) => self.apply(mutation),
            Visibility::AfterReads(reads_left) => self.pending.push_back(Pending {
                mutation,
                reads_left,
            }),
            Visibility::Never => {}
        }
    }

    fn apply(&mut self, mutation: Mutation) {
        match mutation {
            Mutation::Put(record) => {
                self.visible.insert(record.key(), record);
            }
            Mutation::Delete(query) => self.visible.retain(|_, record| !record.matches(&query)),
        }
    }

    /// Runs `read` against the visible view and advances pending mutations.
    fn read<T>(&mut self, read: impl FnOnce(&BTreeMap<RecordKey, StoredRecord>) -> T) -> T {
        while self
            .pending
            .front()
            .is_some_and(|pending| pending.reads_left == 0)
        {
            if let Some(pending) = self.pending.pop_front() {
                self.apply(pending.mutation);
            }
        }

        self.reads += 1;
        let result = read(&self.visible);

        for pending in &mut self.pending {
            pending.reads_left = pending.reads_left.saturating_sub(1);
        }
        result
    }
}

/// Thread-safe in-memory [`KeyValueStore`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    visibility: Visibility,
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    /// Store whose writes are readable immediately.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_visibility(visibility: Visibility) -> Self {
        Self {
            visibility,
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Number of reads (key-only queries and fetches) served so far.
    pub fn read_count(&self) -> u64 {
        self.state.lock().reads
    }

    /// Number of accepted mutations not yet readable.
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Number of readable records; does not count as a read.
    pub fn visible_len(&self) -> usize {
        self.state.lock().visible.len()
    }
}

impl KeyValueStore for InMemoryStore {
    fn save(&self, record: &StoredRecord) -> StoreResult<()> {
        self.state
            .lock()
            .submit(Mutation::Put(record.clone()), self.visibility);
        Ok(())
    }

    fn save_all(&self, records: &[StoredRecord]) -> StoreResult<()> {
        let mut state = self.state.lock();
        for record in records {
            state.submit(Mutation::Put(record.clone()), self.visibility);
        }
        Ok(())
    }

    fn execute_key_only_query(&self, query: &KeyOnlyQuery) -> StoreResult<Vec<RecordKey>> {
        Ok(self.state.lock().read(|visible| {
            visible
                .iter()
                .filter(|(_, record)| record.matches(query))
                .map(|(key, _)| key.clone())
                .collect()
        }))
    }

    fn fetch_matching(&self, query: &KeyOnlyQuery) -> StoreResult<Vec<StoredRecord>> {
        Ok(self.state.lock().read(|visible| {
            visible
                .values()
                .filter(|record| record.matches(query))
                .cloned()
                .collect()
        }))
    }

    fn delete_all_matching(&self, query: &KeyOnlyQuery) -> StoreResult<()> {
        self.state
            .lock()
            .submit(Mutation::Delete(query.clone()), self.visibility);
        Ok(())
    }
}
