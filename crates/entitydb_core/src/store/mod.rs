//! Key-value store contracts and bundled implementations.
//!
//! # Responsibility
//! - Define the store-native record shape and the key-only lookup.
//! - Isolate backend details (SQLite, in-memory) behind [`KeyValueStore`].
//!
//! # Invariants
//! - A record matches a [`KeyOnlyQuery`] iff its kind is equal and every
//!   identifying field of the query has an equal value on the record.
//! - `save` is an upsert on `(kind, id)`.
//! - `delete_all_matching` succeeds when nothing matches.

use crate::db::DbError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod memory;
pub mod sqlite;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store-level failure surfaced unmodified to coordinator callers.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    Serialization(serde_json::Error),
    InvalidData(String),
    /// Backend rejected or could not serve the call.
    Unavailable(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Serialization(err) => write!(f, "record serialization failed: {err}"),
            Self::InvalidData(message) => write!(f, "invalid stored record: {message}"),
            Self::Unavailable(message) => write!(f, "store unavailable: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::InvalidData(_) | Self::Unavailable(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// Store-native representation of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Entity kind, e.g. `Account`.
    pub kind: String,
    /// Primary key within `kind`.
    pub id: String,
    /// Natural identifying fields matched by key-only queries.
    pub key_fields: BTreeMap<String, String>,
    pub body: serde_json::Value,
}

impl StoredRecord {
    pub fn new(kind: impl Into<String>, id: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            key_fields: BTreeMap::new(),
            body,
        }
    }

    pub fn with_key_field(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.key_fields.insert(field.into(), value.into());
        self
    }

    pub fn key(&self) -> RecordKey {
        RecordKey {
            kind: self.kind.clone(),
            id: self.id.clone(),
        }
    }

    /// Returns whether this record is selected by `query`.
    pub fn matches(&self, query: &KeyOnlyQuery) -> bool {
        self.kind == query.kind
            && query
                .identity
                .iter()
                .all(|(field, value)| self.key_fields.get(field) == Some(value))
    }
}

/// Primary key of a stored record; the only payload of key-only results.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub kind: String,
    pub id: String,
}

/// Existence lookup by kind plus natural identifying fields.
///
/// An empty identity selects every record of `kind`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyOnlyQuery {
    pub kind: String,
    pub identity: BTreeMap<String, String>,
}

impl KeyOnlyQuery {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            identity: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.identity.insert(field.into(), value.into());
        self
    }
}

/// Eventually-consistent key-value store client.
pub trait KeyValueStore {
    fn save(&self, record: &StoredRecord) -> StoreResult<()>;
    fn save_all(&self, records: &[StoredRecord]) -> StoreResult<()>;
    /// Returns the keys of matching records; empty means no match.
    fn execute_key_only_query(&self, query: &KeyOnlyQuery) -> StoreResult<Vec<RecordKey>>;
    fn fetch_matching(&self, query: &KeyOnlyQuery) -> StoreResult<Vec<StoredRecord>>;
    fn delete_all_matching(&self, query: &KeyOnlyQuery) -> StoreResult<()>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for &S {
    fn save(&self, record: &StoredRecord) -> StoreResult<()> {
        (**self).save(record)
    }

    fn save_all(&self, records: &[StoredRecord]) -> StoreResult<()> {
        (**self).save_all(records)
    }

    fn execute_key_only_query(&self, query: &KeyOnlyQuery) -> StoreResult<Vec<RecordKey>> {
        (**self).execute_key_only_query(query)
    }

    fn fetch_matching(&self, query: &KeyOnlyQuery) -> StoreResult<Vec<StoredRecord>> {
        (**self).fetch_matching(query)
    }

    fn delete_all_matching(&self, query: &KeyOnlyQuery) -> StoreResult<()> {
        (**self).delete_all_matching(query)
    }
}
