//! Persistence reconciliation over an eventually-consistent key-value store
//! with a best-effort secondary search index.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod search;
pub mod service;
pub mod store;

pub use config::{ConfigError, PersistenceConfig};
pub use logging::{
    default_log_level, init_logging, logging_status, EventLog, LogFacade, LogSettings,
};
pub use model::account::{AccountAttributes, AccountKind};
pub use model::attributes::{EntityAttributes, EntityKind};
pub use search::fts::SqliteFtsIndex;
pub use search::sync::SearchSync;
pub use search::{
    SearchDocument, SearchDocumentBuilder, SearchError, SearchHit, SearchIndex, SearchQuery,
    SearchResult,
};
pub use service::consistency::{ConsistencyWait, Sleeper, ThreadSleeper, WaitOutcome};
pub use service::coordinator::{PersistenceCoordinator, PersistenceError, PersistenceResult};
pub use store::memory::{InMemoryStore, Visibility};
pub use store::sqlite::SqliteStore;
pub use store::{KeyOnlyQuery, KeyValueStore, RecordKey, StoreError, StoreResult, StoredRecord};

/// Minimal health-check API for host wiring probes.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
