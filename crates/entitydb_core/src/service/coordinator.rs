//! Persistence coordinator over an eventually-consistent store.
//!
//! # Responsibility
//! - Validate, existence-check and persist attribute sets of one entity kind.
//! - Confirm visibility of single-entity writes within a soft deadline.
//! - Reconcile batches into "persist now" and "needs update" partitions.
//!
//! # Invariants
//! - Existence is decided only by the kind's key-only query returning a match.
//! - Store errors propagate unchanged; nothing is retried.
//! - A missed visibility deadline is logged once and never fails the call.
//! - Every successful mutation writes one audit entry per entity.

use crate::config::PersistenceConfig;
use crate::logging::{EventLog, LogFacade};
use crate::model::attributes::{EntityAttributes, EntityKind};
use crate::service::consistency::{ConsistencyWait, Sleeper, ThreadSleeper, WaitOutcome};
use crate::store::{KeyValueStore, StoreError, StoredRecord};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type PersistenceResult<T> = Result<T, PersistenceError>;

#[derive(Debug)]
pub enum PersistenceError {
    /// Attribute validation failed; carries the invalidity description.
    InvalidParameters(String),
    /// Single-entity create found the identity already stored.
    EntityAlreadyExists(String),
    Store(StoreError),
}

impl Display for PersistenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidParameters(info) => write!(f, "invalid parameters: {info}"),
            Self::EntityAlreadyExists(message) => write!(f, "{message}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PersistenceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::InvalidParameters(_) | Self::EntityAlreadyExists(_) => None,
        }
    }
}

impl From<StoreError> for PersistenceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Create,
    Delete,
}

impl Op {
    fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Delete => "delete",
        }
    }
}

/// Stateless facade over one entity kind's store operations.
pub struct PersistenceCoordinator<K, S, L = LogFacade, P = ThreadSleeper> {
    kind: K,
    store: S,
    log: L,
    wait: ConsistencyWait<P>,
}

impl<K: EntityKind, S: KeyValueStore> PersistenceCoordinator<K, S> {
    /// Uses the `log` facade and real thread sleeps.
    pub fn new(kind: K, store: S, config: &PersistenceConfig) -> Self {
        Self {
            kind,
            store,
            log: LogFacade,
            wait: ConsistencyWait::from_config(config),
        }
    }
}

impl<K, S, L, P> PersistenceCoordinator<K, S, L, P>
where
    K: EntityKind,
    S: KeyValueStore,
    L: EventLog,
    P: Sleeper,
{
    pub fn with_log<L2: EventLog>(self, log: L2) -> PersistenceCoordinator<K, S, L2, P> {
        PersistenceCoordinator {
            kind: self.kind,
            store: self.store,
            log,
            wait: self.wait,
        }
    }

    pub fn with_sleeper<P2: Sleeper>(
        self,
        config: &PersistenceConfig,
        sleeper: P2,
    ) -> PersistenceCoordinator<K, S, L, P2> {
        PersistenceCoordinator {
            kind: self.kind,
            store: self.store,
            log: self.log,
            wait: ConsistencyWait::with_sleeper(config, sleeper),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Persists a new entity and waits for it to become readable.
    ///
    /// # Errors
    /// - `InvalidParameters` when the sanitized attributes are invalid.
    /// - `EntityAlreadyExists` when the identity is already stored.
    /// - `Store` for any store failure.
    pub fn create_entity(&self, attributes: &K::Attributes) -> PersistenceResult<StoredRecord> {
        let entity = self.validated(attributes)?;

        if self.exists(&entity)? {
            let message = format!(
                "Trying to create a {} that exists: {}",
                entity.entity_type(),
                entity.identification_string()
            );
            self.log.warn(&format!(
                "event=entity_create module=coordinator status=conflict kind={} id={}",
                entity.entity_type(),
                entity.identification_string()
            ));
            return Err(PersistenceError::EntityAlreadyExists(message));
        }

        self.save_and_confirm(&entity)
    }

    /// Persists without the pre-existence check.
    ///
    /// Meant for recovery paths where an earlier partial create may have left
    /// the identity behind and overwriting it is the desired outcome.
    pub fn create_entity_without_existence_check(
        &self,
        attributes: &K::Attributes,
    ) -> PersistenceResult<StoredRecord> {
        let entity = self.validated(attributes)?;
        self.save_and_confirm(&entity)
    }

    /// Saves every non-existing item in one bulk write and returns the
    /// sanitized items that already exist, leaving their update to the caller.
    ///
    /// The first invalid item aborts the batch before anything is saved. No
    /// visibility wait is applied.
    pub fn create_entities(
        &self,
        batch: &[K::Attributes],
    ) -> PersistenceResult<Vec<K::Attributes>> {
        let op_id = Uuid::new_v4();
        let mut needs_update = Vec::new();
        let mut records = Vec::new();

        for attributes in batch {
            let entity = self.validated(attributes)?;
            self.audit(Op::Create, op_id, &entity);

            if self.exists(&entity)? {
                needs_update.push(entity);
            } else {
                records.push(entity.to_storage_record());
            }
        }

        if !records.is_empty() {
            self.store.save_all(&records)?;
        }
        self.log.info(&format!(
            "event=entity_create_batch module=coordinator status=ok op_id={op_id} saved={} needs_update={}",
            records.len(),
            needs_update.len()
        ));

        Ok(needs_update)
    }

    /// Deletes every record matching the entity's key-only query and waits
    /// until the store stops reporting it. Absent entities are not an error.
    pub fn delete_entity(&self, attributes: &K::Attributes) -> PersistenceResult<()> {
        let op_id = Uuid::new_v4();
        let entity = self.sanitized(attributes);

        self.store
            .delete_all_matching(&self.kind.key_only_query(&entity))?;

        let outcome = self.wait.wait_until(|| Ok(!self.exists(&entity)?))?;
        self.report_wait(Op::Delete, op_id, &entity, outcome);
        self.audit(Op::Delete, op_id, &entity);
        Ok(())
    }

    /// Deletes each item without waiting for visibility.
    pub fn delete_entities(&self, batch: &[K::Attributes]) -> PersistenceResult<()> {
        let op_id = Uuid::new_v4();
        for attributes in batch {
            let entity = self.sanitized(attributes);
            self.audit(Op::Delete, op_id, &entity);
            self.store
                .delete_all_matching(&self.kind.key_only_query(&entity))?;
        }
        Ok(())
    }

    /// Returns whether the store currently serves at least one record
    /// matching the entity's identity.
    pub fn has_entity(&self, attributes: &K::Attributes) -> PersistenceResult<bool> {
        Ok(self.exists(&self.sanitized(attributes))?)
    }

    /// Fetches the stored record matching the entity's identity, if visible.
    pub fn get_entity(
        &self,
        attributes: &K::Attributes,
    ) -> PersistenceResult<Option<StoredRecord>> {
        let entity = self.sanitized(attributes);
        let matches = self
            .store
            .fetch_matching(&self.kind.key_only_query(&entity))?;
        Ok(matches.into_iter().next())
    }

    fn sanitized(&self, attributes: &K::Attributes) -> K::Attributes {
        let mut entity = attributes.clone();
        entity.sanitize_for_saving();
        entity
    }

    fn validated(&self, attributes: &K::Attributes) -> PersistenceResult<K::Attributes> {
        let entity = self.sanitized(attributes);
        if !entity.is_valid() {
            return Err(PersistenceError::InvalidParameters(entity.invalidity_info()));
        }
        Ok(entity)
    }

    fn exists(&self, entity: &K::Attributes) -> Result<bool, StoreError> {
        let keys = self
            .store
            .execute_key_only_query(&self.kind.key_only_query(entity))?;
        Ok(!keys.is_empty())
    }

    fn save_and_confirm(&self, entity: &K::Attributes) -> PersistenceResult<StoredRecord> {
        let op_id = Uuid::new_v4();
        let record = entity.to_storage_record();
        self.store.save(&record)?;

        let outcome = self.wait.wait_until(|| self.exists(entity))?;
        self.report_wait(Op::Create, op_id, entity, outcome);
        self.audit(Op::Create, op_id, entity);
        Ok(record)
    }

    fn report_wait(&self, op: Op, op_id: Uuid, entity: &K::Attributes, outcome: WaitOutcome) {
        if let WaitOutcome::TimedOut { sleeps, waited } = outcome {
            self.log.info(&format!(
                "event=consistency_wait module=coordinator status=timeout op={} op_id={op_id} kind={} id={} polls={sleeps} waited_ms={}",
                op.as_str(),
                entity.entity_type(),
                entity.identification_string(),
                waited.as_millis()
            ));
        }
    }

    fn audit(&self, op: Op, op_id: Uuid, entity: &K::Attributes) {
        self.log.info(&format!(
            "event=entity_audit module=coordinator op={} op_id={op_id} kind={} backup_id={}",
            op.as_str(),
            entity.entity_type(),
            entity.backup_identifier()
        ));
    }
}
