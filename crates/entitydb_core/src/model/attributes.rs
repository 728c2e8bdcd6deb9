//! Attribute-set and entity-kind contracts.

use crate::store::{KeyOnlyQuery, StoredRecord};

/// Caller-owned, not-yet-persisted representation of an entity.
///
/// The coordinator sanitizes and converts private clones, so the caller's
/// value is never changed by a persistence call.
pub trait EntityAttributes: Clone {
    /// Normalizes fields in place (trimming, whitespace collapsing).
    fn sanitize_for_saving(&mut self);
    fn is_valid(&self) -> bool;
    /// Human-readable description of every failed rule; empty when valid.
    fn invalidity_info(&self) -> String;
    fn to_storage_record(&self) -> StoredRecord;
    /// Kind name used in logs and error messages, e.g. `Account`.
    fn entity_type(&self) -> &str;
    /// Identity string used in logs and error messages.
    fn identification_string(&self) -> String;
    /// Audit line written after every mutation of this entity.
    fn backup_identifier(&self) -> String;
}

/// Per-kind lookup hook, implemented once per entity kind.
pub trait EntityKind {
    type Attributes: EntityAttributes;

    /// Derives the lookup over the natural identifying fields of `attributes`.
    fn key_only_query(&self, attributes: &Self::Attributes) -> KeyOnlyQuery;
}
