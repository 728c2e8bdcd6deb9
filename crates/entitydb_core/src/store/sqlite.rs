//! SQLite-backed [`KeyValueStore`].
//!
//! # Invariants
//! - Connections must be migrated (`open_db`/`open_db_in_memory`) before use.
//! - `record_keys` rows always mirror `records.key_fields` for the same key.
//! - Saves of several records commit atomically.

use crate::db::ensure_migrated;
use crate::store::{
    KeyOnlyQuery, KeyValueStore, RecordKey, StoreError, StoreResult, StoredRecord,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::collections::BTreeMap;

const RECORD_SELECT_SQL: &str = "SELECT
    records.kind AS kind,
    records.id AS id,
    records.key_fields AS key_fields,
    records.body AS body
FROM records";

/// SQLite store over a borrowed, migrated connection.
pub struct SqliteStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStore<'conn> {
    /// Wraps `conn` after checking that its schema is current.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_migrated(conn)?;
        Ok(Self { conn })
    }

    fn write_record(&self, record: &StoredRecord) -> StoreResult<()> {
        let key_fields = serde_json::to_string(&record.key_fields)?;
        let body = serde_json::to_string(&record.body)?;

        self.conn.execute(
            "INSERT INTO records (kind, id, key_fields, body)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (kind, id) DO UPDATE SET
                key_fields = excluded.key_fields,
                body = excluded.body,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![record.kind, record.id, key_fields, body],
        )?;

        self.conn.execute(
            "DELETE FROM record_keys WHERE kind = ?1 AND id = ?2;",
            params![record.kind, record.id],
        )?;
        let mut insert_key = self.conn.prepare_cached(
            "INSERT INTO record_keys (kind, id, field, value) VALUES (?1, ?2, ?3, ?4);",
        )?;
        for (field, value) in &record.key_fields {
            insert_key.execute(params![record.kind, record.id, field, value])?;
        }

        Ok(())
    }
}

impl KeyValueStore for SqliteStore<'_> {
    fn save(&self, record: &StoredRecord) -> StoreResult<()> {
        self.save_all(std::slice::from_ref(record))
    }

    fn save_all(&self, records: &[StoredRecord]) -> StoreResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let tx = self.conn.unchecked_transaction()?;
        for record in records {
            self.write_record(record)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn execute_key_only_query(&self, query: &KeyOnlyQuery) -> StoreResult<Vec<RecordKey>> {
        let (filter, bind_values) = build_match_filter(query);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT records.kind AS kind, records.id AS id FROM records WHERE {filter} ORDER BY records.id ASC"
        ))?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut keys = Vec::new();

        while let Some(row) = rows.next()? {
            keys.push(RecordKey {
                kind: row.get("kind")?,
                id: row.get("id")?,
            });
        }

        Ok(keys)
    }

    fn fetch_matching(&self, query: &KeyOnlyQuery) -> StoreResult<Vec<StoredRecord>> {
        let (filter, bind_values) = build_match_filter(query);
        let mut stmt = self.conn.prepare(&format!(
            "{RECORD_SELECT_SQL} WHERE {filter} ORDER BY records.id ASC"
        ))?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut records = Vec::new();

        while let Some(row) = rows.next()? {
            records.push(parse_record_row(row)?);
        }

        Ok(records)
    }

    fn delete_all_matching(&self, query: &KeyOnlyQuery) -> StoreResult<()> {
        let (filter, bind_values) = build_match_filter(query);
        self.conn.execute(
            &format!("DELETE FROM records WHERE {filter}"),
            params_from_iter(bind_values),
        )?;
        Ok(())
    }
}

/// Builds a `WHERE` clause selecting records of the query's kind whose key
/// rows contain every identity pair.
fn build_match_filter(query: &KeyOnlyQuery) -> (String, Vec<Value>) {
    let mut filter = String::from("records.kind = ?");
    let mut bind_values = vec![Value::Text(query.kind.clone())];

    for (field, value) in &query.identity {
        filter.push_str(
            " AND EXISTS (SELECT 1 FROM record_keys
                WHERE record_keys.kind = records.kind
                  AND record_keys.id = records.id
                  AND record_keys.field = ?
                  AND record_keys.value = ?)",
        );
        bind_values.push(Value::Text(field.clone()));
        bind_values.push(Value::Text(value.clone()));
    }

    (filter, bind_values)
}

fn parse_record_row(row: &Row<'_>) -> StoreResult<StoredRecord> {
    let kind: String = row.get("kind")?;
    let id: String = row.get("id")?;

    let key_fields_text: String = row.get("key_fields")?;
    let key_fields: BTreeMap<String, String> =
        serde_json::from_str(&key_fields_text).map_err(|err| {
            StoreError::InvalidData(format!(
                "invalid key_fields for {kind}/{id} in records.key_fields: {err}"
            ))
        })?;

    let body_text: String = row.get("body")?;
    let body = serde_json::from_str(&body_text).map_err(|err| {
        StoreError::InvalidData(format!("invalid body for {kind}/{id} in records.body: {err}"))
    })?;

    Ok(StoredRecord {
        kind,
        id,
        key_fields,
        body,
    })
}
