//! Account entity kind.
//!
//! # Invariants
//! - `google_id` is the sole identifying field and doubles as record id.
//! - Name and institute are stored with collapsed internal whitespace.

use crate::model::attributes::{EntityAttributes, EntityKind};
use crate::search::{SearchDocument, SearchDocumentBuilder};
use crate::store::{KeyOnlyQuery, StoreError, StoreResult, StoredRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const ACCOUNT_ENTITY_TYPE: &str = "Account";
pub const ACCOUNT_SEARCH_INDEX: &str = "accounts";

const GOOGLE_ID_FIELD: &str = "google_id";
const GOOGLE_ID_MAX_CHARS: usize = 254;
const NAME_MAX_CHARS: usize = 100;
const INSTITUTE_MAX_CHARS: usize = 64;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex")
});
static GOOGLE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9@._\-]+$").expect("valid google id regex"));

/// Attribute set for a user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountAttributes {
    pub google_id: String,
    pub name: String,
    pub email: String,
    pub institute: String,
    pub is_instructor: bool,
}

impl AccountAttributes {
    pub fn new(
        google_id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        institute: impl Into<String>,
    ) -> Self {
        Self {
            google_id: google_id.into(),
            name: name.into(),
            email: email.into(),
            institute: institute.into(),
            is_instructor: false,
        }
    }

    /// Maps a stored record back to attributes.
    pub fn from_record(record: &StoredRecord) -> StoreResult<Self> {
        if record.kind != ACCOUNT_ENTITY_TYPE {
            return Err(StoreError::InvalidData(format!(
                "expected {ACCOUNT_ENTITY_TYPE} record, got {}",
                record.kind
            )));
        }
        Ok(serde_json::from_value(record.body.clone())?)
    }

    fn invalidity_messages(&self) -> Vec<String> {
        let mut messages = Vec::new();

        if self.google_id.is_empty() {
            messages.push("google_id cannot be empty".to_string());
        } else if self.google_id.chars().count() > GOOGLE_ID_MAX_CHARS {
            messages.push(format!(
                "google_id `{}` exceeds {GOOGLE_ID_MAX_CHARS} characters",
                self.google_id
            ));
        } else if !GOOGLE_ID_RE.is_match(&self.google_id) {
            messages.push(format!(
                "google_id `{}` contains unsupported characters",
                self.google_id
            ));
        }

        if self.name.is_empty() {
            messages.push("name cannot be empty".to_string());
        } else if self.name.chars().count() > NAME_MAX_CHARS {
            messages.push(format!("name exceeds {NAME_MAX_CHARS} characters"));
        }

        if !EMAIL_RE.is_match(&self.email) {
            messages.push(format!("email `{}` is not a valid address", self.email));
        }

        if self.institute.chars().count() > INSTITUTE_MAX_CHARS {
            messages.push(format!("institute exceeds {INSTITUTE_MAX_CHARS} characters"));
        }

        messages
    }
}

impl EntityAttributes for AccountAttributes {
    fn sanitize_for_saving(&mut self) {
        self.google_id = self.google_id.trim().to_string();
        self.name = collapse_whitespace(&self.name);
        self.email = self.email.trim().to_string();
        self.institute = collapse_whitespace(&self.institute);
    }

    fn is_valid(&self) -> bool {
        self.invalidity_messages().is_empty()
    }

    fn invalidity_info(&self) -> String {
        self.invalidity_messages().join("; ")
    }

    fn to_storage_record(&self) -> StoredRecord {
        let body = serde_json::json!({
            "google_id": self.google_id,
            "name": self.name,
            "email": self.email,
            "institute": self.institute,
            "is_instructor": self.is_instructor,
        });
        StoredRecord::new(ACCOUNT_ENTITY_TYPE, self.google_id.clone(), body)
            .with_key_field(GOOGLE_ID_FIELD, self.google_id.clone())
    }

    fn entity_type(&self) -> &str {
        ACCOUNT_ENTITY_TYPE
    }

    fn identification_string(&self) -> String {
        self.google_id.clone()
    }

    fn backup_identifier(&self) -> String {
        format!("Recently modified account::{}", self.google_id)
    }
}

impl SearchDocumentBuilder for AccountAttributes {
    fn build(&self) -> SearchDocument {
        SearchDocument::new(self.google_id.clone())
            .with_field("name", self.name.clone())
            .with_field("email", self.email.clone())
            .with_field("institute", self.institute.clone())
    }
}

/// [`EntityKind`] for accounts, keyed by `google_id`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountKind;

impl EntityKind for AccountKind {
    type Attributes = AccountAttributes;

    fn key_only_query(&self, attributes: &AccountAttributes) -> KeyOnlyQuery {
        KeyOnlyQuery::new(ACCOUNT_ENTITY_TYPE)
            .with_field(GOOGLE_ID_FIELD, attributes.google_id.clone())
    }
}

fn collapse_whitespace(value: &str) -> String {
    WHITESPACE_RE.replace_all(value.trim(), " ").into_owned()
}
