//! Secondary full-text index contracts, SQLite FTS5 client and the
//! best-effort sync helper.
//!
//! # Responsibility
//! - Define the index-side document projection and query shape.
//! - Keep index failures out of primary-store call paths ([`sync`]).
//!
//! # Invariants
//! - Documents are addressed by `(index_name, id)`; a put replaces.
//! - A query without filter predicates is never sent to an index.

use crate::db::DbError;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod fts;
pub mod sync;

const DEFAULT_SEARCH_LIMIT: u32 = 20;

pub type SearchResult<T> = Result<T, SearchError>;

#[derive(Debug)]
pub enum SearchError {
    /// Index cannot evaluate the query expression.
    UnsupportedQuery { query: String, message: String },
    Db(DbError),
    InvalidData(String),
    /// Index service failed for a reason unrelated to the query.
    Backend(String),
}

impl Display for SearchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedQuery { query, message } => {
                write!(f, "unsupported search query `{query}`: {message}")
            }
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid search row: {message}"),
            Self::Backend(message) => write!(f, "search backend failure: {message}"),
        }
    }
}

impl Error for SearchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for SearchError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SearchError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Index-side projection of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchDocument {
    pub id: String,
    /// Searchable text fields, name to value.
    pub fields: BTreeMap<String, String>,
}

impl SearchDocument {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Concatenated field values in field-name order.
    pub fn text(&self) -> String {
        self.fields
            .values()
            .filter(|value| !value.trim().is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Builds a [`SearchDocument`] on demand.
pub trait SearchDocumentBuilder {
    fn build(&self) -> SearchDocument;
}

impl SearchDocumentBuilder for SearchDocument {
    fn build(&self) -> SearchDocument {
        self.clone()
    }
}

/// Filter-based search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Each filter is one predicate; all must hold.
    pub filters: Vec<String>,
    pub limit: u32,
    /// Pass filters to the index verbatim instead of quoting them as terms.
    pub raw_syntax: bool,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            limit: DEFAULT_SEARCH_LIMIT,
            raw_syntax: false,
        }
    }
}

impl SearchQuery {
    /// Query with one filter per whitespace-separated term of `text`.
    pub fn from_text(text: &str) -> Self {
        let mut query = Self::default();
        for term in text.split_whitespace() {
            query = query.with_filter(term);
        }
        query
    }

    /// Blank filters are ignored.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        let filter = filter.into();
        if !filter.trim().is_empty() {
            self.filters.push(filter.trim().to_string());
        }
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn raw(mut self) -> Self {
        self.raw_syntax = true;
        self
    }

    pub fn filter_size(&self) -> usize {
        self.filters.len()
    }
}

impl Display for SearchQuery {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.filters.join(" AND "))
    }
}

/// One ranked match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub document_id: String,
    pub snippet: String,
}

/// Full-text index client with a failure domain separate from the store.
pub trait SearchIndex {
    fn put_document(&self, index_name: &str, document: &SearchDocument) -> SearchResult<()>;
    fn put_documents(&self, index_name: &str, documents: &[SearchDocument]) -> SearchResult<()>;
    fn delete_document(&self, index_name: &str, document_id: &str) -> SearchResult<()>;
    fn search(&self, index_name: &str, query: &SearchQuery) -> SearchResult<Vec<SearchHit>>;
}

impl<I: SearchIndex + ?Sized> SearchIndex for &I {
    fn put_document(&self, index_name: &str, document: &SearchDocument) -> SearchResult<()> {
        (**self).put_document(index_name, document)
    }

    fn put_documents(&self, index_name: &str, documents: &[SearchDocument]) -> SearchResult<()> {
        (**self).put_documents(index_name, documents)
    }

    fn delete_document(&self, index_name: &str, document_id: &str) -> SearchResult<()> {
        (**self).delete_document(index_name, document_id)
    }

    fn search(&self, index_name: &str, query: &SearchQuery) -> SearchResult<Vec<SearchHit>> {
        (**self).search(index_name, query)
    }
}
